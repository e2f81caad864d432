use super::*;

use serde_json::json;

use crate::{
    error::TransportError,
    ports::NoticeLevel,
    test_support::{json_reply, Event, Harness},
    transport::Method,
};

const REACT_PATH: &str = "/news/12/react/";

fn kind(raw: &str) -> ReactionKind {
    ReactionKind::new(raw)
}

fn widget(id: &str, counts: &[(&str, i64)]) -> ReactionWidget {
    ReactionWidget {
        widget: WidgetId::new(id),
        item: ItemId::new("12"),
        react_url: REACT_PATH.into(),
        kinds: vec![kind("like"), kind("love"), kind("wow")],
        counts: counts.iter().map(|(k, c)| (kind(k), *c)).collect(),
    }
}

fn aggregator(h: &Harness) -> ReactionAggregator {
    ReactionAggregator::new(
        h.transport(),
        h.endpoints.clone(),
        h.session.clone(),
        h.recorder.clone(),
        h.recorder.clone(),
        h.recorder.clone(),
    )
}

fn ok_reply(user_reaction: &str, counts: serde_json::Value) -> crate::transport::HttpReply {
    json_reply(
        200,
        REACT_PATH,
        json!({"status": "ok", "user_reaction": user_reaction, "reactions": counts, "news_id": "12"}),
    )
}

#[tokio::test]
async fn confirmed_toggle_replaces_counts_and_active_control() {
    let h = Harness::new();
    h.transport.set_cookie("csrftoken", "tok-123");
    h.transport
        .push(ok_reply("like", json!([{"key": "like", "count": 5}])));
    let reactions = aggregator(&h);
    let top = WidgetId::new("news-12-top");
    reactions
        .bind(vec![widget("news-12-top", &[("like", 4), ("love", 2)])])
        .await;

    let outcome = reactions.click(&top, kind("like")).await;

    let expected = ReactionState {
        user_reaction: Some(kind("like")),
        counts: [(kind("like"), 5)].into_iter().collect(),
    };
    assert_eq!(outcome, ReactionOutcome::Confirmed(expected.clone()));
    assert_eq!(reactions.state(&ItemId::new("12")).await, Some(expected));

    let request = &h.transport.requests()[0];
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.url.path(), REACT_PATH);
    assert_eq!(request.form, [("reaction".to_string(), "like".to_string())]);
    assert_eq!(request.csrf_token.as_deref(), Some("tok-123"));

    let display = h.recorder.last_reaction(&top).expect("display");
    assert!(!display.pending);
    let like = display.control(&kind("like")).expect("like");
    assert!(like.active);
    assert_eq!(like.count, 5);
    let love = display.control(&kind("love")).expect("love");
    assert!(!love.active);
    assert_eq!(love.count, 0);
    assert!(!display.control(&kind("wow")).expect("wow").active);

    assert_eq!(
        h.recorder.count(|e| matches!(e, Event::Reaction(_, d) if d.pending)),
        1
    );
}

#[tokio::test]
async fn rebinding_the_same_widget_keeps_one_handler() {
    let h = Harness::new();
    h.transport
        .push(ok_reply("love", json!([{"key": "love", "count": 1}])));
    let reactions = aggregator(&h);
    let top = widget("news-12-top", &[]);

    assert_eq!(reactions.bind(vec![top.clone()]).await, 1);
    assert_eq!(reactions.bind(vec![top.clone()]).await, 0);
    assert!(reactions.is_bound(&top.widget).await);

    reactions.click(&top.widget, kind("love")).await;

    assert_eq!(h.transport.request_count(), 1);
}

#[tokio::test]
async fn every_widget_of_an_item_shows_the_confirmed_state() {
    let h = Harness::new();
    h.transport
        .push(ok_reply("wow", json!([{"key": "wow", "count": 7}])));
    let reactions = aggregator(&h);
    reactions
        .bind(vec![widget("news-12-top", &[]), widget("news-12-bottom", &[])])
        .await;

    reactions.toggle(&ItemId::new("12"), kind("wow")).await;

    for id in ["news-12-top", "news-12-bottom"] {
        let display = h
            .recorder
            .last_reaction(&WidgetId::new(id))
            .expect("display");
        let wow = display.control(&kind("wow")).expect("wow");
        assert!(wow.active);
        assert_eq!(wow.count, 7);
    }
}

#[tokio::test]
async fn unauthorized_toggle_redirects_to_login() {
    let h = Harness::new();
    h.transport
        .push(json_reply(401, REACT_PATH, json!({"detail": "login required"})));
    let reactions = aggregator(&h);
    let top = widget("news-12-top", &[]);
    reactions.bind(vec![top.clone()]).await;

    let outcome = reactions.click(&top.widget, kind("like")).await;

    assert_eq!(outcome, ReactionOutcome::Failed(EngagementError::AuthRequired));
    assert_eq!(
        h.recorder.redirects(),
        [url::Url::parse("http://portal.test/login/").expect("url")]
    );
}

#[tokio::test]
async fn rejected_toggle_restores_prior_state() {
    let h = Harness::new();
    h.transport.push(json_reply(500, REACT_PATH, json!({"error": "boom"})));
    h.transport
        .push(json_reply(200, REACT_PATH, json!({"status": "error"})));
    let reactions = aggregator(&h);
    reactions
        .init(InitReactions {
            user_reactions: [(ItemId::new("12"), kind("love"))].into_iter().collect(),
        })
        .await;
    let top = widget("news-12-top", &[("love", 3)]);
    reactions.bind(vec![top.clone()]).await;
    let before = reactions.state(&top.item).await;

    assert_eq!(
        reactions.click(&top.widget, kind("like")).await,
        ReactionOutcome::Rejected
    );
    assert_eq!(
        reactions.click(&top.widget, kind("like")).await,
        ReactionOutcome::Rejected
    );

    assert_eq!(reactions.state(&top.item).await, before);
    let display = h.recorder.last_reaction(&top.widget).expect("display");
    assert!(!display.pending);
    let love = display.control(&kind("love")).expect("love");
    assert!(love.active);
    assert_eq!(love.count, 3);
    assert!(!display.control(&kind("like")).expect("like").active);
    assert!(h.recorder.notices(NoticeLevel::Error).is_empty());
}

#[tokio::test]
async fn unreachable_service_is_reported() {
    let h = Harness::new();
    h.transport.push_error(TransportError::Timeout);
    let reactions = aggregator(&h);
    let top = widget("news-12-top", &[]);
    reactions.bind(vec![top.clone()]).await;

    let outcome = reactions.click(&top.widget, kind("like")).await;

    assert!(matches!(
        outcome,
        ReactionOutcome::Failed(EngagementError::Transport(_))
    ));
    assert_eq!(h.recorder.notices(NoticeLevel::Error), [OFFLINE_NOTICE]);
}

#[tokio::test]
async fn click_on_unbound_widget_is_ignored() {
    let h = Harness::new();
    let reactions = aggregator(&h);

    let outcome = reactions
        .click(&WidgetId::new("ghost"), kind("like"))
        .await;

    assert_eq!(outcome, ReactionOutcome::Ignored);
    assert_eq!(h.transport.request_count(), 0);
    assert!(h.recorder.events().is_empty());
}

#[tokio::test]
async fn merged_user_reactions_update_bound_widgets() {
    let h = Harness::new();
    let reactions = aggregator(&h);
    let top = widget("news-12-top", &[("wow", 2)]);
    reactions.bind(vec![top.clone()]).await;

    reactions
        .merge_user_reactions([(ItemId::new("12"), Some(kind("wow")))].into_iter().collect())
        .await;
    let display = h.recorder.last_reaction(&top.widget).expect("display");
    assert!(display.control(&kind("wow")).expect("wow").active);

    reactions
        .merge_user_reactions([(ItemId::new("12"), None)].into_iter().collect())
        .await;
    let display = h.recorder.last_reaction(&top.widget).expect("display");
    assert!(display.controls.iter().all(|control| !control.active));
    assert_eq!(display.control(&kind("wow")).expect("wow").count, 2);
}
