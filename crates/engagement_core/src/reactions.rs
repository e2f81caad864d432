use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use shared::{
    domain::{ItemId, ReactionKind, WidgetId},
    protocol::ReactionResponse,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    config::Endpoints,
    error::EngagementError,
    ports::{Navigator, Notice, Notifier, ReactionView},
    session::Session,
    transport::{classify, decode, AuthSignal, HttpRequest, Transport},
};

const OFFLINE_NOTICE: &str = "Unable to submit your reaction right now.";

/// Confirmed reaction state of one content item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionState {
    pub user_reaction: Option<ReactionKind>,
    pub counts: BTreeMap<ReactionKind, i64>,
}

impl ReactionState {
    fn from_response(response: &ReactionResponse) -> Self {
        Self {
            user_reaction: response.confirmed_reaction(),
            counts: response
                .reactions
                .iter()
                .map(|entry| (entry.key.clone(), entry.count))
                .collect(),
        }
    }
}

/// A reaction widget found on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionWidget {
    pub widget: WidgetId,
    pub item: ItemId,
    pub react_url: String,
    pub kinds: Vec<ReactionKind>,
    /// Counts rendered by the server along with the widget.
    pub counts: BTreeMap<ReactionKind, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionControl {
    pub kind: ReactionKind,
    pub active: bool,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionDisplay {
    pub item: ItemId,
    pub controls: Vec<ReactionControl>,
    /// Set while a toggle is in flight.
    pub pending: bool,
}

impl ReactionDisplay {
    pub fn control(&self, kind: &ReactionKind) -> Option<&ReactionControl> {
        self.controls.iter().find(|control| &control.kind == kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionOutcome {
    Confirmed(ReactionState),
    /// Unbound widget or unknown item.
    Ignored,
    /// Non-2xx other than 401, or a non-`ok` status. Prior state kept.
    Rejected,
    Failed(EngagementError),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InitReactions {
    pub user_reactions: HashMap<ItemId, ReactionKind>,
}

#[derive(Default)]
struct ReactionsState {
    items: HashMap<ItemId, ReactionState>,
    widgets: HashMap<WidgetId, ReactionWidget>,
}

impl ReactionsState {
    /// `pending` is the kind just clicked; clicking the active kind shows it
    /// cleared until the service answers.
    fn display(&self, widget: &ReactionWidget, pending: Option<&ReactionKind>) -> ReactionDisplay {
        let state = self.items.get(&widget.item);
        let confirmed = state.and_then(|s| s.user_reaction.as_ref());
        let active = match pending {
            Some(kind) if confirmed == Some(kind) => None,
            Some(kind) => Some(kind),
            None => confirmed,
        };
        ReactionDisplay {
            item: widget.item.clone(),
            controls: widget
                .kinds
                .iter()
                .map(|kind| ReactionControl {
                    kind: kind.clone(),
                    active: active == Some(kind),
                    count: state
                        .and_then(|s| s.counts.get(kind))
                        .copied()
                        .unwrap_or(0),
                })
                .collect(),
            pending: pending.is_some(),
        }
    }

    fn widgets_for<'a>(&'a self, item: &'a ItemId) -> impl Iterator<Item = &'a ReactionWidget> + 'a {
        self.widgets.values().filter(move |widget| &widget.item == item)
    }
}

pub struct ReactionAggregator {
    transport: Arc<dyn Transport>,
    endpoints: Arc<Endpoints>,
    session: Arc<Session>,
    view: Arc<dyn ReactionView>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    inner: Mutex<ReactionsState>,
}

impl ReactionAggregator {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Arc<Endpoints>,
        session: Arc<Session>,
        view: Arc<dyn ReactionView>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            transport,
            endpoints,
            session,
            view,
            notifier,
            navigator,
            inner: Mutex::new(ReactionsState::default()),
        }
    }

    pub async fn init(&self, options: InitReactions) {
        let mut guard = self.inner.lock().await;
        guard.items.clear();
        for (item, kind) in options.user_reactions {
            guard.items.entry(item).or_default().user_reaction = Some(kind);
        }
        self.render_all(&guard);
    }

    pub async fn reset(&self) {
        *self.inner.lock().await = ReactionsState::default();
    }

    /// A `None` value clears the user's reaction for that item.
    pub async fn merge_user_reactions(&self, entries: HashMap<ItemId, Option<ReactionKind>>) {
        let mut guard = self.inner.lock().await;
        for (item, kind) in entries {
            guard.items.entry(item).or_default().user_reaction = kind;
        }
        self.render_all(&guard);
    }

    pub async fn state(&self, item: &ItemId) -> Option<ReactionState> {
        self.inner.lock().await.items.get(item).cloned()
    }

    pub async fn is_bound(&self, widget: &WidgetId) -> bool {
        self.inner.lock().await.widgets.contains_key(widget)
    }

    /// Binds newly found widgets and re-syncs the ones already bound. Returns
    /// how many widgets were bound for the first time.
    pub async fn bind(&self, widgets: Vec<ReactionWidget>) -> usize {
        let mut guard = self.inner.lock().await;
        let mut fresh = 0;
        for widget in widgets {
            if !guard.widgets.contains_key(&widget.widget) {
                let state = guard.items.entry(widget.item.clone()).or_default();
                for (kind, count) in &widget.counts {
                    state.counts.entry(kind.clone()).or_insert(*count);
                }
                guard.widgets.insert(widget.widget.clone(), widget.clone());
                fresh += 1;
            }
            if let Some(bound) = guard.widgets.get(&widget.widget) {
                self.view.render(&bound.widget, &guard.display(bound, None));
            }
        }
        debug!("reactions: bind fresh={fresh} total={}", guard.widgets.len());
        fresh
    }

    /// Click on a control of a bound widget.
    pub async fn click(&self, widget: &WidgetId, kind: ReactionKind) -> ReactionOutcome {
        let bound = self.inner.lock().await.widgets.get(widget).cloned();
        match bound {
            Some(bound) => self.send_toggle(bound, kind).await,
            None => {
                debug!("reactions: click on unbound widget={widget}");
                ReactionOutcome::Ignored
            }
        }
    }

    pub async fn toggle(&self, item: &ItemId, kind: ReactionKind) -> ReactionOutcome {
        let bound = {
            let guard = self.inner.lock().await;
            let found = guard.widgets_for(item).next().cloned();
            found
        };
        match bound {
            Some(bound) => self.send_toggle(bound, kind).await,
            None => {
                debug!("reactions: toggle for item without widget item={item}");
                ReactionOutcome::Ignored
            }
        }
    }

    async fn send_toggle(&self, widget: ReactionWidget, kind: ReactionKind) -> ReactionOutcome {
        let item = widget.item.clone();
        {
            let guard = self.inner.lock().await;
            for bound in guard.widgets_for(&item) {
                self.view
                    .render(&bound.widget, &guard.display(bound, Some(&kind)));
            }
        }

        info!("reactions: toggle item={item} kind={kind}");
        let result = self.fetch_toggle(&widget, &kind).await;

        let mut guard = self.inner.lock().await;
        let outcome = match result {
            Ok(response) if response.is_ok() => {
                if let Some(reported) = &response.news_id {
                    if reported != &item {
                        warn!("reactions: response item mismatch sent={item} reported={reported}");
                    }
                }
                let state = ReactionState::from_response(&response);
                guard.items.insert(item.clone(), state.clone());
                ReactionOutcome::Confirmed(state)
            }
            Ok(response) => {
                debug!("reactions: rejected item={item} status={}", response.status);
                ReactionOutcome::Rejected
            }
            Err(EngagementError::AuthRequired) => {
                ReactionOutcome::Failed(EngagementError::AuthRequired)
            }
            Err(err @ EngagementError::Transport(_)) => {
                warn!("reactions: toggle failed item={item} error={err}");
                self.notifier.notify(Notice::error(OFFLINE_NOTICE));
                ReactionOutcome::Failed(err)
            }
            Err(err) => {
                debug!("reactions: toggle refused item={item} error={err}");
                ReactionOutcome::Rejected
            }
        };

        for bound in guard.widgets_for(&item) {
            self.view.render(&bound.widget, &guard.display(bound, None));
        }
        drop(guard);

        if outcome == ReactionOutcome::Failed(EngagementError::AuthRequired) {
            let login = self.session.login_url().await;
            warn!("reactions: auth required item={item} redirect={login}");
            self.navigator.redirect_to_login(&login);
        }
        outcome
    }

    async fn fetch_toggle(
        &self,
        widget: &ReactionWidget,
        kind: &ReactionKind,
    ) -> Result<ReactionResponse, EngagementError> {
        let url = self
            .endpoints
            .resolve(&widget.react_url)
            .map_err(|err| EngagementError::Transport(err.to_string()))?;
        let csrf = self.session.csrf_token().await;
        let request = HttpRequest::post(
            url,
            vec![("reaction".to_string(), kind.to_string())],
            Some(csrf),
        );
        let reply = self.transport.send(request).await?;
        let login = self.session.login_url().await;
        let reply = classify(reply, AuthSignal::Unauthorized, &login)?;
        decode(&reply)
    }

    fn render_all(&self, state: &ReactionsState) {
        for widget in state.widgets.values() {
            self.view.render(&widget.widget, &state.display(widget, None));
        }
    }
}

#[cfg(test)]
#[path = "tests/reactions_tests.rs"]
mod tests;
