//! Scripted transport and recording view-ports shared by the controller tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use reqwest::StatusCode;
use shared::domain::{PresetId, WidgetId};
use tokio::sync::oneshot;
use url::Url;

use crate::{
    analytics::AnalyticsRender,
    config::{Endpoints, Settings},
    error::TransportError,
    ports::{
        AnalyticsView, ConfirmPrompt, Listing, Navigator, Notice, NoticeLevel, Notifier, Ports,
        PresetView, ReactionView, SearchView,
    },
    presets::{PresetEntry, PresetOption},
    reactions::ReactionDisplay,
    search::{RecentEntry, SearchRender},
    session::Session,
    transport::{HttpReply, HttpRequest, Transport},
};

pub const ORIGIN: &str = "http://portal.test/";

pub enum Step {
    Ready(Result<HttpReply, TransportError>),
    /// Resolves once the test sends the reply through the paired sender.
    Gated(oneshot::Receiver<HttpReply>),
}

/// Serves queued replies in order and records every request it was given.
#[derive(Default)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<HttpRequest>>,
    cookies: Mutex<HashMap<String, String>>,
}

impl ScriptedTransport {
    pub fn push(&self, reply: HttpReply) {
        self.steps.lock().expect("steps").push_back(Step::Ready(Ok(reply)));
    }

    pub fn push_error(&self, err: TransportError) {
        self.steps.lock().expect("steps").push_back(Step::Ready(Err(err)));
    }

    pub fn push_gated(&self) -> oneshot::Sender<HttpReply> {
        let (tx, rx) = oneshot::channel();
        self.steps.lock().expect("steps").push_back(Step::Gated(rx));
        tx
    }

    pub fn set_cookie(&self, name: &str, value: &str) {
        self.cookies
            .lock()
            .expect("cookies")
            .insert(name.to_string(), value.to_string());
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests").clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("requests").len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpReply, TransportError> {
        self.requests.lock().expect("requests").push(request.clone());
        let step = self.steps.lock().expect("steps").pop_front();
        match step {
            Some(Step::Ready(result)) => result,
            Some(Step::Gated(rx)) => rx
                .await
                .map_err(|_| TransportError::Unavailable("gate dropped".into())),
            None => Err(TransportError::Unavailable(format!(
                "unscripted request to {}",
                request.url
            ))),
        }
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.lock().expect("cookies").get(name).cloned()
    }
}

pub fn json_reply(status: u16, path: &str, body: serde_json::Value) -> HttpReply {
    HttpReply {
        status: StatusCode::from_u16(status).expect("status"),
        final_url: Url::parse(ORIGIN).expect("origin").join(path).expect("path"),
        redirected: false,
        body: body.to_string(),
    }
}

pub fn login_redirect() -> HttpReply {
    HttpReply {
        status: StatusCode::OK,
        final_url: Url::parse(ORIGIN)
            .expect("origin")
            .join("/login/?next=/search/")
            .expect("path"),
        redirected: true,
        body: "<html>sign in</html>".into(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Loading(bool),
    Results(SearchRender),
    Recent(Listing<RecentEntry>),
    Status(String),
    FormLoading(bool),
    Form(String),
    FormClosed,
    SubmitEnabled(bool),
    List(Vec<PresetEntry>),
    Selector(Vec<PresetOption>, Option<PresetId>),
    DeletePending(PresetId, bool),
    Reaction(WidgetId, ReactionDisplay),
    Analytics(AnalyticsRender),
    AnalyticsError(String),
    Notice(Notice),
    Redirect(Url),
}

/// Every port at once, appending to a single event log.
pub struct Recorder {
    events: Mutex<Vec<Event>>,
    confirm_answer: AtomicBool,
    confirm_asked: AtomicUsize,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            confirm_answer: AtomicBool::new(true),
            confirm_asked: AtomicUsize::new(0),
        })
    }

    pub fn ports(self: &Arc<Self>) -> Ports {
        Ports {
            search: self.clone(),
            presets: self.clone(),
            reactions: self.clone(),
            analytics: self.clone(),
            notifier: self.clone(),
            navigator: self.clone(),
            confirm: self.clone(),
        }
    }

    pub fn answer_confirm(&self, answer: bool) {
        self.confirm_answer.store(answer, Ordering::SeqCst);
    }

    pub fn confirm_asked(&self) -> usize {
        self.confirm_asked.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("events").clone()
    }

    pub fn clear(&self) {
        self.events.lock().expect("events").clear();
    }

    fn push(&self, event: Event) {
        self.events.lock().expect("events").push(event);
    }

    pub fn results(&self) -> Vec<SearchRender> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Results(render) => Some(render),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self, level: NoticeLevel) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Notice(notice) if notice.level == level => Some(notice.message),
                _ => None,
            })
            .collect()
    }

    pub fn redirects(&self) -> Vec<Url> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Redirect(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn last_reaction(&self, widget: &WidgetId) -> Option<ReactionDisplay> {
        self.events().into_iter().rev().find_map(|event| match event {
            Event::Reaction(id, display) if &id == widget => Some(display),
            _ => None,
        })
    }

    pub fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|event| matches(event)).count()
    }
}

impl SearchView for Recorder {
    fn set_loading(&self, loading: bool) {
        self.push(Event::Loading(loading));
    }

    fn render_results(&self, render: &SearchRender) {
        self.push(Event::Results(render.clone()));
    }

    fn render_recent(&self, recent: &Listing<RecentEntry>) {
        self.push(Event::Recent(recent.clone()));
    }

    fn render_status(&self, line: &str) {
        self.push(Event::Status(line.to_string()));
    }
}

impl PresetView for Recorder {
    fn set_form_loading(&self, loading: bool) {
        self.push(Event::FormLoading(loading));
    }

    fn render_form(&self, markup: &str) {
        self.push(Event::Form(markup.to_string()));
    }

    fn close_form(&self) {
        self.push(Event::FormClosed);
    }

    fn set_submit_enabled(&self, enabled: bool) {
        self.push(Event::SubmitEnabled(enabled));
    }

    fn render_list(&self, entries: &[PresetEntry]) {
        self.push(Event::List(entries.to_vec()));
    }

    fn render_selector(&self, options: &[PresetOption], selected: Option<PresetId>) {
        self.push(Event::Selector(options.to_vec(), selected));
    }

    fn set_delete_pending(&self, preset: PresetId, pending: bool) {
        self.push(Event::DeletePending(preset, pending));
    }
}

impl ReactionView for Recorder {
    fn render(&self, widget: &WidgetId, display: &ReactionDisplay) {
        self.push(Event::Reaction(widget.clone(), display.clone()));
    }
}

impl AnalyticsView for Recorder {
    fn render(&self, render: &AnalyticsRender) {
        self.push(Event::Analytics(render.clone()));
    }

    fn show_loading_error(&self, message: &str) {
        self.push(Event::AnalyticsError(message.to_string()));
    }
}

impl Notifier for Recorder {
    fn notify(&self, notice: Notice) {
        self.push(Event::Notice(notice));
    }
}

impl Navigator for Recorder {
    fn redirect_to_login(&self, login: &Url) {
        self.push(Event::Redirect(login.clone()));
    }
}

#[async_trait]
impl ConfirmPrompt for Recorder {
    async fn confirm(&self, _message: &str) -> bool {
        self.confirm_asked.fetch_add(1, Ordering::SeqCst);
        self.confirm_answer.load(Ordering::SeqCst)
    }
}

/// Wiring shared by the per-controller tests.
pub struct Harness {
    pub transport: Arc<ScriptedTransport>,
    pub recorder: Arc<Recorder>,
    pub endpoints: Arc<Endpoints>,
    pub session: Arc<Session>,
}

pub fn test_settings() -> Settings {
    Settings {
        base_url: ORIGIN.into(),
        ..Settings::default()
    }
}

impl Harness {
    pub fn new() -> Self {
        let transport = Arc::new(ScriptedTransport::default());
        let endpoints =
            Arc::new(Endpoints::from_settings(&test_settings()).expect("endpoints"));
        let session = Arc::new(Session::new(
            transport.clone() as Arc<dyn Transport>,
            &endpoints,
            "csrftoken",
        ));
        Self {
            transport,
            recorder: Recorder::new(),
            endpoints,
            session,
        }
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }
}
