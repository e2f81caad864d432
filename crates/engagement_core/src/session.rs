use std::sync::Arc;

use shared::domain::PresetId;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::{config::Endpoints, transport::Transport};

/// Page-lifetime state shared by the controllers: the csrf token cache, the
/// login location and the selected preset.
pub struct Session {
    transport: Arc<dyn Transport>,
    csrf_cookie_name: String,
    default_login: Url,
    inner: RwLock<SessionState>,
}

#[derive(Debug, Default)]
struct SessionState {
    csrf_token: Option<String>,
    login_url: Option<Url>,
    selected_preset: Option<PresetId>,
}

impl Session {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: &Endpoints,
        csrf_cookie_name: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            csrf_cookie_name: csrf_cookie_name.into(),
            default_login: endpoints.login.clone(),
            inner: RwLock::new(SessionState::default()),
        }
    }

    pub async fn init(&self, login_url: Option<Url>, selected_preset: Option<PresetId>) {
        let csrf_token = self.transport.cookie(&self.csrf_cookie_name);
        let mut guard = self.inner.write().await;
        guard.csrf_token = csrf_token;
        guard.login_url = login_url;
        guard.selected_preset = selected_preset;
        debug!(
            "session: init csrf_present={} selected_preset={:?}",
            guard.csrf_token.is_some(),
            guard.selected_preset
        );
    }

    pub async fn reset(&self) {
        *self.inner.write().await = SessionState::default();
    }

    /// Cached after the first successful read; an empty string when the
    /// cookie has not been issued.
    pub async fn csrf_token(&self) -> String {
        if let Some(token) = self.inner.read().await.csrf_token.clone() {
            return token;
        }
        let Some(token) = self.transport.cookie(&self.csrf_cookie_name) else {
            return String::new();
        };
        self.inner.write().await.csrf_token = Some(token.clone());
        token
    }

    pub async fn login_url(&self) -> Url {
        self.inner
            .read()
            .await
            .login_url
            .clone()
            .unwrap_or_else(|| self.default_login.clone())
    }

    pub async fn selected_preset(&self) -> Option<PresetId> {
        self.inner.read().await.selected_preset
    }

    pub async fn select_preset(&self, preset: Option<PresetId>) {
        self.inner.write().await.selected_preset = preset;
    }

    /// Clears the selection only if it still points at `preset`.
    pub async fn clear_selection_if(&self, preset: PresetId) -> bool {
        let mut guard = self.inner.write().await;
        if guard.selected_preset == Some(preset) {
            guard.selected_preset = None;
            true
        } else {
            false
        }
    }
}
