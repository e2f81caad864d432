use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use shared::domain::PresetId;
use url::Url;

pub const DEFAULT_SETTINGS_FILE: &str = "engagement.toml";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub login_url: String,
    pub search_path: String,
    pub recent_path: String,
    pub preset_form_path: String,
    pub preset_submit_path: String,
    pub preset_delete_path: String,
    pub analytics_path: Option<String>,
    pub csrf_cookie_name: String,
    pub request_timeout_secs: u64,
    /// UI hint only. Decides whether the analytics panel tries to load; it
    /// never unlocks privileged fields in search results.
    pub is_staff: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".into(),
            login_url: "/login/".into(),
            search_path: "/search/api/results/".into(),
            recent_path: "/search/api/recent/".into(),
            preset_form_path: "/search/api/preferences/form/".into(),
            preset_submit_path: "/search/api/preferences/submit/".into(),
            preset_delete_path: "/search/api/preferences/delete/".into(),
            analytics_path: Some("/search/api/analytics/".into()),
            csrf_cookie_name: "csrftoken".into(),
            request_timeout_secs: 15,
            is_staff: false,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Defaults, then `engagement.toml` in the working directory, then the
/// environment.
pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_with(Path::new(DEFAULT_SETTINGS_FILE), |key| {
        std::env::var(key).ok()
    })
}

pub fn load_settings_with(
    file: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = match fs::read_to_string(file) {
        Ok(raw) => toml::from_str::<Settings>(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", file.display()))?,
        Err(_) => Settings::default(),
    };
    apply_env_overrides(&mut settings, env);
    Ok(settings)
}

fn apply_env_overrides(settings: &mut Settings, env: impl Fn(&str) -> Option<String>) {
    let lookup = |name: &str| {
        env(&format!("APP__{name}")).or_else(|| env(&format!("ENGAGEMENT_{name}")))
    };

    if let Some(v) = lookup("BASE_URL") {
        settings.base_url = v;
    }
    if let Some(v) = lookup("LOGIN_URL") {
        settings.login_url = v;
    }
    if let Some(v) = lookup("SEARCH_PATH") {
        settings.search_path = v;
    }
    if let Some(v) = lookup("RECENT_PATH") {
        settings.recent_path = v;
    }
    if let Some(v) = lookup("PRESET_FORM_PATH") {
        settings.preset_form_path = v;
    }
    if let Some(v) = lookup("PRESET_SUBMIT_PATH") {
        settings.preset_submit_path = v;
    }
    if let Some(v) = lookup("PRESET_DELETE_PATH") {
        settings.preset_delete_path = v;
    }
    if let Some(v) = lookup("ANALYTICS_PATH") {
        let v = v.trim().to_string();
        settings.analytics_path = (!v.is_empty()).then_some(v);
    }
    if let Some(v) = lookup("CSRF_COOKIE_NAME") {
        settings.csrf_cookie_name = v;
    }
    if let Some(v) = lookup("REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }
    if let Some(v) = lookup("IS_STAFF") {
        settings.is_staff = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
    }
}

/// Absolute endpoint URLs resolved once from [`Settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub base: Url,
    pub login: Url,
    pub search: Url,
    pub recent: Url,
    pub preset_form: Url,
    pub preset_submit: Url,
    pub preset_delete: Url,
    pub analytics: Option<Url>,
}

impl Endpoints {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let base = Url::parse(settings.base_url.trim())
            .with_context(|| format!("invalid base_url '{}'", settings.base_url))?;
        let join = |path: &str| {
            base.join(path.trim())
                .with_context(|| format!("invalid endpoint path '{path}'"))
        };

        Ok(Self {
            login: join(&settings.login_url)?,
            search: join(&settings.search_path)?,
            recent: join(&settings.recent_path)?,
            preset_form: join(&settings.preset_form_path)?,
            preset_submit: join(&settings.preset_submit_path)?,
            preset_delete: join(&settings.preset_delete_path)?,
            analytics: settings
                .analytics_path
                .as_deref()
                .map(|path| join(path))
                .transpose()?,
            base,
        })
    }

    /// `…/preferences/form/` becomes `…/preferences/<id>/form/` when editing.
    pub fn preset_form_for(&self, id: Option<PresetId>) -> Url {
        match id {
            Some(id) => with_id_segment(&self.preset_form, "form", id),
            None => self.preset_form.clone(),
        }
    }

    pub fn preset_submit_for(&self, id: Option<PresetId>) -> Url {
        match id {
            Some(id) => with_id_segment(&self.preset_submit, "submit", id),
            None => self.preset_submit.clone(),
        }
    }

    pub fn resolve(&self, raw: &str) -> Result<Url, url::ParseError> {
        self.base.join(raw.trim())
    }
}

fn with_id_segment(url: &Url, action: &str, id: PresetId) -> Url {
    let path = url.path();
    let trimmed = path.trim_end_matches('/');
    let Some(prefix) = trimmed.strip_suffix(action) else {
        return url.clone();
    };

    let mut out = url.clone();
    out.set_path(&format!("{prefix}{id}/{action}/"));
    out
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
