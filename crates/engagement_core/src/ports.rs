//! View-ports: the write-only surfaces each controller renders into. A
//! controller never reads state back out of a port.

use std::sync::Arc;

use shared::domain::{PresetId, WidgetId};
use url::Url;

use crate::{
    analytics::AnalyticsRender,
    presets::{PresetEntry, PresetOption},
    reactions::ReactionDisplay,
    search::{RecentEntry, SearchRender},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// A rendered list, or the placeholder shown instead of an empty container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing<T> {
    Items(Vec<T>),
    Empty { placeholder: &'static str },
}

impl<T> Listing<T> {
    pub fn from_items(items: Vec<T>, placeholder: &'static str) -> Self {
        if items.is_empty() {
            Self::Empty { placeholder }
        } else {
            Self::Items(items)
        }
    }

    pub fn items(&self) -> &[T] {
        match self {
            Self::Items(items) => items,
            Self::Empty { .. } => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }
}

pub trait SearchView: Send + Sync {
    fn set_loading(&self, loading: bool);
    /// Summary, both result lists and the recent list in one call.
    fn render_results(&self, render: &SearchRender);
    fn render_recent(&self, recent: &Listing<RecentEntry>);
    fn render_status(&self, line: &str);
}

pub trait PresetView: Send + Sync {
    fn set_form_loading(&self, loading: bool);
    fn render_form(&self, markup: &str);
    fn close_form(&self);
    fn set_submit_enabled(&self, enabled: bool);
    fn render_list(&self, entries: &[PresetEntry]);
    fn render_selector(&self, options: &[PresetOption], selected: Option<PresetId>);
    fn set_delete_pending(&self, preset: PresetId, pending: bool);
}

pub trait ReactionView: Send + Sync {
    fn render(&self, widget: &WidgetId, display: &ReactionDisplay);
}

pub trait AnalyticsView: Send + Sync {
    fn render(&self, render: &AnalyticsRender);
    /// The panel stays in its loading state; only the loading text changes.
    fn show_loading_error(&self, message: &str);
}

/// Toast / inline feedback sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

pub trait Navigator: Send + Sync {
    fn redirect_to_login(&self, login: &Url);
}

#[async_trait::async_trait]
pub trait ConfirmPrompt: Send + Sync {
    /// Blocks on the user, never on the network.
    async fn confirm(&self, message: &str) -> bool;
}

#[derive(Clone)]
pub struct Ports {
    pub search: Arc<dyn SearchView>,
    pub presets: Arc<dyn PresetView>,
    pub reactions: Arc<dyn ReactionView>,
    pub analytics: Arc<dyn AnalyticsView>,
    pub notifier: Arc<dyn Notifier>,
    pub navigator: Arc<dyn Navigator>,
    pub confirm: Arc<dyn ConfirmPrompt>,
}
