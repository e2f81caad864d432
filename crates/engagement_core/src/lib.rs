use std::{collections::HashMap, sync::Arc};

use anyhow::{Context, Result};
use shared::{
    domain::{ItemId, PresetId, ReactionKind},
    protocol::Preset,
};
use tracing::info;

pub mod analytics;
pub mod config;
pub mod error;
pub mod ports;
pub mod presets;
pub mod reactions;
pub mod search;
pub mod session;
pub mod transport;

pub use analytics::{AnalyticsOutcome, AnalyticsPanel};
pub use config::{load_settings, Endpoints, Settings};
pub use error::EngagementError;
pub use ports::Ports;
pub use presets::{DeleteOutcome, FormOutcome, PresetFormData, PresetManager, SubmitOutcome};
pub use reactions::{InitReactions, ReactionAggregator, ReactionOutcome, ReactionWidget};
pub use search::{SearchOutcome, SearchSessionController, SearchTrigger};
pub use session::Session;
pub use transport::{HttpTransport, MissingTransport, Transport};

/// Page data handed over when the runtime starts.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub login_url: Option<String>,
    pub selected_preset: Option<PresetId>,
    pub presets: Vec<(Preset, Option<String>)>,
    pub user_reactions: HashMap<ItemId, ReactionKind>,
    pub widgets: Vec<ReactionWidget>,
}

/// Entry point owning the session and the controllers.
pub struct EngagementRuntime {
    endpoints: Arc<Endpoints>,
    session: Arc<Session>,
    search: SearchSessionController,
    presets: PresetManager,
    reactions: ReactionAggregator,
    analytics: AnalyticsPanel,
}

impl EngagementRuntime {
    pub fn new(settings: &Settings, transport: Arc<dyn Transport>, ports: Ports) -> Result<Self> {
        let endpoints = Arc::new(Endpoints::from_settings(settings)?);
        let session = Arc::new(Session::new(
            Arc::clone(&transport),
            &endpoints,
            settings.csrf_cookie_name.clone(),
        ));

        Ok(Self {
            search: SearchSessionController::new(
                Arc::clone(&transport),
                Arc::clone(&endpoints),
                Arc::clone(&session),
                ports.search,
                Arc::clone(&ports.notifier),
                Arc::clone(&ports.navigator),
            ),
            presets: PresetManager::new(
                Arc::clone(&transport),
                Arc::clone(&endpoints),
                Arc::clone(&session),
                ports.presets,
                Arc::clone(&ports.notifier),
                Arc::clone(&ports.navigator),
                ports.confirm,
            ),
            reactions: ReactionAggregator::new(
                Arc::clone(&transport),
                Arc::clone(&endpoints),
                Arc::clone(&session),
                ports.reactions,
                ports.notifier,
                ports.navigator,
            ),
            analytics: AnalyticsPanel::new(
                transport,
                Arc::clone(&endpoints),
                Arc::clone(&session),
                ports.analytics,
                settings.is_staff,
            ),
            endpoints,
            session,
        })
    }

    /// Builds the runtime over a real HTTP transport.
    pub fn connect(settings: &Settings, ports: Ports) -> Result<(Self, Arc<HttpTransport>)> {
        let endpoints = Endpoints::from_settings(settings)?;
        let transport = Arc::new(
            HttpTransport::new(endpoints.base, settings.request_timeout())
                .context("failed to build http transport")?,
        );
        let runtime = Self::new(settings, Arc::clone(&transport) as Arc<dyn Transport>, ports)?;
        Ok((runtime, transport))
    }

    pub async fn init(&self, options: InitOptions) -> Result<()> {
        let login_url = options
            .login_url
            .as_deref()
            .map(|raw| self.endpoints.resolve(raw))
            .transpose()
            .context("invalid login url")?;

        self.session.init(login_url, options.selected_preset).await;
        self.presets.hydrate(options.presets).await;
        self.reactions
            .init(InitReactions {
                user_reactions: options.user_reactions,
            })
            .await;
        let bound = self.reactions.bind(options.widgets).await;
        info!("runtime: init bound_widgets={bound}");
        Ok(())
    }

    pub async fn reset(&self) {
        self.search.reset().await;
        self.presets.reset().await;
        self.reactions.reset().await;
        self.session.reset().await;
        info!("runtime: reset");
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn search(&self) -> &SearchSessionController {
        &self.search
    }

    pub fn presets(&self) -> &PresetManager {
        &self.presets
    }

    pub fn reactions(&self) -> &ReactionAggregator {
        &self.reactions
    }

    pub fn analytics(&self) -> &AnalyticsPanel {
        &self.analytics
    }

    /// Apply button on a preset card: select it, then search with it.
    pub async fn apply_preset(&self, preset: PresetId) -> SearchOutcome {
        self.presets.select(Some(preset)).await;
        self.search.execute(SearchTrigger::Preset(preset)).await
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
