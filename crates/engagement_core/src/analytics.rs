use std::sync::Arc;

use shared::protocol::AnalyticsResponse;
use tracing::{info, warn};

use crate::{
    config::Endpoints,
    error::EngagementError,
    ports::{AnalyticsView, Listing},
    session::Session,
    transport::{classify, decode, AuthSignal, HttpRequest, Transport},
};

const LOAD_FAILED: &str = "Failed to load analytics.";
const NO_QUERIES: &str = "No search data.";
const NO_SCOPES: &str = "No scope data.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsRender {
    pub top_queries: Listing<String>,
    pub scope_breakdown: Listing<String>,
}

impl From<&AnalyticsResponse> for AnalyticsRender {
    fn from(response: &AnalyticsResponse) -> Self {
        Self {
            top_queries: Listing::from_items(
                response
                    .top_queries
                    .iter()
                    .map(|entry| {
                        format!(
                            "{} · {} searches",
                            entry.keyword.as_deref().unwrap_or_default(),
                            entry.total
                        )
                    })
                    .collect(),
                NO_QUERIES,
            ),
            scope_breakdown: Listing::from_items(
                response
                    .scope_breakdown
                    .iter()
                    .map(|entry| {
                        let scope = entry
                            .scope
                            .as_deref()
                            .filter(|s| !s.is_empty())
                            .unwrap_or("all");
                        format!("{scope} · {} times", entry.total)
                    })
                    .collect(),
                NO_SCOPES,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsOutcome {
    /// Not a staff viewer, or no endpoint configured.
    Skipped,
    Rendered,
    Failed(EngagementError),
}

/// Staff-only analytics panel. The `is_staff` flag only decides whether a
/// load is attempted; the service still enforces access.
pub struct AnalyticsPanel {
    transport: Arc<dyn Transport>,
    endpoints: Arc<Endpoints>,
    session: Arc<Session>,
    view: Arc<dyn AnalyticsView>,
    is_staff: bool,
}

impl AnalyticsPanel {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Arc<Endpoints>,
        session: Arc<Session>,
        view: Arc<dyn AnalyticsView>,
        is_staff: bool,
    ) -> Self {
        Self {
            transport,
            endpoints,
            session,
            view,
            is_staff,
        }
    }

    pub async fn load(&self) -> AnalyticsOutcome {
        let Some(url) = self.endpoints.analytics.clone().filter(|_| self.is_staff) else {
            return AnalyticsOutcome::Skipped;
        };

        match self.fetch(url).await {
            Ok(response) => {
                info!(
                    "analytics: loaded top_queries={} scopes={}",
                    response.top_queries.len(),
                    response.scope_breakdown.len()
                );
                self.view.render(&AnalyticsRender::from(&response));
                AnalyticsOutcome::Rendered
            }
            Err(err) => {
                warn!("analytics: load failed error={err}");
                self.view.show_loading_error(LOAD_FAILED);
                AnalyticsOutcome::Failed(err)
            }
        }
    }

    async fn fetch(&self, url: url::Url) -> Result<AnalyticsResponse, EngagementError> {
        let reply = self.transport.send(HttpRequest::get(url)).await?;
        let login = self.session.login_url().await;
        let reply = classify(reply, AuthSignal::UnauthorizedOrLoginRedirect, &login)?;
        decode(&reply)
    }
}

#[cfg(test)]
mod tests {
    use shared::protocol::{QueryTotal, ScopeTotal};

    use super::*;

    #[test]
    fn empty_sections_render_placeholders() {
        let render = AnalyticsRender::from(&AnalyticsResponse::default());
        assert_eq!(render.top_queries, Listing::Empty { placeholder: NO_QUERIES });
        assert_eq!(render.scope_breakdown, Listing::Empty { placeholder: NO_SCOPES });
    }

    #[test]
    fn blank_scope_is_reported_as_all() {
        let render = AnalyticsRender::from(&AnalyticsResponse {
            top_queries: vec![QueryTotal {
                keyword: Some("juara".into()),
                total: 4,
            }],
            scope_breakdown: vec![ScopeTotal {
                scope: None,
                total: 9,
            }],
        });
        assert_eq!(render.top_queries.items(), ["juara · 4 searches".to_string()]);
        assert_eq!(render.scope_breakdown.items(), ["all · 9 times".to_string()]);
    }
}
