use std::sync::Arc;

use shared::{
    domain::{PresetId, SearchScope, ViewerRole},
    protocol::{NewsHit, ProductHit, RecentQuery, RecentResponse, SearchResponse, SearchSummary},
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    config::Endpoints,
    error::{EngagementError, FailureCopy},
    ports::{Listing, Navigator, Notice, Notifier, SearchView},
    session::Session,
    transport::{classify, decode, AuthSignal, HttpRequest, Transport},
};

const NEWS_PLACEHOLDER: &str = "No news results yet.";
const PRODUCT_PLACEHOLDER: &str = "No product results yet.";
const RECENT_PLACEHOLDER: &str = "No recent searches yet.";
const FETCHING_LINE: &str = "Fetching search results...";
const FAILED_LINE: &str = "Something went wrong while loading search results.";
const OFFLINE_LINE: &str = "Could not connect to the search server.";
const UPDATED_NOTICE: &str = "Search results updated.";
const PRESET_APPLIED_NOTICE: &str = "Preset applied.";
const NO_KEYWORD_LABEL: &str = "(no keyword)";
const DEFAULT_NEWS_CATEGORY: &str = "General";
const DEFAULT_CURRENCY: &str = "IDR";

const SEARCH_COPY: FailureCopy = FailureCopy {
    server: "An error occurred while processing the search.",
    transport: "Unable to connect to the search server.",
    auth: "Please sign in to continue searching.",
};

const RECENT_COPY: FailureCopy = FailureCopy {
    server: "Recent searches could not be loaded.",
    transport: "Unable to connect to the search server.",
    auth: "Please sign in to continue searching.",
};

/// Current facet inputs, as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchForm {
    pub keyword: String,
    pub scope: SearchScope,
    pub discount_only: bool,
    pub news_category: String,
    pub product_category: String,
    pub brand: String,
    pub min_price: String,
    pub max_price: String,
}

/// One execution's query. Blank facets are dropped at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub keyword: Option<String>,
    pub scope: SearchScope,
    pub preset: Option<PresetId>,
    pub discount_only: bool,
    pub facets: Vec<(&'static str, String)>,
}

fn non_blank(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl SearchQuery {
    pub fn from_form(form: &SearchForm, preset: Option<PresetId>) -> Self {
        let facets = [
            ("news_category", &form.news_category),
            ("product_category", &form.product_category),
            ("brand", &form.brand),
            ("min_price", &form.min_price),
            ("max_price", &form.max_price),
        ]
        .into_iter()
        .filter_map(|(name, value)| non_blank(value).map(|value| (name, value)))
        .collect();

        Self {
            keyword: non_blank(&form.keyword),
            scope: form.scope,
            preset,
            discount_only: form.discount_only,
            facets,
        }
    }

    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(keyword) = &self.keyword {
            params.push(("query".to_string(), keyword.clone()));
        }
        params.push(("search_in".to_string(), self.scope.as_str().to_string()));
        for (name, value) in &self.facets {
            params.push((name.to_string(), value.clone()));
        }
        if self.discount_only {
            params.push(("only_discount".to_string(), "on".to_string()));
        }
        if let Some(preset) = self.preset {
            params.push(("preference".to_string(), preset.to_string()));
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchTrigger {
    Submit,
    /// Re-populates keyword and scope from a recent entry, then searches.
    Recent(RecentQuery),
    /// Selects the preset, then searches with it attached.
    Preset(PresetId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Rendered,
    /// A newer request was issued before this one resolved.
    Stale,
    Failed(EngagementError),
}

/// The last server-confirmed result set, with role-gated fields already
/// stripped for non-privileged viewers.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResultSet {
    pub summary: SearchSummary,
    pub news: Vec<NewsHit>,
    pub products: Vec<ProductHit>,
    pub recent: Vec<RecentQuery>,
    pub viewer_role: ViewerRole,
}

impl SearchResultSet {
    pub fn from_response(response: SearchResponse) -> Self {
        let viewer_role = response.viewer_role();
        let privileged = viewer_role.is_privileged();
        let news = response
            .news
            .into_iter()
            .map(|mut hit| {
                if !privileged {
                    hit.views = None;
                }
                hit
            })
            .collect();
        let products = response
            .products
            .into_iter()
            .map(|mut hit| {
                if !privileged {
                    hit.stock = None;
                }
                hit
            })
            .collect();

        Self {
            summary: response.summary,
            news,
            products,
            recent: response.recent,
            viewer_role,
        }
    }

    pub fn render(&self) -> SearchRender {
        SearchRender {
            summary_line: summary_line(&self.summary),
            news_count: self.summary.news_count,
            product_count: self.summary.product_count,
            news: Listing::from_items(
                self.news.iter().map(NewsCard::from).collect(),
                NEWS_PLACEHOLDER,
            ),
            products: Listing::from_items(
                self.products.iter().map(ProductCard::from).collect(),
                PRODUCT_PLACEHOLDER,
            ),
            recent: recent_listing(&self.recent),
            viewer_role: self.viewer_role,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRender {
    pub summary_line: String,
    pub news_count: u32,
    pub product_count: u32,
    pub news: Listing<NewsCard>,
    pub products: Listing<ProductCard>,
    pub recent: Listing<RecentEntry>,
    pub viewer_role: ViewerRole,
}

impl SearchRender {
    /// Placeholders everywhere, as shown before the first search.
    pub fn empty() -> Self {
        Self {
            summary_line: String::new(),
            news_count: 0,
            product_count: 0,
            news: Listing::from_items(Vec::new(), NEWS_PLACEHOLDER),
            products: Listing::from_items(Vec::new(), PRODUCT_PLACEHOLDER),
            recent: recent_listing(&[]),
            viewer_role: ViewerRole::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsCard {
    pub title: String,
    pub url: String,
    pub category: String,
    pub published_at: Option<String>,
    pub views: Option<u64>,
}

impl From<&NewsHit> for NewsCard {
    fn from(hit: &NewsHit) -> Self {
        Self {
            title: hit.title.clone(),
            url: hit.url.clone(),
            category: hit
                .category
                .clone()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_NEWS_CATEGORY.to_string()),
            published_at: hit.published_at.clone(),
            views: hit.views,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductCard {
    pub name: String,
    pub url: String,
    pub price_label: String,
    pub discount_label: Option<String>,
    pub stock: Option<i64>,
}

impl From<&ProductHit> for ProductCard {
    fn from(hit: &ProductHit) -> Self {
        let currency = hit
            .currency
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(DEFAULT_CURRENCY);
        Self {
            name: hit.name.clone(),
            url: hit.url.clone(),
            price_label: format_price(hit.price.unwrap_or(0.0), currency),
            discount_label: hit
                .discount
                .filter(|d| *d > 0.0)
                .map(|d| format!("{d}% off")),
            stock: hit.stock,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecentEntry {
    pub label: String,
    pub query: RecentQuery,
}

fn recent_listing(recent: &[RecentQuery]) -> Listing<RecentEntry> {
    Listing::from_items(
        recent
            .iter()
            .map(|query| RecentEntry {
                label: format!(
                    "{} · {}",
                    query.keyword().unwrap_or(NO_KEYWORD_LABEL),
                    query.scope.as_str().to_ascii_uppercase()
                ),
                query: query.clone(),
            })
            .collect(),
        RECENT_PLACEHOLDER,
    )
}

fn summary_line(summary: &SearchSummary) -> String {
    let keyword = summary.query.trim();
    let target = if keyword.is_empty() {
        "no keyword".to_string()
    } else {
        format!("\"{keyword}\"")
    };
    format!(
        "Showing {} news and {} products for {target}.",
        summary.news_count, summary.product_count
    )
}

/// Whole units with `.` thousands grouping, e.g. `IDR 1.250.000`.
pub fn format_price(amount: f64, currency: &str) -> String {
    let rounded = amount.round().max(0.0) as u64;
    let digits = rounded.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    format!("{currency} {grouped}")
}

struct SearchState {
    form: SearchForm,
    issued: u64,
    recent_issued: u64,
    current: Option<SearchResultSet>,
}

pub struct SearchSessionController {
    transport: Arc<dyn Transport>,
    endpoints: Arc<Endpoints>,
    session: Arc<Session>,
    view: Arc<dyn SearchView>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    inner: Mutex<SearchState>,
}

impl SearchSessionController {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Arc<Endpoints>,
        session: Arc<Session>,
        view: Arc<dyn SearchView>,
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
            inner: Mutex::new(SearchState {
                form: SearchForm::default(),
                issued: 0,
                recent_issued: 0,
                current: None,
            }),
        }
    }

    pub async fn form(&self) -> SearchForm {
        self.inner.lock().await.form.clone()
    }

    pub async fn edit_form(&self, edit: impl FnOnce(&mut SearchForm)) {
        edit(&mut self.inner.lock().await.form);
    }

    pub async fn current(&self) -> Option<SearchResultSet> {
        self.inner.lock().await.current.clone()
    }

    pub async fn reset(&self) {
        let mut guard = self.inner.lock().await;
        guard.form = SearchForm::default();
        guard.current = None;
        // Sequence numbers keep counting so responses issued before the
        // reset are still recognised as stale.
        guard.issued += 1;
        guard.recent_issued += 1;
        drop(guard);

        // Anything still in flight is now stale and will not clear these.
        self.view.set_loading(false);
        self.view.render_results(&SearchRender::empty());
    }

    pub async fn execute(&self, trigger: SearchTrigger) -> SearchOutcome {
        if let SearchTrigger::Preset(preset) = &trigger {
            self.session.select_preset(Some(*preset)).await;
            self.notifier.notify(Notice::info(PRESET_APPLIED_NOTICE));
        }
        let preset = self.session.selected_preset().await;

        let (seq, query) = {
            let mut guard = self.inner.lock().await;
            if let SearchTrigger::Recent(recent) = &trigger {
                guard.form.keyword = recent.keyword().unwrap_or_default().to_string();
                guard.form.scope = recent.scope;
            }
            guard.issued += 1;
            (guard.issued, SearchQuery::from_form(&guard.form, preset))
        };

        info!(
            "search: execute seq={seq} scope={} keyword_present={} preset={:?}",
            query.scope,
            query.keyword.is_some(),
            query.preset
        );
        self.view.set_loading(true);
        self.view.render_status(FETCHING_LINE);

        let result = self.fetch_results(&query).await;

        let mut guard = self.inner.lock().await;
        if guard.issued != seq {
            debug!(
                "search: stale response discarded seq={seq} latest={}",
                guard.issued
            );
            return SearchOutcome::Stale;
        }
        self.view.set_loading(false);

        match result {
            Ok(response) => {
                let results = SearchResultSet::from_response(response);
                let render = results.render();
                guard.current = Some(results);
                self.view.render_results(&render);
                self.notifier.notify(Notice::success(UPDATED_NOTICE));
                SearchOutcome::Rendered
            }
            Err(EngagementError::AuthRequired) => {
                drop(guard);
                let login = self.session.login_url().await;
                warn!("search: auth required seq={seq} redirect={login}");
                self.navigator.redirect_to_login(&login);
                SearchOutcome::Failed(EngagementError::AuthRequired)
            }
            Err(err) => {
                warn!("search: failed seq={seq} error={err}");
                let line = match err {
                    EngagementError::Transport(_) => OFFLINE_LINE,
                    _ => FAILED_LINE,
                };
                self.view.render_status(line);
                self.notifier
                    .notify(Notice::error(err.user_message(&SEARCH_COPY)));
                SearchOutcome::Failed(err)
            }
        }
    }

    async fn fetch_results(&self, query: &SearchQuery) -> Result<SearchResponse, EngagementError> {
        let request =
            HttpRequest::get(self.endpoints.search.clone()).with_query(query.to_params());
        let reply = self.transport.send(request).await?;
        let login = self.session.login_url().await;
        let reply = classify(reply, AuthSignal::UnauthorizedOrLoginRedirect, &login)?;
        decode(&reply)
    }

    async fn fetch_recent(&self) -> Result<RecentResponse, EngagementError> {
        let reply = self
            .transport
            .send(HttpRequest::get(self.endpoints.recent.clone()))
            .await?;
        let login = self.session.login_url().await;
        let reply = classify(reply, AuthSignal::UnauthorizedOrLoginRedirect, &login)?;
        decode(&reply)
    }

    /// Reloads only the recent-search list. Discarded if a full search was
    /// issued meanwhile, since that response carries its own recent list.
    pub async fn refresh_recent(&self) -> SearchOutcome {
        let (search_seq, seq) = {
            let mut guard = self.inner.lock().await;
            guard.recent_issued += 1;
            (guard.issued, guard.recent_issued)
        };

        let result = self.fetch_recent().await;

        let mut guard = self.inner.lock().await;
        if guard.recent_issued != seq || guard.issued != search_seq {
            debug!("search: stale recent list discarded seq={seq}");
            return SearchOutcome::Stale;
        }

        match result {
            Ok(response) => {
                let listing = recent_listing(&response.recent);
                if let Some(current) = guard.current.as_mut() {
                    current.recent = response.recent;
                }
                self.view.render_recent(&listing);
                SearchOutcome::Rendered
            }
            Err(EngagementError::AuthRequired) => {
                drop(guard);
                let login = self.session.login_url().await;
                self.navigator.redirect_to_login(&login);
                SearchOutcome::Failed(EngagementError::AuthRequired)
            }
            Err(err) => {
                warn!("search: recent refresh failed error={err}");
                self.notifier
                    .notify(Notice::error(err.user_message(&RECENT_COPY)));
                SearchOutcome::Failed(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/search_tests.rs"]
mod tests;
