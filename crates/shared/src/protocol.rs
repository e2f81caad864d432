use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{ItemId, PresetId, PresetVisibility, ReactionKind, SearchScope, ViewerRole};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSummary {
    #[serde(default, alias = "keyword")]
    pub query: String,
    #[serde(default)]
    pub scope: SearchScope,
    #[serde(default)]
    pub news_count: u32,
    #[serde(default)]
    pub product_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsHit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    /// Staff-only.
    #[serde(default)]
    pub views: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductHit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
    /// Staff-only.
    #[serde(default)]
    pub stock: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentQuery {
    #[serde(default, alias = "keyword")]
    pub query: Option<String>,
    #[serde(default)]
    pub scope: SearchScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_count: Option<u32>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<FixedOffset>>,
}

impl RecentQuery {
    pub fn keyword(&self) -> Option<&str> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|keyword| !keyword.is_empty())
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<FixedOffset>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| DateTime::parse_from_rfc3339(value.trim()).ok()))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub summary: SearchSummary,
    #[serde(default)]
    pub news: Vec<NewsHit>,
    #[serde(default)]
    pub products: Vec<ProductHit>,
    #[serde(default)]
    pub recent: Vec<RecentQuery>,
    #[serde(default, alias = "viewer_role", skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl SearchResponse {
    pub fn viewer_role(&self) -> ViewerRole {
        ViewerRole::from_wire(self.role.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentResponse {
    #[serde(default)]
    pub recent: Vec<RecentQuery>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetFormResponse {
    pub form: String,
}

/// Server-confirmed projection of a preset. Everything beyond id, label and
/// visibility is kept as opaque criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: PresetId,
    pub label: String,
    #[serde(default, alias = "role_visibility")]
    pub owner_scope: PresetVisibility,
    #[serde(flatten)]
    pub criteria: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetSubmitResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, alias = "preset", skip_serializing_if = "Option::is_none")]
    pub preference: Option<Preset>,
    #[serde(default, alias = "listFragmentMarkup", skip_serializing_if = "Option::is_none")]
    pub card: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCount {
    pub key: ReactionKind,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionResponse {
    pub status: String,
    #[serde(default, alias = "userReaction")]
    pub user_reaction: Option<ReactionKind>,
    #[serde(default, alias = "counts")]
    pub reactions: Vec<ReactionCount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news_id: Option<ItemId>,
}

impl ReactionResponse {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }

    /// A blank reaction string from the service means the reaction was cleared.
    pub fn confirmed_reaction(&self) -> Option<ReactionKind> {
        self.user_reaction
            .clone()
            .filter(|kind| !kind.as_str().trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTotal {
    #[serde(default)]
    pub keyword: Option<String>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeTotal {
    #[serde(default)]
    pub scope: Option<String>,
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsResponse {
    #[serde(default)]
    pub top_queries: Vec<QueryTotal>,
    #[serde(default)]
    pub scope_breakdown: Vec<ScopeTotal>,
}
