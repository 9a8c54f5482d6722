use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Search + pagination parameters for the list endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub page: u32,
    pub page_size: u32,
}

impl ListQuery {
    pub fn new(q: &str, page: u32, page_size: u32) -> Self {
        let q = q.trim();
        Self {
            q: (!q.is_empty()).then(|| q.to_string()),
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    /// `q=..&page=..&pageSize=..`, with `q` left out when empty.
    pub fn to_query_string(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if let Some(q) = self.q.as_deref().filter(|q| !q.is_empty()) {
            parts.push(format!("q={}", urlencoding::encode(q)));
        }
        parts.push(format!("page={}", self.page));
        parts.push(format!("pageSize={}", self.page_size));
        parts.join("&")
    }
}

/// One page of a list endpoint. Older functions answer with `items`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<R> {
    #[serde(alias = "items", default = "Vec::new")]
    pub data: Vec<R>,
    #[serde(default)]
    pub total: u64,
}

impl<R> Page<R> {
    /// Drop anything past `page_size`; `total` is left alone.
    pub fn capped(mut self, page_size: u32) -> Self {
        self.data.truncate(page_size as usize);
        self
    }
}

fn default_true() -> bool {
    true
}

fn null_as_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

/// Accepts `"3"`, `3` or `null` for fields whose type drifted between schema versions.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Treats an explicit `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `YYYY-MM-DD` part of a timestamp, for table display.
pub fn display_date(ts: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return dt.date_naive().to_string();
    }
    if let Ok(d) = NaiveDate::parse_from_str(ts.get(..10).unwrap_or(ts), "%Y-%m-%d") {
        return d.to_string();
    }
    ts.chars().take(10).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRow {
    #[serde(alias = "id")]
    pub id_user: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(default = "default_true", deserialize_with = "null_as_true")]
    pub enabled: bool,
}

/// PATCH body for enabling/disabling a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserToggle {
    pub id_user: i64,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRow {
    #[serde(alias = "id")]
    pub id_recipe: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub calories_per_serving_kcal: Option<f64>,
    /// Older rows carry calories under this key.
    #[serde(default, rename = "calories", skip_serializing_if = "Option::is_none")]
    pub legacy_calories: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(default)]
    pub source_platform: Option<String>,
    #[serde(default)]
    pub source_username: Option<String>,
}

impl RecipeRow {
    pub fn calories(&self) -> Option<f64> {
        self.calories_per_serving_kcal.or(self.legacy_calories)
    }
}

/// PATCH body for a recipe: the editable fields keyed by id, nothing else.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeUpdate {
    pub id_recipe: i64,
    pub title: String,
    pub difficulty: Option<String>,
    pub calories_per_serving_kcal: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagUsage {
    pub name: String,
    #[serde(default)]
    pub uses: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedRecipe {
    #[serde(alias = "id_recipe")]
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub saves: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayCount {
    pub day: String,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub name: String,
    #[serde(default)]
    pub users: u64,
}

/// Read-only aggregate behind the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub now: String,
    #[serde(default)]
    pub dau: u64,
    #[serde(default)]
    pub mau: u64,
    #[serde(default)]
    pub new_users_7d: u64,
    #[serde(default)]
    pub recipes_7d: u64,
    #[serde(default)]
    pub top_tags: Vec<TagUsage>,
    #[serde(default)]
    pub top_saved_recipes: Vec<SavedRecipe>,
    #[serde(default)]
    pub recipes_per_day_14: Vec<DayCount>,
    #[serde(default)]
    pub diets_distribution: Vec<Distribution>,
    #[serde(default)]
    pub allergies_distribution: Vec<Distribution>,
}

impl MetricsSnapshot {
    pub fn diet_total(&self) -> u64 {
        self.diets_distribution.iter().map(|d| d.users).sum()
    }

    pub fn allergy_total(&self) -> u64 {
        self.allergies_distribution.iter().map(|a| a.users).sum()
    }
}

/// One slice of a distribution with its share of the whole.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Share {
    pub name: String,
    pub users: u64,
    pub percent: String,
}

fn shares(items: &[Distribution], total: u64) -> Vec<Share> {
    items
        .iter()
        .map(|d| Share {
            name: d.name.clone(),
            users: d.users,
            percent: format_percent(d.users, total),
        })
        .collect()
}

/// Metrics plus the derived values the dashboard renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    #[serde(flatten)]
    pub metrics: MetricsSnapshot,
    pub updated_on: String,
    pub diet_shares: Vec<Share>,
    pub allergy_shares: Vec<Share>,
}

impl From<MetricsSnapshot> for Dashboard {
    fn from(metrics: MetricsSnapshot) -> Self {
        Self {
            updated_on: display_date(&metrics.now),
            diet_shares: shares(&metrics.diets_distribution, metrics.diet_total()),
            allergy_shares: shares(&metrics.allergies_distribution, metrics.allergy_total()),
            metrics,
        }
    }
}

/// Rounded share as `"NN%"`; `"0%"` when either side is zero.
pub fn format_percent(value: u64, total: u64) -> String {
    if value == 0 || total == 0 {
        return "0%".to_string();
    }
    format!("{}%", ((value as f64 / total as f64) * 100.0).round() as u64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Usage,
    Recipes,
    Users,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Usage => "usage",
            ReportKind::Recipes => "recipes",
            ReportKind::Users => "users",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "usage" => Ok(ReportKind::Usage),
            "recipes" => Ok(ReportKind::Recipes),
            "users" => Ok(ReportKind::Users),
            other => Err(format!("Unknown report type: '{}'. Supported: usage, recipes, users", other)),
        }
    }
}
