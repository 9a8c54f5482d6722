use serde::Serialize;
use tracing::info;
use url::Url;

use crate::error::AppError;

pub const PREFERENCES_STORE: &str = "preferences.json";

pub const KEY_SUPABASE_URL: &str = "supabase_url";
pub const KEY_ANON_KEY: &str = "supabase_anon_key";
pub const KEY_EDGE_BASE: &str = "edge_base";
pub const KEY_REPORT_DIR: &str = "report_dir";

const ENV_SUPABASE_URL: &str = "FOODLOOPS_SUPABASE_URL";
const ENV_ANON_KEY: &str = "FOODLOOPS_SUPABASE_ANON_KEY";
const ENV_EDGE_BASE: &str = "FOODLOOPS_EDGE_BASE";

/// Connection settings for the auth service and the edge functions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppConfig {
    pub supabase_url: String,
    pub anon_key: String,
    pub edge_base: String,
}

impl AppConfig {
    /// Resolve settings from the preferences store first, then the environment.
    ///
    /// `edge_base` defaults to `{supabase_url}/functions/v1`. Trailing slashes
    /// are trimmed so endpoint joins never double them.
    pub fn resolve<P, E>(prefs: P, env: E) -> Result<Self, AppError>
    where
        P: Fn(&str) -> Option<String>,
        E: Fn(&str) -> Option<String>,
    {
        let pick = |pref_key: &str, env_key: &str| {
            prefs(pref_key)
                .or_else(|| env(env_key))
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty())
        };

        let supabase_url = pick(KEY_SUPABASE_URL, ENV_SUPABASE_URL).ok_or_else(|| {
            AppError::Config(format!(
                "Supabase URL is not set. Configure it in Settings or set {}",
                ENV_SUPABASE_URL
            ))
        })?;
        let anon_key = pick(KEY_ANON_KEY, ENV_ANON_KEY).ok_or_else(|| {
            AppError::Config(format!(
                "Supabase anon key is not set. Configure it in Settings or set {}",
                ENV_ANON_KEY
            ))
        })?;
        let edge_base = pick(KEY_EDGE_BASE, ENV_EDGE_BASE)
            .unwrap_or_else(|| format!("{}/functions/v1", supabase_url));

        Url::parse(&supabase_url)
            .map_err(|e| AppError::Config(format!("Invalid Supabase URL '{}': {}", supabase_url, e)))?;
        Url::parse(&edge_base)
            .map_err(|e| AppError::Config(format!("Invalid edge base '{}': {}", edge_base, e)))?;

        info!("Resolved config: supabase={} edge_base={}", supabase_url, edge_base);
        Ok(Self {
            supabase_url,
            anon_key,
            edge_base,
        })
    }

    /// Absolute URL of an edge function, e.g. `admin-users`.
    pub fn endpoint(&self, function: &str) -> String {
        format!("{}/{}", self.edge_base, function)
    }

    pub fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.supabase_url, path)
    }
}
