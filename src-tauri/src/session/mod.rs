//! Session handling: where bearer tokens come from.
//!
//! Everything that talks to the edge functions depends on [`TokenProvider`]
//! only. The auth client behind it owns the session; nobody else caches the
//! token.

pub mod store;
pub mod supabase;

use async_trait::async_trait;
use serde::Serialize;

pub use store::{KeyringSessionStore, MemorySessionStore, SessionStore};
pub use supabase::SupabaseAuth;

/// Source of the current access token.
///
/// Never fails: `None` means "unauthenticated", which is a valid answer.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Option<String>;
}

/// What the frontend is told about the signed-in admin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub email: Option<String>,
    pub expires_at: i64,
}

/// A provider that always answers with the same token.
pub struct StaticTokenProvider(Option<String>);

impl StaticTokenProvider {
    pub fn new(token: Option<&str>) -> Self {
        Self(token.map(|t| t.to_string()))
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Option<String> {
        self.0.clone()
    }
}
