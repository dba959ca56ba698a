//! Access token supply for Graph API calls
//!
//! Every fetch receives its credentials explicitly instead of reading a
//! process-wide variable, so tests and multi-account deployments can swap the
//! provider.

use super::error::SyncError;

pub trait CredentialsProvider: Send + Sync {
    /// Returns the bearer token to use for the next request
    fn access_token(&self) -> Result<String, SyncError>;
}

/// Single long-lived token shared by the whole deployment
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Result<Self, SyncError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(SyncError::Config(
                "FACEBOOK_PERMANENT_TOKEN is empty".to_string(),
            ));
        }
        Ok(Self { token })
    }
}

impl CredentialsProvider for StaticTokenProvider {
    fn access_token(&self) -> Result<String, SyncError> {
        Ok(self.token.clone())
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &"<redacted>")
            .finish()
    }
}
