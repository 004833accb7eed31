//! Credential boundary
//!
//! The core only needs one thing from the auth collaborator: map a presented
//! bearer token to an account. Token issuance, expiry and signing live
//! outside this crate.

use crate::{errors::AuthError, ledger::AccountId};
use async_trait::async_trait;
use dashmap::DashMap;

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn identify(&self, token: &str) -> Result<AccountId, AuthError>;
}

/// Static token registry for development and tests.
#[derive(Default)]
pub struct StaticTokenAuth {
    tokens: DashMap<String, AccountId>,
}

impl StaticTokenAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, token: impl Into<String>, account: AccountId) {
        self.tokens.insert(token.into(), account);
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuth {
    async fn identify(&self, token: &str) -> Result<AccountId, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        self.tokens
            .get(token)
            .map(|entry| *entry.value())
            .ok_or(AuthError::InvalidToken)
    }
}
