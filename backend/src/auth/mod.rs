//! Shared-secret gate for the material API.
//!
//! Callers present `X-API-Key`; a match grants the request the service's own
//! identity for persistence. The key carries no per-caller identity.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::AppState;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Fixed internal credential the service uses against the store. It is
/// stamped into `created_by` / `updated_by` on every write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    name: Arc<str>,
}

impl ServiceIdentity {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The configured secret. `None` means no key is configured and every
/// request is refused. Surrounding whitespace is ignored on both the
/// configured and the presented key.
#[derive(Clone, Default)]
pub struct ApiKey(Option<Arc<str>>);

impl ApiKey {
    pub fn new(secret: Option<String>) -> Self {
        Self(
            secret
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(Arc::from),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.0.is_some()
    }

    /// Compares SHA-256 digests in constant time.
    pub fn matches(&self, given: &str) -> bool {
        let Some(expected) = self.0.as_deref() else {
            return false;
        };
        let a = Sha256::digest(expected.as_bytes());
        let b = Sha256::digest(given.trim().as_bytes());
        a.as_slice().ct_eq(b.as_slice()).into()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ApiKey")
            .field(&if self.is_configured() { "<set>" } else { "<unset>" })
            .finish()
    }
}

/// Extractor that admits a request holding the configured API key and hands
/// the handler the service identity to act with.
pub struct ApiKeyAuth {
    pub service: ServiceIdentity,
}

#[async_trait]
impl<S> FromRequestParts<S> for ApiKeyAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let given = extract_api_key(&parts.headers).ok_or_else(|| {
            tracing::warn!(path = %parts.uri.path(), "Request without API key");
            AppError::Unauthorized
        })?;

        if !app_state.api_key.matches(given) {
            tracing::warn!(path = %parts.uri.path(), "Rejected API key");
            return Err(AppError::Unauthorized);
        }

        Ok(ApiKeyAuth {
            service: app_state.service.clone(),
        })
    }
}

fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(API_KEY_HEADER)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|k| !k.is_empty())
}
