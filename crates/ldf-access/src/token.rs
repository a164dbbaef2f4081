//! Bearer token extraction and validation.

use ldf_types::{LdfError, Role};
use uuid::Uuid;

/// Claims carried by a validated bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub user_id: Uuid,
    pub user_name: String,
    pub role: Role,
}

/// Extracts the raw token from `X-Subject-Token`, falling back to
/// `Authorization: Bearer …`. Neither header wins by position in the
/// request; `X-Subject-Token` is simply checked first.
pub fn extract_bearer_token<'a>(
    subject_token: Option<&'a str>,
    authorization: Option<&'a str>,
) -> Option<&'a str> {
    if let Some(token) = subject_token {
        let trimmed = token.trim();
        if !trimmed.is_empty() {
            return Some(trimmed);
        }
    }
    authorization.and_then(|header| header.strip_prefix("Bearer ")).map(str::trim)
}

/// Resolves an opaque bearer token into [`TokenClaims`]. Implemented
/// against whatever store owns users/sessions; kept as a trait so this
/// crate never depends on a concrete persistence layer.
#[async_trait::async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> anyhow::Result<TokenClaims>;
}

/// Extracts and validates a token from the two supported header sources.
/// Missing or invalid tokens both surface as [`LdfError::unauthorized`].
pub async fn authenticate(
    validator: &dyn TokenValidator,
    subject_token: Option<&str>,
    authorization: Option<&str>,
) -> Result<TokenClaims, LdfError> {
    let token = extract_bearer_token(subject_token, authorization)
        .ok_or_else(|| LdfError::unauthorized("missing bearer token"))?;

    validator
        .validate(token)
        .await
        .map_err(|_| LdfError::unauthorized("invalid or expired token"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_token_header_takes_precedence() {
        let token = extract_bearer_token(Some("abc"), Some("Bearer xyz"));
        assert_eq!(token, Some("abc"));
    }

    #[test]
    fn falls_back_to_authorization_bearer() {
        let token = extract_bearer_token(None, Some("Bearer xyz"));
        assert_eq!(token, Some("xyz"));
    }

    #[test]
    fn blank_subject_token_falls_through() {
        let token = extract_bearer_token(Some("   "), Some("Bearer xyz"));
        assert_eq!(token, Some("xyz"));
    }

    #[test]
    fn no_headers_yields_none() {
        assert_eq!(extract_bearer_token(None, None), None);
    }

    #[test]
    fn authorization_without_bearer_prefix_is_rejected() {
        assert_eq!(extract_bearer_token(None, Some("Basic xyz")), None);
    }

    struct AlwaysFails;

    #[async_trait::async_trait]
    impl TokenValidator for AlwaysFails {
        async fn validate(&self, _token: &str) -> anyhow::Result<TokenClaims> {
            Err(anyhow::anyhow!("nope"))
        }
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let err = authenticate(&AlwaysFails, None, None).await.unwrap_err();
        assert_eq!(err.kind, ldf_types::ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn invalid_token_is_unauthorized() {
        let err = authenticate(&AlwaysFails, None, Some("Bearer bad")).await.unwrap_err();
        assert_eq!(err.kind, ldf_types::ErrorKind::Unauthorized);
    }
}
