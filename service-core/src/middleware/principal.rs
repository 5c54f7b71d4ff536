//! Request principal extractor.
//!
//! The web client's backend authenticates the user and forwards identity in
//! `X-User-ID` and `X-User-Role`. Services trust these headers; authentication
//! itself happens upstream.

use crate::error::AppError;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

pub const USER_ID_HEADER: &str = "X-User-ID";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

/// Authenticated caller of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub role: String,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: role.into(),
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, AppError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing {} header", name)))
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)?;
        let role = header(parts, USER_ROLE_HEADER)?;

        let span = tracing::Span::current();
        span.record("user_id", user_id);
        span.record("role", role);

        Ok(Principal::new(user_id, role.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> Result<Principal, AppError> {
        let (mut parts, _) = req.into_parts();
        Principal::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn extracts_user_and_lowercased_role() {
        let req = Request::builder()
            .header(USER_ID_HEADER, "u-17")
            .header(USER_ROLE_HEADER, "Cobranza")
            .body(())
            .unwrap();

        let principal = extract(req).await.unwrap();
        assert_eq!(principal, Principal::new("u-17", "cobranza"));
    }

    #[tokio::test]
    async fn missing_role_is_unauthorized() {
        let req = Request::builder()
            .header(USER_ID_HEADER, "u-17")
            .body(())
            .unwrap();

        let err = extract(req).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
