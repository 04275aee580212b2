use crate::error::ApiError;
use crate::schemas::AppState;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::{HeaderMap, header, request::Parts},
    Json,
};
use model::entities::{session, user};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

/// JSON body extractor whose rejections use the API error format.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => {
                debug!("Rejected request body: {}", rejection.body_text());
                Err(ApiError::BadRequest(rejection.body_text()))
            }
        }
    }
}

/// The caller behind an authenticated request.
///
/// Resolved from `Authorization: Bearer <session key>`; missing, unknown or
/// expired keys reject the request with 401.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub account: user::Model,
    pub session: session::Model,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let key = bearer_token(&parts.headers).ok_or(ApiError::Unauthenticated)?;

        trace!("Resolving session from bearer token");
        match state.sessions.resolve(&state.db, key).await? {
            Some((session, account)) => {
                debug!("Request authenticated as account {}", account.id);
                Ok(CurrentSession { account, session })
            }
            None => Err(ApiError::Unauthenticated),
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);
    }
}
