use std::collections::HashMap;

use axum::extract::{Extension, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::server::app::AppState;
use crate::server::error::ApiError;

/// Authenticated operator name from a bearer token
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operator(pub String);

/// Operator authentication middleware
///
/// Looks the Authorization header up in the configured tokens and adds an
/// `Operator` to request extensions. Unknown or missing tokens continue
/// without one; handlers that need an operator reject the request.
pub async fn operator_auth_middleware(
    Extension(state): Extension<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(operator) = extract_operator(&request, &state.operator_tokens) {
        debug!(operator = %operator.0, "Authenticated operator");
        request.extensions_mut().insert(operator);
    }

    next.run(request).await
}

fn extract_operator(request: &Request, tokens: &HashMap<String, String>) -> Option<Operator> {
    let auth_header = request.headers().get("authorization")?;
    let auth_str = auth_header.to_str().ok()?;

    // Handle both "Bearer <token>" and raw token
    let token = auth_str.strip_prefix("Bearer ").unwrap_or(auth_str).trim();

    tokens.get(token).map(|name| Operator(name.clone()))
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Operator
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Operator>()
            .cloned()
            .ok_or_else(ApiError::unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn tokens() -> HashMap<String, String> {
        HashMap::from([("tok-a".to_string(), "alice".to_string())])
    }

    #[test]
    fn test_extract_token_with_bearer() {
        let request = Request::builder()
            .header("authorization", "Bearer tok-a")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            extract_operator(&request, &tokens()),
            Some(Operator("alice".into()))
        );
    }

    #[test]
    fn test_extract_token_without_bearer() {
        let request = Request::builder()
            .header("authorization", "tok-a")
            .body(Body::empty())
            .unwrap();
        assert!(extract_operator(&request, &tokens()).is_some());
    }

    #[test]
    fn test_unknown_token_and_missing_header() {
        let request = Request::builder()
            .header("authorization", "Bearer nope")
            .body(Body::empty())
            .unwrap();
        assert!(extract_operator(&request, &tokens()).is_none());

        let request = Request::builder().body(Body::empty()).unwrap();
        assert!(extract_operator(&request, &tokens()).is_none());
    }
}
