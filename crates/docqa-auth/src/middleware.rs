use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use std::sync::Arc;
use tower_http::auth::AsyncAuthorizeRequest;
use uuid::Uuid;

use crate::jwt::JwtService;

/// Identity of the authenticated caller, injected as a request extension by
/// [`BearerAuthorizer`].
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: String,
}

/// Bearer-token authorizer for the protected `/api` routes. Verifies the JWT
/// and attaches an [`AuthContext`]; anything else is a 401.
#[derive(Clone)]
pub struct BearerAuthorizer {
    jwt_service: Arc<JwtService>,
}

impl BearerAuthorizer {
    pub fn new(jwt_service: Arc<JwtService>) -> Self {
        Self { jwt_service }
    }

    fn authenticate<B>(&self, request: &Request<B>) -> Option<AuthContext> {
        let auth_header = request
            .headers()
            .get(axum::http::header::AUTHORIZATION)?
            .to_str()
            .ok()?;
        let token = JwtService::extract_token_from_header(auth_header).ok()?;
        let claims = self.jwt_service.verify_token(token).ok()?;
        let user_id = claims.user_id().ok()?;

        Some(AuthContext {
            user_id,
            email: claims.email,
        })
    }
}

impl<B> AsyncAuthorizeRequest<B> for BearerAuthorizer
where
    B: Send + 'static,
{
    type RequestBody = B;
    type ResponseBody = axum::body::Body;
    type Future = std::pin::Pin<
        Box<
            dyn std::future::Future<
                    Output = std::result::Result<Request<B>, Response<Self::ResponseBody>>,
                > + Send,
        >,
    >;

    fn authorize(&mut self, mut request: Request<B>) -> Self::Future {
        let auth = self.authenticate(&request);

        Box::pin(async move {
            match auth {
                Some(ctx) => {
                    request.extensions_mut().insert(ctx);
                    Ok(request)
                }
                None => {
                    let body = axum::Json(serde_json::json!({ "error": "unauthorized" }));
                    Err((StatusCode::UNAUTHORIZED, body).into_response())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_auth(value: Option<&str>) -> Request<()> {
        let mut builder = Request::builder().uri("/api/documents");
        if let Some(v) = value {
            builder = builder.header(axum::http::header::AUTHORIZATION, v);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_valid_bearer_token_authenticates() {
        let jwt = Arc::new(JwtService::new("test_secret_key_123456789"));
        let user_id = Uuid::new_v4();
        let token = jwt
            .issue_token(user_id, "user@example.com".to_string())
            .unwrap();

        let authorizer = BearerAuthorizer::new(jwt);
        let request = request_with_auth(Some(&format!("Bearer {}", token)));

        let ctx = authorizer.authenticate(&request).unwrap();
        assert_eq!(ctx.user_id, user_id);
        assert_eq!(ctx.email, "user@example.com");
    }

    #[test]
    fn test_missing_or_malformed_header_rejected() {
        let jwt = Arc::new(JwtService::new("test_secret_key_123456789"));
        let authorizer = BearerAuthorizer::new(jwt);

        assert!(authorizer.authenticate(&request_with_auth(None)).is_none());
        assert!(authorizer
            .authenticate(&request_with_auth(Some("Bearer garbage")))
            .is_none());
        assert!(authorizer
            .authenticate(&request_with_auth(Some("Basic dXNlcjpwYXNz")))
            .is_none());
    }
}
