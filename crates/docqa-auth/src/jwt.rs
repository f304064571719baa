use chrono::{Duration, Utc};
use docqa_error::{DocqaError, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ISSUER: &str = "docqa-auth";
const AUDIENCE: &str = "docqa-api";

/// Tokens live for 7 days; clients re-login afterwards.
const TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,   // user id
    pub email: String, // login email
    pub exp: i64,      // expiration timestamp
    pub iat: i64,      // issued at timestamp
    pub iss: String,   // issuer
    pub aud: String,   // audience
    pub jti: String,   // token id
}

impl Claims {
    pub fn new(user_id: Uuid, email: String) -> Self {
        let now = Utc::now();
        let exp = now + Duration::days(TOKEN_TTL_DAYS);

        Self {
            sub: user_id.to_string(),
            email,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|e| DocqaError::Authentication {
            message: format!("invalid user id in token: {}", e),
        })
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        let encoding_key = EncodingKey::from_secret(secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_audience(&[AUDIENCE]);

        Self {
            encoding_key,
            decoding_key,
            validation,
        }
    }

    pub fn issue_token(&self, user_id: Uuid, email: String) -> Result<String> {
        let claims = Claims::new(user_id, email);
        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            DocqaError::Internal {
                message: format!("failed to sign token: {}", e),
            }
        })
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => DocqaError::Authentication {
                    message: "token expired".to_string(),
                },
                jsonwebtoken::errors::ErrorKind::InvalidSignature => DocqaError::Authentication {
                    message: "invalid token signature".to_string(),
                },
                _ => DocqaError::Authentication {
                    message: format!("token verification failed: {}", e),
                },
            })
    }

    /// Extract the raw token from an `Authorization: Bearer <token>` header.
    pub fn extract_token_from_header(authorization: &str) -> Result<&str> {
        authorization
            .strip_prefix("Bearer ")
            .ok_or_else(|| DocqaError::Authentication {
                message: "invalid Authorization header format".to_string(),
            })
    }
}
