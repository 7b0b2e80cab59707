//! Caller identity for vendor-only routes.
//!
//! Tokens are issued elsewhere; this side only verifies the HS256 signature
//! with the shared secret and reads the claims.

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::server::AppState;

const VENDOR_ROLE: &str = "vendor";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

/// An authenticated caller holding the vendor role.
#[derive(Debug, Clone)]
pub struct Vendor {
    pub id: String,
}

impl Vendor {
    /// Fails unless this vendor owns the resource. `action` completes
    /// "Not authorized to ...".
    pub fn ensure_owns(&self, owner_id: &str, action: &str) -> Result<(), ApiError> {
        if self.id == owner_id {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!("Not authorized to {action}")))
        }
    }
}

pub fn decoding_key(secret: &str) -> DecodingKey {
    DecodingKey::from_secret(secret.as_bytes())
}

pub fn verify(token: &str, key: &DecodingKey) -> Result<Claims, ApiError> {
    jsonwebtoken::decode::<Claims>(token, key, &Validation::new(Algorithm::HS256))
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => ApiError::Unauthorized("Token expired".to_string()),
            _ => {
                debug!("Rejected token: {e}");
                ApiError::Forbidden("Invalid token".to_string())
            }
        })
}

impl FromRequestParts<AppState> for Vendor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.split_whitespace().nth(1))
            .ok_or_else(|| ApiError::Unauthorized("No token provided".to_string()))?;

        let claims = verify(token, &state.jwt_key)?;
        if claims.role != VENDOR_ROLE {
            return Err(ApiError::Forbidden("Vendor access required".to_string()));
        }
        Ok(Vendor { id: claims.sub })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn token(secret: &str, exp_offset: i64) -> String {
        let claims = Claims {
            sub: "v1".to_string(),
            role: VENDOR_ROLE.to_string(),
            exp: (chrono::Utc::now().timestamp() + exp_offset) as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn accepts_valid_token() {
        let claims = verify(&token("s3cret", 600), &decoding_key("s3cret")).unwrap();
        assert_eq!(claims.sub, "v1");
        assert_eq!(claims.role, "vendor");
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let err = verify(&token("s3cret", -3600), &decoding_key("s3cret")).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Token expired"));
    }

    #[test]
    fn wrong_secret_is_forbidden() {
        let err = verify(&token("other", 600), &decoding_key("s3cret")).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(ref m) if m == "Invalid token"));
    }

    #[test]
    fn ownership() {
        let vendor = Vendor { id: "v1".to_string() };
        assert!(vendor.ensure_owns("v1", "update this event").is_ok());
        let err = vendor.ensure_owns("v2", "update this event").unwrap_err();
        assert_eq!(err.to_string(), "Not authorized to update this event");
    }
}
