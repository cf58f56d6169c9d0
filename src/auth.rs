//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs issued by the identity service. The service only
//! verifies them and turns the claims into an [`Actor`] that handlers pass
//! into every operation explicitly.

use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::StatusCode, web, FromRequest, HttpRequest, HttpResponse, ResponseError};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Actor, ErrorResponse, Role};

/// JWT claims carried by every access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Actor id
    pub sub: Uuid,
    pub role: Role,
    /// Expiration time (UTC Unix timestamp)
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingHeader,

    #[error("Invalid Authorization format. Expected: Bearer <token>")]
    MalformedHeader,

    #[error("Invalid or expired token")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Token verifier is not configured")]
    NotConfigured,
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(ErrorResponse {
            error: "unauthorized".to_string(),
            message: self.to_string(),
            status_code: status.as_u16(),
        })
    }
}

/// Verifies access tokens against the shared HMAC secret
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(), // HS256, validates exp
        }
    }

    pub fn verify(&self, token: &str) -> Result<Actor, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(Actor {
            id: data.claims.sub,
            role: data.claims.role,
        })
    }
}

/// Sign a token the way the identity service does; used by tests and local tooling
pub fn issue_token(
    actor: &Actor,
    secret: &str,
    ttl_secs: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: actor.id,
        role: actor.role,
        exp: chrono::Utc::now().timestamp() + ttl_secs,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

fn bearer_token(req: &HttpRequest) -> Result<&str, AuthError> {
    req.headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingHeader)?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(AuthError::MalformedHeader)
}

impl FromRequest for Actor {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = match req.app_data::<web::Data<JwtVerifier>>() {
            Some(verifier) => bearer_token(req).and_then(|token| verifier.verify(token)),
            None => Err(AuthError::NotConfigured),
        };

        if let Err(e) = &result {
            tracing::debug!("Rejected request to {}: {}", req.path(), e);
        }

        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_issued_token_verifies() {
        let actor = Actor::receiver(Uuid::new_v4());
        let token = issue_token(&actor, SECRET, 300).unwrap();

        let verified = JwtVerifier::new(SECRET).verify(&token).unwrap();
        assert_eq!(verified, actor);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token(&Actor::donor(Uuid::new_v4()), SECRET, 300).unwrap();
        let result = JwtVerifier::new("other-secret").verify(&token);
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = issue_token(&Actor::admin(Uuid::new_v4()), SECRET, -3600).unwrap();
        assert!(JwtVerifier::new(SECRET).verify(&token).is_err());
    }

    #[test]
    fn test_bearer_token_parsing() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer abc.def"))
            .to_http_request();
        assert_eq!(bearer_token(&req).unwrap(), "abc.def");

        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic xyz"))
            .to_http_request();
        assert!(matches!(bearer_token(&req), Err(AuthError::MalformedHeader)));

        let req = TestRequest::default().to_http_request();
        assert!(matches!(bearer_token(&req), Err(AuthError::MissingHeader)));
    }

    #[test]
    fn test_auth_error_status() {
        assert_eq!(AuthError::MissingHeader.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::NotConfigured.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
