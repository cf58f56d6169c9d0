// Route exports
pub mod admin;
pub mod donors;
pub mod receivers;
pub mod requests;
pub mod responses;
pub mod search;

use std::sync::Arc;

use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use thiserror::Error;

use crate::config::SearchSettings;
use crate::core::LifecycleError;
use crate::models::{Actor, ErrorResponse, Role};
use crate::services::{DonorSearch, NominatimClient, PostgresClient, PostgresError};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub postgres: Arc<PostgresClient>,
    pub search: DonorSearch<NominatimClient>,
    pub search_settings: Arc<SearchSettings>,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(search::configure)
            .configure(donors::configure)
            .configure(receivers::configure)
            .configure(requests::configure)
            .configure(responses::configure)
            .configure(admin::configure),
    );
}

/// Errors surfaced by HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Database(#[from] PostgresError),
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_failed",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Lifecycle(e) => match e {
                LifecycleError::Forbidden(_) => "forbidden",
                LifecycleError::NotFound(_) => "not_found",
                LifecycleError::Incompatible { .. } => "incompatible_blood_type",
                _ => "invalid_transition",
            },
            ApiError::Database(PostgresError::NotFound(_)) => "not_found",
            ApiError::Database(PostgresError::Duplicate(_)) => "conflict",
            ApiError::Database(_) => "database_error",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Lifecycle(e) => match e {
                LifecycleError::Forbidden(_) => StatusCode::FORBIDDEN,
                LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
                LifecycleError::Incompatible { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                LifecycleError::RequestClosed(_)
                | LifecycleError::InvalidTransition { .. }
                | LifecycleError::AlreadyConfirmed
                | LifecycleError::AlreadyResponded
                | LifecycleError::DonorUnavailable => StatusCode::CONFLICT,
            },
            ApiError::Database(PostgresError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Database(PostgresError::Duplicate(_)) => StatusCode::CONFLICT,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
            status_code: status.as_u16(),
        })
    }
}

pub(crate) fn require_role(actor: &Actor, role: Role) -> Result<(), ApiError> {
    if actor.role == role {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("{:?} role required", role)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BloodGroup, RequestStatus, ResponseStatus};
    use uuid::Uuid;

    #[test]
    fn test_lifecycle_errors_map_to_status() {
        let cases = [
            (LifecycleError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (LifecycleError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (LifecycleError::RequestClosed(RequestStatus::Fulfilled), StatusCode::CONFLICT),
            (
                LifecycleError::InvalidTransition {
                    from: ResponseStatus::Rejected,
                    to: ResponseStatus::Confirmed,
                },
                StatusCode::CONFLICT,
            ),
            (LifecycleError::AlreadyConfirmed, StatusCode::CONFLICT),
            (
                LifecycleError::Incompatible {
                    donor: BloodGroup::APositive,
                    needed: BloodGroup::ONegative,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status_code(), status);
        }
    }

    #[test]
    fn test_database_not_found_is_404() {
        let error = ApiError::from(PostgresError::NotFound("donor".into()));
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(error.kind(), "not_found");
    }

    #[test]
    fn test_duplicate_email_is_409() {
        let error = ApiError::from(PostgresError::Duplicate("donor with email a@b.c".into()));
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
        assert_eq!(error.kind(), "conflict");
    }

    #[test]
    fn test_require_role() {
        let donor = Actor::donor(Uuid::new_v4());
        assert!(require_role(&donor, Role::Donor).is_ok());
        assert!(matches!(require_role(&donor, Role::Admin), Err(ApiError::Forbidden(_))));
    }
}
