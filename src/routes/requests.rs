use actix_web::{web, HttpResponse};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::core::open_request;
use crate::models::{Actor, CreateBloodRequest, RespondRequest, Role};
use crate::routes::{require_role, ApiError, AppState};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/requests", web::post().to(create_request))
        .route("/requests/mine", web::get().to(my_requests))
        .route("/requests/{id}", web::delete().to(delete_request))
        .route("/requests/{id}/responses", web::get().to(request_responses))
        .route("/requests/{id}/respond", web::post().to(respond))
        .route("/requests/{id}/cancel", web::post().to(cancel_request));
}

/// Post a blood request, optionally addressed to one donor
///
/// POST /api/v1/requests
async fn create_request(
    state: web::Data<AppState>,
    actor: Actor,
    req: web::Json<CreateBloodRequest>,
) -> Result<HttpResponse, ApiError> {
    req.validate()?;

    let now = Utc::now();
    let mut ledger = open_request(&actor, &req, now)?;

    if state.postgres.get_receiver(actor.id).await?.is_none() {
        return Err(ApiError::NotFound(format!(
            "receiver {} has no profile; create one first",
            actor.id
        )));
    }

    if let Some(donor_id) = req.target_donor_id {
        let donor = state.postgres.require_donor(donor_id).await?;
        ledger.invite(&donor, now)?;
        tracing::debug!("Request {} addressed to donor {}", ledger.request().id, donor_id);
    }

    state.postgres.insert_ledger(&ledger).await?;

    let (request, responses) = ledger.into_parts();
    Ok(HttpResponse::Created().json(serde_json::json!({
        "request": request,
        "responses": responses,
    })))
}

/// GET /api/v1/requests/mine
async fn my_requests(state: web::Data<AppState>, actor: Actor) -> Result<HttpResponse, ApiError> {
    require_role(&actor, Role::Receiver)?;
    let requests = state.postgres.list_requests_for_receiver(actor.id).await?;
    Ok(HttpResponse::Ok().json(requests))
}

/// Responses on a request, visible to its owner and admins
///
/// GET /api/v1/requests/{id}/responses
async fn request_responses(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let ledger = state.postgres.require_ledger(path.into_inner()).await?;
    ledger.ensure_can_delete(&actor)?;

    Ok(HttpResponse::Ok().json(ledger.responses()))
}

/// Donor accepts or rejects a request
///
/// POST /api/v1/requests/{id}/respond
async fn respond(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<Uuid>,
    req: web::Json<RespondRequest>,
) -> Result<HttpResponse, ApiError> {
    require_role(&actor, Role::Donor)?;
    req.validate()?;

    let donor = state.postgres.require_donor(actor.id).await?;
    let mut ledger = state.postgres.require_ledger(path.into_inner()).await?;

    let response = ledger
        .respond(&actor, &donor, req.answer, req.notes.clone(), Utc::now())?
        .clone();
    state.postgres.save_ledger(&ledger, None).await?;

    tracing::info!(
        "Donor {} answered request {} with {:?}",
        donor.id,
        response.request_id,
        response.status
    );

    Ok(HttpResponse::Ok().json(response))
}

/// POST /api/v1/requests/{id}/cancel
async fn cancel_request(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let mut ledger = state.postgres.require_ledger(path.into_inner()).await?;

    let cancelled = ledger.cancel(&actor)?;
    state.postgres.save_ledger(&ledger, None).await?;

    tracing::info!(
        "Request {} cancelled ({} open responses cancelled)",
        ledger.request().id,
        cancelled.len()
    );

    Ok(HttpResponse::Ok().json(ledger.request()))
}

/// DELETE /api/v1/requests/{id}
async fn delete_request(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let ledger = state.postgres.require_ledger(path.into_inner()).await?;
    ledger.ensure_can_delete(&actor)?;

    state.postgres.delete_request(ledger.request().id).await?;

    Ok(HttpResponse::NoContent().finish())
}
