use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::Validate;

use crate::core::RequestLedger;
use crate::models::{Actor, DonorFollowUpRequest, ReceiverDecisionRequest, Role};
use crate::routes::{require_role, ApiError, AppState};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/responses/{id}/confirm", web::post().to(confirm))
        .route("/responses/{id}/decline", web::post().to(decline))
        .route("/responses/{id}/complete", web::post().to(complete))
        .route("/responses/{id}/cancel", web::post().to(withdraw));
}

async fn ledger_for_response(state: &AppState, response_id: Uuid) -> Result<RequestLedger, ApiError> {
    let request_id = state.postgres.request_id_for_response(response_id).await?;
    Ok(state.postgres.require_ledger(request_id).await?)
}

/// Parse an optional JSON body: only an empty body means "no fields"
///
/// A body that is present but malformed is rejected rather than dropped.
fn optional_body<T>(body: &[u8]) -> Result<T, ApiError>
where
    T: DeserializeOwned + Default + Validate,
{
    let parsed = if body.iter().all(u8::is_ascii_whitespace) {
        T::default()
    } else {
        serde_json::from_slice(body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {}", e)))?
    };

    parsed.validate()?;
    Ok(parsed)
}

fn response_json(ledger: &RequestLedger, response_id: Uuid) -> HttpResponse {
    match ledger.responses().iter().find(|r| r.id == response_id) {
        Some(response) => HttpResponse::Ok().json(response),
        None => HttpResponse::Ok().finish(),
    }
}

/// Receiver confirms an accepted donor; the request becomes fulfilled
///
/// POST /api/v1/responses/{id}/confirm
async fn confirm(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<Uuid>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let decision: ReceiverDecisionRequest = optional_body(&body)?;

    let response_id = path.into_inner();
    let mut ledger = ledger_for_response(&state, response_id).await?;

    ledger.confirm(&actor, response_id, decision.notes, decision.scheduled_date)?;
    state.postgres.save_ledger(&ledger, None).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "request": ledger.request(),
        "responses": ledger.responses(),
    })))
}

/// POST /api/v1/responses/{id}/decline
async fn decline(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<Uuid>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let decision: ReceiverDecisionRequest = optional_body(&body)?;

    let response_id = path.into_inner();
    let mut ledger = ledger_for_response(&state, response_id).await?;

    ledger.decline(&actor, response_id, decision.notes)?;
    state.postgres.save_ledger(&ledger, None).await?;

    Ok(response_json(&ledger, response_id))
}

/// Donor reports a confirmed donation as given, appending it to their history
///
/// POST /api/v1/responses/{id}/complete
async fn complete(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<Uuid>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    require_role(&actor, Role::Donor)?;
    let follow_up: DonorFollowUpRequest = optional_body(&body)?;

    let response_id = path.into_inner();
    let donor = state.postgres.require_donor(actor.id).await?;
    let mut ledger = ledger_for_response(&state, response_id).await?;

    let history = ledger.complete(&actor, &donor, response_id, follow_up.notes, Utc::now())?;
    state.postgres.save_ledger(&ledger, Some(&history)).await?;

    tracing::info!("Donor {} completed donation for request {}", donor.id, ledger.request().id);

    Ok(HttpResponse::Ok().json(history))
}

/// Donor withdraws from a confirmed donation
///
/// POST /api/v1/responses/{id}/cancel
async fn withdraw(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<Uuid>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    require_role(&actor, Role::Donor)?;
    let follow_up: DonorFollowUpRequest = optional_body(&body)?;

    let response_id = path.into_inner();
    let donor = state.postgres.require_donor(actor.id).await?;
    let mut ledger = ledger_for_response(&state, response_id).await?;

    ledger.withdraw(&actor, &donor, response_id, follow_up.notes)?;
    state.postgres.save_ledger(&ledger, None).await?;

    tracing::warn!("Donor {} withdrew from fulfilled request {}", donor.id, ledger.request().id);

    Ok(response_json(&ledger, response_id))
}
