use actix_web::{web, HttpResponse};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Actor, DonorProfileRequest, ExpireResponse, ReceiverProfileRequest, Role};
use crate::routes::{donors, receivers, require_role, ApiError, AppState};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/admin/donors/{id}", web::put().to(update_donor))
        .route("/admin/donors/{id}", web::delete().to(delete_donor))
        .route("/admin/receivers/{id}", web::put().to(update_receiver))
        .route("/admin/receivers/{id}", web::delete().to(delete_receiver))
        .route("/admin/requests/expire", web::post().to(expire_requests));
}

/// PUT /api/v1/admin/donors/{id}
async fn update_donor(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<Uuid>,
    req: web::Json<DonorProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    require_role(&actor, Role::Admin)?;
    req.validate()?;

    let mut donor = state.postgres.require_donor(path.into_inner()).await?;
    donors::apply_profile(&mut donor, &req);
    state.postgres.update_donor(&donor).await?;

    tracing::info!("Admin {} edited donor {}", actor.id, donor.id);
    Ok(HttpResponse::Ok().json(donor))
}

/// DELETE /api/v1/admin/donors/{id}
async fn delete_donor(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    require_role(&actor, Role::Admin)?;
    let donor_id = path.into_inner();

    if !state.postgres.delete_donor(donor_id).await? {
        return Err(ApiError::NotFound(format!("donor {}", donor_id)));
    }

    tracing::info!("Admin {} deleted donor {}", actor.id, donor_id);
    Ok(HttpResponse::NoContent().finish())
}

/// PUT /api/v1/admin/receivers/{id}
async fn update_receiver(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<Uuid>,
    req: web::Json<ReceiverProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    require_role(&actor, Role::Admin)?;
    req.validate()?;

    let receiver_id = path.into_inner();
    let mut receiver = state
        .postgres
        .get_receiver(receiver_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("receiver {}", receiver_id)))?;

    receivers::apply_profile(&mut receiver, &req);
    state.postgres.update_receiver(&receiver).await?;

    tracing::info!("Admin {} edited receiver {}", actor.id, receiver.id);
    Ok(HttpResponse::Ok().json(receiver))
}

/// DELETE /api/v1/admin/receivers/{id}
async fn delete_receiver(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    require_role(&actor, Role::Admin)?;
    let receiver_id = path.into_inner();

    if !state.postgres.delete_receiver(receiver_id).await? {
        return Err(ApiError::NotFound(format!("receiver {}", receiver_id)));
    }

    tracing::info!("Admin {} deleted receiver {}", actor.id, receiver_id);
    Ok(HttpResponse::NoContent().finish())
}

/// Move every overdue active request to expired
///
/// POST /api/v1/admin/requests/expire
async fn expire_requests(state: web::Data<AppState>, actor: Actor) -> Result<HttpResponse, ApiError> {
    require_role(&actor, Role::Admin)?;

    let today = Utc::now().date_naive();
    let mut expired = 0u64;

    for request_id in state.postgres.overdue_request_ids(today).await? {
        let Some(mut ledger) = state.postgres.load_ledger(request_id).await? else {
            continue;
        };
        if ledger.expire_if_overdue(today) {
            state.postgres.save_ledger(&ledger, None).await?;
            expired += 1;
        }
    }

    tracing::info!("Expiry sweep moved {} requests to expired", expired);
    Ok(HttpResponse::Ok().json(ExpireResponse { expired }))
}
