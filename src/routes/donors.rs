use actix_web::{web, HttpResponse};
use chrono::Utc;
use validator::Validate;

use crate::core::fulfillable_requests;
use crate::models::{Actor, AvailabilityRequest, Donor, DonorProfileRequest, Role};
use crate::routes::{require_role, ApiError, AppState};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/donors/me", web::post().to(create_profile))
        .route("/donors/me", web::put().to(update_profile))
        .route("/donors/me/availability", web::put().to(set_availability))
        .route("/donors/me/feed", web::get().to(feed))
        .route("/donors/me/responses", web::get().to(my_responses))
        .route("/donors/me/history", web::get().to(my_history));
}

/// Copy edited profile fields onto a donor
///
/// Coordinates are not resolved here; a changed location is marked stale and
/// picked up by the next search that needs it.
pub(crate) fn apply_profile(donor: &mut Donor, profile: &DonorProfileRequest) {
    donor.name = profile.name.trim().to_string();
    donor.email = profile.email.trim().to_string();
    donor.contact = profile.contact.trim().to_string();
    donor.blood_group = profile.blood_group;
    donor.age = profile.age;
    donor.gender = profile.gender.trim().to_string();
    donor.relocate(&profile.location);
    if let Some(available) = profile.available {
        donor.available = available;
    }
}

/// POST /api/v1/donors/me
async fn create_profile(
    state: web::Data<AppState>,
    actor: Actor,
    req: web::Json<DonorProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    require_role(&actor, Role::Donor)?;
    req.validate()?;

    if state.postgres.get_donor(actor.id).await?.is_some() {
        return Err(ApiError::Conflict(format!("donor {} already has a profile", actor.id)));
    }

    let donor = Donor {
        id: actor.id,
        name: req.name.trim().to_string(),
        email: req.email.trim().to_string(),
        contact: req.contact.trim().to_string(),
        blood_group: req.blood_group,
        age: req.age,
        gender: req.gender.trim().to_string(),
        location: req.location.trim().to_string(),
        latitude: None,
        longitude: None,
        geocode_stale: false,
        available: req.available.unwrap_or(true),
        created_at: Utc::now(),
    };

    state.postgres.insert_donor(&donor).await?;
    tracing::info!("Registered {} donor {}", donor.blood_group, donor.id);

    Ok(HttpResponse::Created().json(donor))
}

/// PUT /api/v1/donors/me
async fn update_profile(
    state: web::Data<AppState>,
    actor: Actor,
    req: web::Json<DonorProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    require_role(&actor, Role::Donor)?;
    req.validate()?;

    let mut donor = state.postgres.require_donor(actor.id).await?;
    apply_profile(&mut donor, &req);
    state.postgres.update_donor(&donor).await?;

    Ok(HttpResponse::Ok().json(donor))
}

/// PUT /api/v1/donors/me/availability
async fn set_availability(
    state: web::Data<AppState>,
    actor: Actor,
    req: web::Json<AvailabilityRequest>,
) -> Result<HttpResponse, ApiError> {
    require_role(&actor, Role::Donor)?;

    state
        .postgres
        .set_donor_availability(actor.id, req.available)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "available": req.available })))
}

/// Active requests this donor could answer, most urgent first
///
/// GET /api/v1/donors/me/feed
async fn feed(state: web::Data<AppState>, actor: Actor) -> Result<HttpResponse, ApiError> {
    require_role(&actor, Role::Donor)?;

    let donor = state.postgres.require_donor(actor.id).await?;
    let requests = state.postgres.list_active_requests().await?;
    let responded = state.postgres.responded_request_ids(donor.id).await?;

    let feed = fulfillable_requests(&donor, requests, &responded);
    tracing::debug!("Feed for donor {}: {} requests", donor.id, feed.len());

    Ok(HttpResponse::Ok().json(feed))
}

/// GET /api/v1/donors/me/responses
async fn my_responses(state: web::Data<AppState>, actor: Actor) -> Result<HttpResponse, ApiError> {
    require_role(&actor, Role::Donor)?;
    let responses = state.postgres.list_responses_for_donor(actor.id).await?;
    Ok(HttpResponse::Ok().json(responses))
}

/// GET /api/v1/donors/me/history
async fn my_history(state: web::Data<AppState>, actor: Actor) -> Result<HttpResponse, ApiError> {
    require_role(&actor, Role::Donor)?;
    let history = state.postgres.list_history(actor.id).await?;
    Ok(HttpResponse::Ok().json(history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BloodGroup;
    use uuid::Uuid;

    fn profile(location: &str) -> DonorProfileRequest {
        DonorProfileRequest {
            name: " Asha ".to_string(),
            email: "asha@example.com".to_string(),
            contact: "9000000000".to_string(),
            blood_group: BloodGroup::BPositive,
            age: 30,
            gender: "female".to_string(),
            location: location.to_string(),
            available: None,
        }
    }

    fn located_donor() -> Donor {
        Donor {
            id: Uuid::new_v4(),
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            contact: "9000000000".to_string(),
            blood_group: BloodGroup::OPositive,
            age: 29,
            gender: "female".to_string(),
            location: "vidyanagar hubli".to_string(),
            latitude: Some(15.37),
            longitude: Some(75.13),
            geocode_stale: false,
            available: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_apply_profile_same_location_keeps_coordinates() {
        let mut donor = located_donor();
        apply_profile(&mut donor, &profile(" vidyanagar hubli "));

        assert_eq!(donor.name, "Asha");
        assert_eq!(donor.blood_group, BloodGroup::BPositive);
        assert!(!donor.geocode_stale);
        assert!(!donor.available);
    }

    #[test]
    fn test_apply_profile_new_location_marks_stale() {
        let mut donor = located_donor();
        let mut edit = profile("dharwad");
        edit.available = Some(true);
        apply_profile(&mut donor, &edit);

        assert_eq!(donor.location, "dharwad");
        assert!(donor.needs_geocoding());
        assert!(donor.available);
    }
}
