use actix_web::{web, HttpResponse};
use chrono::Utc;
use validator::Validate;

use crate::models::{Actor, Receiver, ReceiverProfileRequest, Role};
use crate::routes::{require_role, ApiError, AppState};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/receivers/me", web::post().to(create_profile))
        .route("/receivers/me", web::put().to(update_profile));
}

/// Copy edited profile fields onto a receiver; a moved location marks its coordinates stale
pub(crate) fn apply_profile(receiver: &mut Receiver, profile: &ReceiverProfileRequest) {
    receiver.name = profile.name.trim().to_string();
    receiver.email = profile.email.trim().to_string();
    receiver.contact = profile.contact.trim().to_string();
    receiver.relocate(&profile.location);
}

/// POST /api/v1/receivers/me
async fn create_profile(
    state: web::Data<AppState>,
    actor: Actor,
    req: web::Json<ReceiverProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    require_role(&actor, Role::Receiver)?;
    req.validate()?;

    if state.postgres.get_receiver(actor.id).await?.is_some() {
        return Err(ApiError::Conflict(format!("receiver {} already has a profile", actor.id)));
    }

    let receiver = Receiver {
        id: actor.id,
        name: req.name.trim().to_string(),
        email: req.email.trim().to_string(),
        contact: req.contact.trim().to_string(),
        location: req.location.trim().to_string(),
        latitude: None,
        longitude: None,
        geocode_stale: false,
        created_at: Utc::now(),
    };

    state.postgres.insert_receiver(&receiver).await?;
    tracing::info!("Registered receiver {}", receiver.id);

    Ok(HttpResponse::Created().json(receiver))
}

/// PUT /api/v1/receivers/me
async fn update_profile(
    state: web::Data<AppState>,
    actor: Actor,
    req: web::Json<ReceiverProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    require_role(&actor, Role::Receiver)?;
    req.validate()?;

    let mut receiver = state
        .postgres
        .get_receiver(actor.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("receiver {}", actor.id)))?;

    apply_profile(&mut receiver, &req);

    state.postgres.update_receiver(&receiver).await?;

    Ok(HttpResponse::Ok().json(receiver))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn profile(location: &str) -> ReceiverProfileRequest {
        ReceiverProfileRequest {
            name: " City Hospital ".to_string(),
            email: " desk@cityhospital.in ".to_string(),
            contact: "0836-2222".to_string(),
            location: location.to_string(),
        }
    }

    fn located_receiver() -> Receiver {
        Receiver {
            id: Uuid::new_v4(),
            name: "City Hospital".to_string(),
            email: "old@cityhospital.in".to_string(),
            contact: "0836-1111".to_string(),
            location: "dharwad".to_string(),
            latitude: Some(15.45),
            longitude: Some(75.01),
            geocode_stale: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_apply_profile_same_location_is_not_stale() {
        let mut receiver = located_receiver();
        apply_profile(&mut receiver, &profile(" dharwad "));

        assert_eq!(receiver.name, "City Hospital");
        assert_eq!(receiver.email, "desk@cityhospital.in");
        assert_eq!(receiver.contact, "0836-2222");
        assert_eq!(receiver.location, "dharwad");
        assert!(!receiver.geocode_stale);
    }

    #[test]
    fn test_apply_profile_new_location_marks_stale() {
        let mut receiver = located_receiver();
        apply_profile(&mut receiver, &profile("hubli"));

        assert_eq!(receiver.location, "hubli");
        assert!(receiver.geocode_stale);
    }
}
