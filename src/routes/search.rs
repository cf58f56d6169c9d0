use std::sync::Arc;

use actix_web::{web, HttpResponse};
use validator::Validate;

use crate::models::{
    Actor, Coordinates, GeocodeQuery, GeocodeResponse, HealthResponse, ReverseGeocodeQuery,
    ReverseGeocodeResponse, SearchDonorsRequest,
};
use crate::routes::{ApiError, AppState};
use crate::services::{GeocodeError, SearchQuery};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/donors/search", web::post().to(search_donors))
        .route("/geocode", web::get().to(geocode))
        .route("/geocode/reverse", web::get().to(reverse_geocode));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let pg_healthy = state.postgres.health_check().await.unwrap_or(false);

    let status = if pg_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Search available donors
///
/// POST /api/v1/donors/search
///
/// Request body:
/// ```json
/// {
///   "locationText": "hubli",
///   "gpsLat": "15.3647",
///   "gpsLon": "75.1240",
///   "bloodGroup": "O-",
///   "radiusKm": 10
/// }
/// ```
async fn search_donors(
    state: web::Data<AppState>,
    actor: Actor,
    req: web::Json<SearchDonorsRequest>,
) -> Result<HttpResponse, ApiError> {
    req.validate()?;

    let max_radius = state.search_settings.max_radius_km;
    if req.radius_km.is_some_and(|r| r > max_radius) {
        return Err(ApiError::BadRequest(format!(
            "radiusKm must not exceed {}",
            max_radius
        )));
    }

    let query = SearchQuery::from_request(&req, state.search.matcher().default_radius_km());

    tracing::info!(
        "Donor search by {} (gps: {}, text: {:?}, group: {:?})",
        actor.id,
        query.gps.is_some(),
        query.location_text,
        query.blood_group
    );

    let donors = state.postgres.list_available_donors(query.blood_group).await?;
    let mut outcome = state.search.search(&query, donors).await;

    let updates = std::mem::take(&mut outcome.coordinate_updates);
    if state.search_settings.persist_geocodes && !updates.is_empty() {
        let postgres = Arc::clone(&state.postgres);
        actix_web::rt::spawn(async move {
            if let Err(e) = postgres.save_donor_coordinates(&updates).await {
                tracing::warn!("Failed to save {} geocoded donor locations: {}", updates.len(), e);
            }
        });
    }

    Ok(HttpResponse::Ok().json(outcome.into_response()))
}

/// Forward geocode a free-text address
///
/// GET /api/v1/geocode?address={address}
async fn geocode(
    state: web::Data<AppState>,
    query: web::Query<GeocodeQuery>,
) -> Result<HttpResponse, ApiError> {
    query.validate()?;

    match state.search.geocoder().geocode_address(&query.address).await {
        Ok(found) => Ok(HttpResponse::Ok().json(GeocodeResponse {
            success: true,
            latitude: Some(found.coordinates.latitude),
            longitude: Some(found.coordinates.longitude),
            normalized_address: Some(found.normalized_address),
            error: None,
        })),
        Err(GeocodeError::EmptyAddress) => Err(ApiError::BadRequest(
            GeocodeError::EmptyAddress.to_string(),
        )),
        Err(e) => Ok(HttpResponse::Ok().json(GeocodeResponse {
            success: false,
            latitude: None,
            longitude: None,
            normalized_address: None,
            error: Some(e.to_string()),
        })),
    }
}

/// Reverse geocode a point to a display address
///
/// GET /api/v1/geocode/reverse?lat={lat}&lon={lon}
async fn reverse_geocode(
    state: web::Data<AppState>,
    query: web::Query<ReverseGeocodeQuery>,
) -> Result<HttpResponse, ApiError> {
    let point = Coordinates::new(query.lat, query.lon).ok_or_else(|| {
        ApiError::BadRequest(format!("invalid coordinates ({}, {})", query.lat, query.lon))
    })?;

    let body = match state.search.geocoder().reverse_lookup(point).await {
        Ok(address) => ReverseGeocodeResponse {
            success: true,
            address: Some(address),
            error: None,
        },
        Err(e) => ReverseGeocodeResponse {
            success: false,
            address: None,
            error: Some(e.to_string()),
        },
    };

    Ok(HttpResponse::Ok().json(body))
}
