use serde::{Deserialize, Serialize};

use crate::models::domain::{Coordinates, DonorMatch};

/// How the reference point of a search was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// No usable location; plain availability listing
    None,
    /// Caller-supplied GPS coordinates
    Gps,
    /// Free-text location resolved by the geocoder
    Geocoded,
    /// Geocoding failed; donors matched on location text, radius not applied
    TextMatch,
}

impl SearchMode {
    pub fn distances_available(&self) -> bool {
        matches!(self, SearchMode::Gps | SearchMode::Geocoded)
    }
}

/// Response for the donor search endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDonorsResponse {
    pub donors: Vec<DonorMatch>,
    pub total_results: usize,
    pub mode: SearchMode,
    pub distances_available: bool,
    pub reference: Option<Coordinates>,
    pub radius_km: f64,
}

/// Forward geocode result in the `{success, ...}` shape clients expect
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reverse geocode result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseGeocodeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

/// Result of the expiry sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpireResponse {
    pub expired: u64,
}
