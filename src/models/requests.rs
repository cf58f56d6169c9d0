use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::domain::{BloodGroup, RequestingFor, Urgency};

/// Request to search for donors near a location
///
/// GPS values are accepted as strings or numbers; anything that does not
/// parse into valid coordinates is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SearchDonorsRequest {
    #[validate(length(max = 200))]
    #[serde(default, alias = "location")]
    pub location_text: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub gps_lat: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub gps_lon: Option<String>,
    #[serde(default, alias = "bloodGroupFilter")]
    pub blood_group: Option<BloodGroup>,
    #[validate(range(exclusive_min = 0.0, max = 500.0))]
    #[serde(default)]
    pub radius_km: Option<f64>,
}

/// Accept `"15.3"`, `15.3` or `null` for GPS fields
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Geocode lookup query
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GeocodeQuery {
    #[validate(length(min = 1, max = 200))]
    pub address: String,
}

/// Reverse geocode lookup query
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReverseGeocodeQuery {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lon: f64,
}

/// Donor profile fields, used for creation and edits
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DonorProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 20))]
    pub contact: String,
    pub blood_group: BloodGroup,
    #[validate(range(min = 18, max = 65))]
    pub age: i32,
    #[validate(length(min = 1, max = 10))]
    pub gender: String,
    #[validate(length(min = 1, max = 200))]
    pub location: String,
    #[serde(default)]
    pub available: Option<bool>,
}

/// Receiver profile fields, used for creation and edits
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 20))]
    pub contact: String,
    #[validate(length(min = 1, max = 200))]
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityRequest {
    pub available: bool,
}

/// Receiver posting a new blood request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBloodRequest {
    pub blood_group_needed: BloodGroup,
    #[validate(length(min = 1, max = 50))]
    pub quantity_needed: String,
    #[serde(default = "default_urgency")]
    pub urgency: Urgency,
    #[validate(length(min = 1, max = 200))]
    pub hospital_name: String,
    #[validate(length(min = 1, max = 200))]
    pub hospital_location: String,
    #[validate(length(min = 1, max = 100))]
    pub contact_person: String,
    #[validate(length(min = 1, max = 20))]
    pub contact_number: String,
    pub needed_by_date: NaiveDate,
    #[validate(length(max = 1000))]
    #[serde(default)]
    pub additional_notes: Option<String>,
    #[serde(default = "default_requesting_for")]
    pub requesting_for: RequestingFor,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub patient_name: Option<String>,
    #[validate(length(max = 50))]
    #[serde(default)]
    pub patient_relation: Option<String>,
    /// Address the request to a single donor directly
    #[serde(default)]
    pub target_donor_id: Option<Uuid>,
}

fn default_urgency() -> Urgency {
    Urgency::Normal
}

fn default_requesting_for() -> RequestingFor {
    RequestingFor::Myself
}

/// Donor's answer to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DonorAnswer {
    Accept,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RespondRequest {
    pub answer: DonorAnswer,
    #[validate(length(max = 1000))]
    #[serde(default)]
    pub notes: Option<String>,
}

/// Receiver confirming or declining an accepted response
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverDecisionRequest {
    #[validate(length(max = 1000))]
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub scheduled_date: Option<NaiveDate>,
}

/// Donor closing out a confirmed response
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DonorFollowUpRequest {
    #[validate(length(max = 1000))]
    #[serde(default)]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_accepts_numeric_and_string_gps() {
        let req: SearchDonorsRequest = serde_json::from_str(
            r#"{"locationText":"hubli","gpsLat":"15.36","gpsLon":75.12,"bloodGroup":"O-"}"#,
        )
        .unwrap();

        assert_eq!(req.gps_lat.as_deref(), Some("15.36"));
        assert_eq!(req.gps_lon.as_deref(), Some("75.12"));
        assert_eq!(req.blood_group, Some(BloodGroup::ONegative));
        assert!(req.radius_km.is_none());
    }

    #[test]
    fn test_search_request_rejects_bad_radius() {
        let req = SearchDonorsRequest {
            radius_km: Some(0.0),
            ..Default::default()
        };
        assert!(req.validate().is_err());

        let req = SearchDonorsRequest {
            radius_km: Some(25.0),
            ..Default::default()
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreateBloodRequest = serde_json::from_str(
            r#"{
                "bloodGroupNeeded": "A+",
                "quantityNeeded": "2 units (450ml)",
                "hospitalName": "KIMS",
                "hospitalLocation": "Vidyanagar, Hubli",
                "contactPerson": "Ravi",
                "contactNumber": "9000000001",
                "neededByDate": "2026-11-01"
            }"#,
        )
        .unwrap();

        assert_eq!(req.urgency, Urgency::Normal);
        assert_eq!(req.requesting_for, RequestingFor::Myself);
        assert!(req.target_donor_id.is_none());
        assert!(req.validate().is_ok());
    }
}
