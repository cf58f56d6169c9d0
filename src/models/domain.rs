use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// ABO/Rh blood group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "blood_group")]
pub enum BloodGroup {
    #[serde(rename = "O-")]
    #[sqlx(rename = "O-")]
    ONegative,
    #[serde(rename = "O+")]
    #[sqlx(rename = "O+")]
    OPositive,
    #[serde(rename = "A-")]
    #[sqlx(rename = "A-")]
    ANegative,
    #[serde(rename = "A+")]
    #[sqlx(rename = "A+")]
    APositive,
    #[serde(rename = "B-")]
    #[sqlx(rename = "B-")]
    BNegative,
    #[serde(rename = "B+")]
    #[sqlx(rename = "B+")]
    BPositive,
    #[serde(rename = "AB-")]
    #[sqlx(rename = "AB-")]
    ABNegative,
    #[serde(rename = "AB+")]
    #[sqlx(rename = "AB+")]
    ABPositive,
}

impl BloodGroup {
    pub const ALL: [BloodGroup; 8] = [
        BloodGroup::ONegative,
        BloodGroup::OPositive,
        BloodGroup::ANegative,
        BloodGroup::APositive,
        BloodGroup::BNegative,
        BloodGroup::BPositive,
        BloodGroup::ABNegative,
        BloodGroup::ABPositive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BloodGroup::ONegative => "O-",
            BloodGroup::OPositive => "O+",
            BloodGroup::ANegative => "A-",
            BloodGroup::APositive => "A+",
            BloodGroup::BNegative => "B-",
            BloodGroup::BPositive => "B+",
            BloodGroup::ABNegative => "AB-",
            BloodGroup::ABPositive => "AB+",
        }
    }
}

impl fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        BloodGroup::ALL
            .iter()
            .copied()
            .find(|group| group.as_str() == normalized)
            .ok_or_else(|| format!("unknown blood group '{}'", s))
    }
}

/// A resolved point on the map (WGS84 degrees)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Build coordinates, rejecting non-finite or out-of-range values
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);

        valid.then_some(Self { latitude, longitude })
    }

    /// Combine two optional columns into coordinates
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(lat), Some(lon)) => Self::new(lat, lon),
            _ => None,
        }
    }

    /// Parse GPS values as sent by browsers ("15.3647", " 75.1240 ")
    pub fn parse(latitude: &str, longitude: &str) -> Option<Self> {
        let lat = latitude.trim().parse::<f64>().ok()?;
        let lon = longitude.trim().parse::<f64>().ok()?;
        Self::new(lat, lon)
    }

    pub fn is_valid(&self) -> bool {
        Self::new(self.latitude, self.longitude).is_some()
    }
}

/// Registered blood donor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub contact: String,
    pub blood_group: BloodGroup,
    pub age: i32,
    pub gender: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Set when `location` changed after the coordinates were resolved
    pub geocode_stale: bool,
    pub available: bool,
    pub created_at: DateTime<Utc>,
}

impl Donor {
    /// Coordinates usable for ranking; stale coordinates are ignored
    pub fn coordinates(&self) -> Option<Coordinates> {
        if self.geocode_stale {
            return None;
        }
        Coordinates::from_parts(self.latitude, self.longitude)
    }

    pub fn needs_geocoding(&self) -> bool {
        self.coordinates().is_none()
    }

    pub fn set_coordinates(&mut self, coordinates: Coordinates) {
        self.latitude = Some(coordinates.latitude);
        self.longitude = Some(coordinates.longitude);
        self.geocode_stale = false;
    }

    /// Replace the free-text location, invalidating resolved coordinates if it changed
    pub fn relocate(&mut self, location: &str) {
        if self.location.trim() != location.trim() {
            self.location = location.trim().to_string();
            self.geocode_stale = true;
        }
    }
}

/// Registered blood receiver
///
/// Coordinates are stored but never resolved; searches locate donors from the
/// text or GPS given in the search itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receiver {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub contact: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub geocode_stale: bool,
    pub created_at: DateTime<Utc>,
}

impl Receiver {
    pub fn relocate(&mut self, location: &str) {
        if self.location.trim() != location.trim() {
            self.location = location.trim().to_string();
            self.geocode_stale = true;
        }
    }
}

/// Urgency of a blood request, ordered Low < Normal < High < Critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "urgency", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Normal,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "request_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Active,
    Fulfilled,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "requesting_for", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestingFor {
    Myself,
    SomeoneElse,
}

/// A receiver's request for blood
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodRequest {
    pub id: Uuid,
    pub receiver_id: Uuid,
    pub blood_group_needed: BloodGroup,
    pub quantity_needed: String,
    pub urgency: Urgency,
    pub hospital_name: String,
    pub hospital_location: String,
    pub contact_person: String,
    pub contact_number: String,
    pub needed_by_date: NaiveDate,
    pub additional_notes: Option<String>,
    pub requesting_for: RequestingFor,
    pub patient_name: Option<String>,
    pub patient_relation: Option<String>,
    pub status: RequestStatus,
    pub request_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "response_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Pending,
    Accepted,
    Rejected,
    Confirmed,
    Declined,
    Completed,
    Cancelled,
}

impl ResponseStatus {
    /// Statuses that a confirmation on the same request force-cancels
    pub fn is_open(&self) -> bool {
        matches!(self, ResponseStatus::Pending | ResponseStatus::Accepted)
    }

    /// Statuses from which a donor may still change their answer
    pub fn is_revisable(&self) -> bool {
        matches!(
            self,
            ResponseStatus::Pending | ResponseStatus::Accepted | ResponseStatus::Rejected
        )
    }
}

/// A donor's answer to a blood request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationResponse {
    pub id: Uuid,
    pub request_id: Uuid,
    pub donor_id: Uuid,
    pub status: ResponseStatus,
    pub donor_notes: Option<String>,
    pub receiver_notes: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub response_date: DateTime<Utc>,
}

/// Append-only record of a completed donation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationHistory {
    pub id: Uuid,
    pub donor_id: Uuid,
    pub request_id: Option<Uuid>,
    pub blood_type: BloodGroup,
    pub quantity: String,
    pub donation_date: DateTime<Utc>,
    pub location: String,
    pub status: String,
    pub notes: Option<String>,
}

/// Role of the authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Donor,
    Receiver,
    Admin,
}

/// Identity of whoever is driving an operation, supplied by the auth boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn donor(id: Uuid) -> Self {
        Self { id, role: Role::Donor }
    }

    pub fn receiver(id: Uuid) -> Self {
        Self { id, role: Role::Receiver }
    }

    pub fn admin(id: Uuid) -> Self {
        Self { id, role: Role::Admin }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A donor in a search result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorMatch {
    pub donor_id: Uuid,
    pub name: String,
    pub blood_group: BloodGroup,
    pub age: i32,
    pub gender: String,
    pub contact: String,
    pub location: String,
    /// `None` when the distance could not be computed
    pub distance_km: Option<f64>,
}

impl DonorMatch {
    pub fn from_donor(donor: Donor, distance_km: Option<f64>) -> Self {
        Self {
            donor_id: donor.id,
            name: donor.name,
            blood_group: donor.blood_group,
            age: donor.age,
            gender: donor.gender,
            contact: donor.contact,
            location: donor.location,
            distance_km,
        }
    }
}

/// Freshly geocoded coordinates to be written back to a donor row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateUpdate {
    pub donor_id: Uuid,
    pub coordinates: Coordinates,
}
