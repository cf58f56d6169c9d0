//! Blood Match - donor/recipient matching registry for blood donation
//!
//! This library provides donor search by distance and blood-type
//! compatibility, and the lifecycle of blood requests and donor responses.
//! The matching and lifecycle engine in [`core`] is pure; [`services`] and
//! [`routes`] wire it to PostgreSQL, the geocoding service and HTTP.

pub mod auth;
pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{can_donate, geodesic_distance_km, Matcher, RequestLedger};
pub use models::{Actor, BloodGroup, Coordinates, Donor, DonorMatch, SearchDonorsRequest, SearchDonorsResponse};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        assert!(can_donate(BloodGroup::ONegative, BloodGroup::ABPositive));
        assert_eq!(geodesic_distance_km(None, Coordinates::new(15.36, 75.12)), None);
    }
}
