// Core algorithm exports
pub mod compatibility;
pub mod distance;
pub mod filters;
pub mod lifecycle;
pub mod matcher;

pub use compatibility::{can_donate, compatible_donors, compatible_recipients};
pub use distance::geodesic_distance_km;
pub use filters::{fulfillable_requests, is_eligible, location_text_matches};
pub use lifecycle::{open_request, LifecycleError, RequestLedger};
pub use matcher::{MatchResult, Matcher, ReferenceSource};
