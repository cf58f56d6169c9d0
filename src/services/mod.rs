// Service exports
pub mod geocoder;
pub mod postgres;
pub mod search;

pub use geocoder::{GeocodeError, GeocodedAddress, Geocoder, GeocoderOptions, NominatimClient};
pub use postgres::{PostgresClient, PostgresError};
pub use search::{DonorSearch, SearchOutcome, SearchQuery};
