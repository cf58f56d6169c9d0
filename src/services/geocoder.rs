use crate::config::GeocodingSettings;
use crate::models::Coordinates;
use moka::future::Cache;
use reqwest::Client;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Nominatim's usage policy allows one request per second; keep a margin
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(1100);

/// Errors that can occur when resolving addresses
///
/// None of these are fatal to a search: callers fall back to text matching
/// or to "unknown distance".
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Address is empty")]
    EmptyAddress,

    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Geocoding service returned error: {0}")]
    ApiError(String),

    #[error("No result for '{0}'")]
    NotFound(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// A successfully resolved address
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedAddress {
    pub coordinates: Coordinates,
    pub normalized_address: String,
}

/// Address lookup boundary used by the search service
pub trait Geocoder: Send + Sync {
    /// Resolve free text into coordinates
    fn geocode(&self, address: &str) -> impl Future<Output = Result<GeocodedAddress, GeocodeError>> + Send;

    /// Resolve coordinates into a display address
    fn reverse(&self, point: Coordinates) -> impl Future<Output = Result<String, GeocodeError>> + Send;
}

/// Tuning knobs for [`NominatimClient`]
#[derive(Debug, Clone)]
pub struct GeocoderOptions {
    pub base_url: String,
    pub user_agent: String,
    pub country: Option<String>,
    pub region: Option<String>,
    pub min_interval: Duration,
    pub timeout: Duration,
    pub cache_ttl: Duration,
    pub cache_capacity: u64,
}

impl GeocoderOptions {
    /// Build options from configuration, never going below the upstream rate limit
    pub fn from_settings(settings: &GeocodingSettings) -> Self {
        let configured = Duration::from_millis(settings.min_interval_ms.unwrap_or(1100));

        Self {
            base_url: settings.base_url.clone(),
            user_agent: settings.user_agent.clone(),
            country: settings.country.clone().filter(|c| !c.trim().is_empty()),
            region: settings.region.clone().filter(|r| !r.trim().is_empty()),
            min_interval: configured.max(MIN_REQUEST_INTERVAL),
            timeout: Duration::from_secs(settings.timeout_secs.unwrap_or(10)),
            cache_ttl: Duration::from_secs(settings.cache_ttl_secs.unwrap_or(86_400)),
            cache_capacity: settings.cache_capacity.unwrap_or(10_000),
        }
    }
}

/// Spaces out upstream calls by a fixed minimum interval
///
/// The lock is held while sleeping, so concurrent callers queue up behind
/// each other.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

/// Queries to try for an address, from most to least specific
///
/// The raw address first, then with the country appended, then with region
/// and country. Qualifiers the address already mentions are not repeated.
pub fn broadened_queries(address: &str, country: Option<&str>, region: Option<&str>) -> Vec<String> {
    let address = address.trim();
    let lower = address.to_lowercase();
    let mut queries = vec![address.to_string()];

    let Some(country) = country else {
        return queries;
    };
    if lower.contains(&country.to_lowercase()) {
        return queries;
    }

    queries.push(format!("{}, {}", address, country));

    if let Some(region) = region {
        if !lower.contains(&region.to_lowercase()) {
            queries.push(format!("{}, {}, {}", address, region, country));
        }
    }

    queries
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct NominatimReverse {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for a Nominatim-compatible geocoding service
///
/// Handles:
/// - Forward lookups with retry-by-broadening
/// - Reverse lookups
/// - Rate limiting shared by both
/// - Caching of successful forward lookups
pub struct NominatimClient {
    base_url: String,
    country: Option<String>,
    region: Option<String>,
    client: Client,
    limiter: RateLimiter,
    cache: Cache<String, GeocodedAddress>,
}

impl NominatimClient {
    pub fn new(options: GeocoderOptions) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent.clone())
            .build()?;

        let cache = moka::future::CacheBuilder::new(options.cache_capacity)
            .time_to_live(options.cache_ttl)
            .build();

        Ok(Self {
            base_url: options.base_url.trim_end_matches('/').to_string(),
            country: options.country,
            region: options.region,
            client,
            limiter: RateLimiter::new(options.min_interval),
            cache,
        })
    }

    /// Resolve an address, broadening the query until something matches
    pub async fn geocode_address(&self, address: &str) -> Result<GeocodedAddress, GeocodeError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(GeocodeError::EmptyAddress);
        }

        let key = address.to_lowercase();
        if let Some(hit) = self.cache.get(&key).await {
            tracing::trace!("Geocode cache hit: {}", key);
            return Ok(hit);
        }

        let queries = broadened_queries(address, self.country.as_deref(), self.region.as_deref());
        let mut last_error = GeocodeError::NotFound(address.to_string());

        for query in queries {
            match self.search_once(&query).await {
                Ok(found) => {
                    tracing::debug!(
                        "Geocoded '{}' via '{}' -> ({}, {})",
                        address,
                        query,
                        found.coordinates.latitude,
                        found.coordinates.longitude
                    );
                    self.cache.insert(key, found.clone()).await;
                    return Ok(found);
                }
                Err(e) => {
                    tracing::debug!("Geocoding attempt '{}' failed: {}", query, e);
                    last_error = e;
                }
            }
        }

        tracing::warn!("Could not geocode '{}': {}", address, last_error);
        Err(last_error)
    }

    /// Resolve coordinates into a display address
    pub async fn reverse_lookup(&self, point: Coordinates) -> Result<String, GeocodeError> {
        self.limiter.wait().await;

        let url = format!(
            "{}/reverse?lat={}&lon={}&format=jsonv2",
            self.base_url, point.latitude, point.longitude
        );

        tracing::debug!("Reverse geocoding ({}, {})", point.latitude, point.longitude);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(GeocodeError::ApiError(format!(
                "reverse lookup returned {}",
                response.status()
            )));
        }

        let body: NominatimReverse = response
            .json()
            .await
            .map_err(|e| GeocodeError::InvalidResponse(format!("Failed to parse reverse result: {}", e)))?;

        if let Some(error) = body.error {
            return Err(GeocodeError::NotFound(error));
        }

        body.display_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| {
                GeocodeError::NotFound(format!("{}, {}", point.latitude, point.longitude))
            })
    }

    async fn search_once(&self, query: &str) -> Result<GeocodedAddress, GeocodeError> {
        self.limiter.wait().await;

        let url = format!(
            "{}/search?q={}&format=jsonv2&limit=1",
            self.base_url,
            urlencoding::encode(query)
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(GeocodeError::ApiError(format!(
                "search returned {}",
                response.status()
            )));
        }

        let places: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|e| GeocodeError::InvalidResponse(format!("Failed to parse search result: {}", e)))?;

        let place = places
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::NotFound(query.to_string()))?;

        let coordinates = Coordinates::parse(&place.lat, &place.lon).ok_or_else(|| {
            GeocodeError::InvalidResponse(format!("bad coordinates {} / {}", place.lat, place.lon))
        })?;

        Ok(GeocodedAddress {
            coordinates,
            normalized_address: place.display_name,
        })
    }
}

impl Geocoder for NominatimClient {
    async fn geocode(&self, address: &str) -> Result<GeocodedAddress, GeocodeError> {
        self.geocode_address(address).await
    }

    async fn reverse(&self, point: Coordinates) -> Result<String, GeocodeError> {
        self.reverse_lookup(point).await
    }
}
