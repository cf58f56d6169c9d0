use std::sync::Arc;

use crate::core::{Matcher, ReferenceSource};
use crate::models::{
    BloodGroup, CoordinateUpdate, Coordinates, Donor, DonorMatch, SearchDonorsRequest,
    SearchDonorsResponse, SearchMode,
};
use crate::services::geocoder::Geocoder;

/// Normalised donor search parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub location_text: Option<String>,
    pub gps: Option<Coordinates>,
    pub blood_group: Option<BloodGroup>,
    pub radius_km: f64,
}

impl SearchQuery {
    /// Build a query from the HTTP payload
    ///
    /// Blank text and malformed GPS values are dropped rather than rejected.
    pub fn from_request(req: &SearchDonorsRequest, default_radius_km: f64) -> Self {
        let location_text = req
            .location_text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string);

        let gps = match (req.gps_lat.as_deref(), req.gps_lon.as_deref()) {
            (Some(lat), Some(lon)) => {
                let parsed = Coordinates::parse(lat, lon);
                if parsed.is_none() {
                    tracing::debug!("Ignoring malformed GPS coordinates ({}, {})", lat, lon);
                }
                parsed
            }
            _ => None,
        };

        Self {
            location_text,
            gps,
            blood_group: req.blood_group,
            radius_km: req.radius_km.unwrap_or(default_radius_km),
        }
    }
}

/// Everything a search produced, including side effects for the caller to persist
#[derive(Debug)]
pub struct SearchOutcome {
    pub matches: Vec<DonorMatch>,
    pub total_candidates: usize,
    pub mode: SearchMode,
    pub reference: Option<Coordinates>,
    pub radius_km: f64,
    /// Donor coordinates resolved on demand during this search
    pub coordinate_updates: Vec<CoordinateUpdate>,
}

impl SearchOutcome {
    pub fn into_response(self) -> SearchDonorsResponse {
        SearchDonorsResponse {
            total_results: self.matches.len(),
            distances_available: self.mode.distances_available(),
            donors: self.matches,
            mode: self.mode,
            reference: self.reference,
            radius_km: self.radius_km,
        }
    }
}

/// Orchestrates a donor search around the pure [`Matcher`]
///
/// Resolves the reference point, geocodes donors that have no usable
/// coordinates, then hands ranking to the matcher. Geocoding failures never
/// fail the search.
pub struct DonorSearch<G> {
    matcher: Matcher,
    geocoder: Arc<G>,
}

impl<G> Clone for DonorSearch<G> {
    fn clone(&self) -> Self {
        Self {
            matcher: self.matcher.clone(),
            geocoder: Arc::clone(&self.geocoder),
        }
    }
}

impl<G: Geocoder> DonorSearch<G> {
    pub fn new(matcher: Matcher, geocoder: Arc<G>) -> Self {
        Self { matcher, geocoder }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn geocoder(&self) -> &G {
        &self.geocoder
    }

    pub async fn search(&self, query: &SearchQuery, donors: Vec<Donor>) -> SearchOutcome {
        let candidates = self.matcher.eligible_donors(donors, query.blood_group);

        tracing::debug!(
            "{} eligible donors for search (blood group: {:?})",
            candidates.len(),
            query.blood_group
        );

        let (reference, source) = match (query.gps, query.location_text.as_deref()) {
            (Some(gps), _) => (gps, ReferenceSource::Gps),
            (None, Some(text)) => match self.geocoder.geocode(text).await {
                Ok(found) => (found.coordinates, ReferenceSource::Manual),
                Err(e) => {
                    tracing::warn!("Search location '{}' not geocoded ({}), using text match", text, e);
                    let result = self.matcher.text_fallback(text, candidates);
                    return SearchOutcome {
                        matches: result.matches,
                        total_candidates: result.total_candidates,
                        mode: SearchMode::TextMatch,
                        reference: None,
                        radius_km: query.radius_km,
                        coordinate_updates: Vec::new(),
                    };
                }
            },
            (None, None) => {
                let result = self.matcher.unranked(candidates);
                return SearchOutcome {
                    matches: result.matches,
                    total_candidates: result.total_candidates,
                    mode: SearchMode::None,
                    reference: None,
                    radius_km: query.radius_km,
                    coordinate_updates: Vec::new(),
                };
            }
        };

        let (candidates, coordinate_updates) = self.locate_donors(candidates).await;
        let result = self
            .matcher
            .rank_by_distance(reference, source, candidates, query.radius_km);

        let mode = match source {
            ReferenceSource::Gps => SearchMode::Gps,
            ReferenceSource::Manual => SearchMode::Geocoded,
        };

        tracing::info!(
            "Search ({:?}) around ({:.4}, {:.4}) within {} km: {} of {} donors",
            mode,
            reference.latitude,
            reference.longitude,
            query.radius_km,
            result.matches.len(),
            result.total_candidates
        );

        SearchOutcome {
            matches: result.matches,
            total_candidates: result.total_candidates,
            mode,
            reference: Some(reference),
            radius_km: query.radius_km,
            coordinate_updates,
        }
    }

    /// Geocode every donor without usable coordinates
    ///
    /// Calls go through the geocoder's rate limiter one at a time, so this
    /// takes at least the limiter interval per unresolved donor.
    async fn locate_donors(&self, mut donors: Vec<Donor>) -> (Vec<Donor>, Vec<CoordinateUpdate>) {
        let mut updates = Vec::new();

        for donor in donors.iter_mut().filter(|d| d.needs_geocoding()) {
            if donor.location.trim().is_empty() {
                continue;
            }

            match self.geocoder.geocode(&donor.location).await {
                Ok(found) => {
                    donor.set_coordinates(found.coordinates);
                    updates.push(CoordinateUpdate {
                        donor_id: donor.id,
                        coordinates: found.coordinates,
                    });
                }
                Err(e) => {
                    tracing::debug!("Donor {} location '{}' not geocoded: {}", donor.id, donor.location, e);
                }
            }
        }

        (donors, updates)
    }
}
