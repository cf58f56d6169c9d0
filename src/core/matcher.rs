use crate::core::{
    distance::geodesic_distance_km,
    filters::{is_eligible, location_text_matches},
};
use crate::models::{BloodGroup, Coordinates, Donor, DonorMatch};

/// Where the reference point of a radius search came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSource {
    /// Device GPS; donors without coordinates are dropped
    Gps,
    /// Geocoded search text; donors without coordinates are kept with unknown distance
    Manual,
}

/// Result of ranking donors around a reference point
#[derive(Debug)]
pub struct MatchResult {
    pub matches: Vec<DonorMatch>,
    pub total_candidates: usize,
}

/// Donor ranking pipeline
///
/// # Pipeline Stages
/// 1. Availability and blood group filtering
/// 2. Distance computation against the reference point
/// 3. Radius filtering and ascending sort
/// 4. Unknown-distance donors appended (manual searches only)
///
/// Everything here is pure; coordinate resolution happens in the search
/// service before ranking.
#[derive(Debug, Clone)]
pub struct Matcher {
    default_radius_km: f64,
}

impl Matcher {
    pub fn new(default_radius_km: f64) -> Self {
        Self { default_radius_km }
    }

    pub fn default_radius_km(&self) -> f64 {
        self.default_radius_km
    }

    /// Stage 1: keep available donors, optionally of one blood group
    pub fn eligible_donors(&self, donors: Vec<Donor>, blood_group: Option<BloodGroup>) -> Vec<Donor> {
        donors
            .into_iter()
            .filter(|donor| is_eligible(donor, blood_group))
            .collect()
    }

    /// Listing used when the searcher gave no usable location
    pub fn unranked(&self, donors: Vec<Donor>) -> MatchResult {
        let total_candidates = donors.len();
        let matches = donors
            .into_iter()
            .map(|donor| DonorMatch::from_donor(donor, None))
            .collect();

        MatchResult { matches, total_candidates }
    }

    /// Fallback when the search text could not be geocoded
    ///
    /// No radius applies here: every donor whose location text matches is
    /// returned, without distances.
    pub fn text_fallback(&self, search_text: &str, donors: Vec<Donor>) -> MatchResult {
        let total_candidates = donors.len();
        let matches = donors
            .into_iter()
            .filter(|donor| location_text_matches(search_text, &donor.location))
            .map(|donor| DonorMatch::from_donor(donor, None))
            .collect();

        MatchResult { matches, total_candidates }
    }

    /// Stages 2-4: rank donors by distance from `reference` within `radius_km`
    pub fn rank_by_distance(
        &self,
        reference: Coordinates,
        source: ReferenceSource,
        donors: Vec<Donor>,
        radius_km: f64,
    ) -> MatchResult {
        let total_candidates = donors.len();
        let mut located = Vec::with_capacity(donors.len());
        let mut unknown = Vec::new();

        for donor in donors {
            match geodesic_distance_km(Some(reference), donor.coordinates()) {
                Some(distance_km) if distance_km <= radius_km => {
                    located.push(DonorMatch::from_donor(donor, Some(distance_km)));
                }
                Some(_) => {}
                None => {
                    if source == ReferenceSource::Manual {
                        unknown.push(DonorMatch::from_donor(donor, None));
                    }
                }
            }
        }

        located.sort_by(|a, b| {
            a.distance_km
                .partial_cmp(&b.distance_km)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Re-check the radius on the final set before handing it out
        located.retain(|m| m.distance_km.map_or(false, |d| d <= radius_km));

        let mut matches = located;
        matches.extend(unknown);

        MatchResult { matches, total_candidates }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(10.0)
    }
}
