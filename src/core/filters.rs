use std::collections::HashSet;
use uuid::Uuid;

use crate::core::compatibility::can_donate;
use crate::models::{BloodGroup, BloodRequest, Donor, RequestStatus};

/// Words this short are ignored by the text fallback ("nr", "st", ...)
const MIN_MATCH_WORD_LEN: usize = 3;

/// Check whether a donor can appear in search results
///
/// This is Stage 1 of the search pipeline: availability, then an exact
/// blood group match when a filter is given.
#[inline]
pub fn is_eligible(donor: &Donor, blood_group: Option<BloodGroup>) -> bool {
    if !donor.available {
        return false;
    }

    match blood_group {
        Some(group) => donor.blood_group == group,
        None => true,
    }
}

/// Case-insensitive match between the search text and a donor's location text
///
/// Matches when either string contains the other, or when any search word
/// of three or more characters appears in the donor location.
pub fn location_text_matches(search: &str, donor_location: &str) -> bool {
    let search = search.trim().to_lowercase();
    let donor_location = donor_location.trim().to_lowercase();

    if search.is_empty() || donor_location.is_empty() {
        return false;
    }

    if donor_location.contains(&search) || search.contains(&donor_location) {
        return true;
    }

    search
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|word| word.chars().count() >= MIN_MATCH_WORD_LEN)
        .any(|word| donor_location.contains(word))
}

/// Check whether a donor could fulfil a request right now
#[inline]
pub fn can_fulfil(donor: &Donor, request: &BloodRequest) -> bool {
    request.status == RequestStatus::Active && can_donate(donor.blood_group, request.blood_group_needed)
}

/// Build a donor's "requests I can fulfil" feed
///
/// Keeps active, blood-compatible requests the donor has not answered yet,
/// most urgent first and then by the earliest needed-by date.
pub fn fulfillable_requests(
    donor: &Donor,
    requests: Vec<BloodRequest>,
    already_responded: &HashSet<Uuid>,
) -> Vec<BloodRequest> {
    let mut feed: Vec<BloodRequest> = requests
        .into_iter()
        .filter(|request| can_fulfil(donor, request))
        .filter(|request| !already_responded.contains(&request.id))
        .collect();

    feed.sort_by(|a, b| {
        b.urgency
            .cmp(&a.urgency)
            .then_with(|| a.needed_by_date.cmp(&b.needed_by_date))
            .then_with(|| a.request_date.cmp(&b.request_date))
    });

    feed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RequestingFor, Urgency};
    use chrono::{Duration, NaiveDate, Utc};

    fn create_donor(group: BloodGroup, available: bool) -> Donor {
        Donor {
            id: Uuid::new_v4(),
            name: "Test Donor".to_string(),
            email: "donor@example.com".to_string(),
            contact: "9000000000".to_string(),
            blood_group: group,
            age: 30,
            gender: "male".to_string(),
            location: "prashant nagar hubli".to_string(),
            latitude: None,
            longitude: None,
            geocode_stale: false,
            available,
            created_at: Utc::now(),
        }
    }

    fn create_request(group: BloodGroup, urgency: Urgency, days_out: i64) -> BloodRequest {
        BloodRequest {
            id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            blood_group_needed: group,
            quantity_needed: "1 unit".to_string(),
            urgency,
            hospital_name: "KIMS".to_string(),
            hospital_location: "Vidyanagar, Hubli".to_string(),
            contact_person: "Ravi".to_string(),
            contact_number: "9000000001".to_string(),
            needed_by_date: NaiveDate::from_ymd_opt(2026, 11, 1).unwrap() + Duration::days(days_out),
            additional_notes: None,
            requesting_for: RequestingFor::Myself,
            patient_name: None,
            patient_relation: None,
            status: RequestStatus::Active,
            request_date: Utc::now(),
        }
    }

    #[test]
    fn test_eligibility() {
        let donor = create_donor(BloodGroup::ONegative, true);
        assert!(is_eligible(&donor, None));
        assert!(is_eligible(&donor, Some(BloodGroup::ONegative)));
        assert!(!is_eligible(&donor, Some(BloodGroup::OPositive)));

        let unavailable = create_donor(BloodGroup::ONegative, false);
        assert!(!is_eligible(&unavailable, None));
    }

    #[test]
    fn test_text_match_word_overlap() {
        assert!(location_text_matches("hubli", "prashant nagar hubli "));
        assert!(location_text_matches("Gokul Road, Hubli", "prashant nagar hubli"));
        assert!(location_text_matches("HUBLI", "Hubli"));
        assert!(!location_text_matches("dharwad", "prashant nagar hubli"));
    }

    #[test]
    fn test_text_match_ignores_short_words() {
        assert!(!location_text_matches("nr ka", "prashant nagar hubli"));
        assert!(!location_text_matches("", "hubli"));
    }

    #[test]
    fn test_feed_filters_and_orders() {
        let donor = create_donor(BloodGroup::OPositive, true);

        let low = create_request(BloodGroup::APositive, Urgency::Low, 0);
        let critical_late = create_request(BloodGroup::BPositive, Urgency::Critical, 5);
        let critical_soon = create_request(BloodGroup::OPositive, Urgency::Critical, 1);
        let incompatible = create_request(BloodGroup::ANegative, Urgency::Critical, 0);
        let answered = create_request(BloodGroup::ABPositive, Urgency::High, 0);
        let mut fulfilled = create_request(BloodGroup::OPositive, Urgency::High, 0);
        fulfilled.status = RequestStatus::Fulfilled;

        let responded: HashSet<Uuid> = [answered.id].into_iter().collect();
        let feed = fulfillable_requests(
            &donor,
            vec![
                low.clone(),
                critical_late.clone(),
                critical_soon.clone(),
                incompatible,
                answered,
                fulfilled,
            ],
            &responded,
        );

        let ids: Vec<Uuid> = feed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![critical_soon.id, critical_late.id, low.id]);
    }
}
