use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::core::compatibility::can_donate;
use crate::models::{
    Actor, BloodGroup, BloodRequest, CreateBloodRequest, DonationHistory, DonationResponse,
    Donor, DonorAnswer, RequestStatus, ResponseStatus, Role,
};

/// Errors raised by request/response transitions
#[derive(Debug, Error, PartialEq)]
pub enum LifecycleError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request is {0:?}, not active")]
    RequestClosed(RequestStatus),

    #[error("Cannot move response from {from:?} to {to:?}")]
    InvalidTransition {
        from: ResponseStatus,
        to: ResponseStatus,
    },

    #[error("Request already has a confirmed donor")]
    AlreadyConfirmed,

    #[error("Donor has already responded to this request")]
    AlreadyResponded,

    #[error("Donor is not available")]
    DonorUnavailable,

    #[error("{donor} blood cannot be given to a {needed} recipient")]
    Incompatible { donor: BloodGroup, needed: BloodGroup },
}

/// Open a new blood request on behalf of a receiver
pub fn open_request(
    actor: &Actor,
    draft: &CreateBloodRequest,
    now: DateTime<Utc>,
) -> Result<RequestLedger, LifecycleError> {
    if actor.role != Role::Receiver {
        return Err(LifecycleError::Forbidden(
            "only receivers can post blood requests".to_string(),
        ));
    }

    let request = BloodRequest {
        id: Uuid::new_v4(),
        receiver_id: actor.id,
        blood_group_needed: draft.blood_group_needed,
        quantity_needed: draft.quantity_needed.trim().to_string(),
        urgency: draft.urgency,
        hospital_name: draft.hospital_name.trim().to_string(),
        hospital_location: draft.hospital_location.trim().to_string(),
        contact_person: draft.contact_person.trim().to_string(),
        contact_number: draft.contact_number.trim().to_string(),
        needed_by_date: draft.needed_by_date,
        additional_notes: draft.additional_notes.clone(),
        requesting_for: draft.requesting_for,
        patient_name: draft.patient_name.clone(),
        patient_relation: draft.patient_relation.clone(),
        status: RequestStatus::Active,
        request_date: now,
    };

    Ok(RequestLedger::new(request, Vec::new()))
}

/// A blood request together with every response on it
///
/// All state transitions go through here so the per-request invariants
/// (one response per donor, at most one confirmed response) are enforced in
/// one place. The persistence layer loads a ledger, applies a transition and
/// saves it back in a single transaction.
#[derive(Debug, Clone)]
pub struct RequestLedger {
    request: BloodRequest,
    responses: Vec<DonationResponse>,
}

impl RequestLedger {
    pub fn new(request: BloodRequest, responses: Vec<DonationResponse>) -> Self {
        Self { request, responses }
    }

    pub fn request(&self) -> &BloodRequest {
        &self.request
    }

    pub fn responses(&self) -> &[DonationResponse] {
        &self.responses
    }

    pub fn into_parts(self) -> (BloodRequest, Vec<DonationResponse>) {
        (self.request, self.responses)
    }

    pub fn response_for_donor(&self, donor_id: Uuid) -> Option<&DonationResponse> {
        self.responses.iter().find(|r| r.donor_id == donor_id)
    }

    /// Receivers may act only on their own requests
    pub fn ensure_owner(&self, actor: &Actor) -> Result<(), LifecycleError> {
        if actor.role == Role::Receiver && actor.id == self.request.receiver_id {
            Ok(())
        } else {
            Err(LifecycleError::Forbidden(format!(
                "request {} belongs to another receiver",
                self.request.id
            )))
        }
    }

    /// Owner or admin may delete a request
    pub fn ensure_can_delete(&self, actor: &Actor) -> Result<(), LifecycleError> {
        if actor.is_admin() {
            return Ok(());
        }
        self.ensure_owner(actor)
    }

    fn ensure_active(&self) -> Result<(), LifecycleError> {
        match self.request.status {
            RequestStatus::Active => Ok(()),
            other => Err(LifecycleError::RequestClosed(other)),
        }
    }

    fn position(&self, response_id: Uuid) -> Result<usize, LifecycleError> {
        self.responses
            .iter()
            .position(|r| r.id == response_id)
            .ok_or_else(|| LifecycleError::NotFound(format!("response {}", response_id)))
    }

    /// Address the request directly to one donor, creating a pending response
    pub fn invite(&mut self, donor: &Donor, now: DateTime<Utc>) -> Result<&DonationResponse, LifecycleError> {
        self.ensure_active()?;

        if !donor.available {
            return Err(LifecycleError::DonorUnavailable);
        }
        if !can_donate(donor.blood_group, self.request.blood_group_needed) {
            return Err(LifecycleError::Incompatible {
                donor: donor.blood_group,
                needed: self.request.blood_group_needed,
            });
        }
        if self.response_for_donor(donor.id).is_some() {
            return Err(LifecycleError::AlreadyResponded);
        }

        self.responses.push(DonationResponse {
            id: Uuid::new_v4(),
            request_id: self.request.id,
            donor_id: donor.id,
            status: ResponseStatus::Pending,
            donor_notes: None,
            receiver_notes: None,
            scheduled_date: None,
            response_date: now,
        });

        Ok(&self.responses[self.responses.len() - 1])
    }

    /// Donor accepts or rejects the request
    ///
    /// Answering again replaces the status, notes and timestamp of the
    /// donor's existing response instead of adding a second one.
    pub fn respond(
        &mut self,
        actor: &Actor,
        donor: &Donor,
        answer: DonorAnswer,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<&DonationResponse, LifecycleError> {
        if actor.role != Role::Donor || actor.id != donor.id {
            return Err(LifecycleError::Forbidden(
                "donors can only answer for themselves".to_string(),
            ));
        }
        self.ensure_active()?;

        let status = match answer {
            DonorAnswer::Accept => ResponseStatus::Accepted,
            DonorAnswer::Reject => ResponseStatus::Rejected,
        };

        if status == ResponseStatus::Accepted
            && !can_donate(donor.blood_group, self.request.blood_group_needed)
        {
            return Err(LifecycleError::Incompatible {
                donor: donor.blood_group,
                needed: self.request.blood_group_needed,
            });
        }

        if let Some(idx) = self.responses.iter().position(|r| r.donor_id == donor.id) {
            let existing = &mut self.responses[idx];
            if !existing.status.is_revisable() {
                return Err(LifecycleError::InvalidTransition {
                    from: existing.status,
                    to: status,
                });
            }
            existing.status = status;
            existing.donor_notes = notes;
            existing.response_date = now;
            return Ok(&self.responses[idx]);
        }

        self.responses.push(DonationResponse {
            id: Uuid::new_v4(),
            request_id: self.request.id,
            donor_id: donor.id,
            status,
            donor_notes: notes,
            receiver_notes: None,
            scheduled_date: None,
            response_date: now,
        });

        Ok(&self.responses[self.responses.len() - 1])
    }

    /// Receiver picks the donor who will give blood
    ///
    /// The request becomes fulfilled and every other pending or accepted
    /// response is cancelled. Returns the ids of the cancelled responses.
    pub fn confirm(
        &mut self,
        actor: &Actor,
        response_id: Uuid,
        notes: Option<String>,
        scheduled_date: Option<NaiveDate>,
    ) -> Result<Vec<Uuid>, LifecycleError> {
        self.ensure_owner(actor)?;
        self.ensure_active()?;

        if self.responses.iter().any(|r| r.status == ResponseStatus::Confirmed) {
            return Err(LifecycleError::AlreadyConfirmed);
        }

        let idx = self.position(response_id)?;
        let target = &mut self.responses[idx];
        if target.status != ResponseStatus::Accepted {
            return Err(LifecycleError::InvalidTransition {
                from: target.status,
                to: ResponseStatus::Confirmed,
            });
        }
        target.status = ResponseStatus::Confirmed;
        target.receiver_notes = notes;
        target.scheduled_date = scheduled_date;

        let cancelled = self.cancel_open_responses();
        self.request.status = RequestStatus::Fulfilled;

        tracing::info!(
            "Request {} fulfilled by response {} ({} competing responses cancelled)",
            self.request.id,
            response_id,
            cancelled.len()
        );

        Ok(cancelled)
    }

    /// Receiver turns down an accepted response
    pub fn decline(
        &mut self,
        actor: &Actor,
        response_id: Uuid,
        notes: Option<String>,
    ) -> Result<&DonationResponse, LifecycleError> {
        self.ensure_owner(actor)?;
        self.ensure_active()?;

        let idx = self.position(response_id)?;
        let target = &mut self.responses[idx];
        if target.status != ResponseStatus::Accepted {
            return Err(LifecycleError::InvalidTransition {
                from: target.status,
                to: ResponseStatus::Declined,
            });
        }
        target.status = ResponseStatus::Declined;
        target.receiver_notes = notes;

        Ok(&self.responses[idx])
    }

    /// Donor reports the confirmed donation as done
    ///
    /// Returns the history entry to append.
    pub fn complete(
        &mut self,
        actor: &Actor,
        donor: &Donor,
        response_id: Uuid,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<DonationHistory, LifecycleError> {
        let idx = self.confirmed_response_of(actor, donor, response_id, ResponseStatus::Completed)?;
        let target = &mut self.responses[idx];
        target.status = ResponseStatus::Completed;
        if notes.is_some() {
            target.donor_notes = notes.clone();
        }

        Ok(DonationHistory {
            id: Uuid::new_v4(),
            donor_id: donor.id,
            request_id: Some(self.request.id),
            blood_type: donor.blood_group,
            quantity: self.request.quantity_needed.clone(),
            donation_date: now,
            location: format!("{}, {}", self.request.hospital_name, self.request.hospital_location),
            status: "Completed".to_string(),
            notes,
        })
    }

    /// Donor backs out of a confirmed donation
    pub fn withdraw(
        &mut self,
        actor: &Actor,
        donor: &Donor,
        response_id: Uuid,
        notes: Option<String>,
    ) -> Result<&DonationResponse, LifecycleError> {
        let idx = self.confirmed_response_of(actor, donor, response_id, ResponseStatus::Cancelled)?;
        let target = &mut self.responses[idx];
        target.status = ResponseStatus::Cancelled;
        if notes.is_some() {
            target.donor_notes = notes;
        }

        Ok(&self.responses[idx])
    }

    fn confirmed_response_of(
        &self,
        actor: &Actor,
        donor: &Donor,
        response_id: Uuid,
        to: ResponseStatus,
    ) -> Result<usize, LifecycleError> {
        if actor.role != Role::Donor || actor.id != donor.id {
            return Err(LifecycleError::Forbidden(
                "donors can only update their own responses".to_string(),
            ));
        }

        let idx = self.position(response_id)?;
        let target = &self.responses[idx];
        if target.donor_id != donor.id {
            return Err(LifecycleError::Forbidden(format!(
                "response {} belongs to another donor",
                response_id
            )));
        }
        if target.status != ResponseStatus::Confirmed {
            return Err(LifecycleError::InvalidTransition { from: target.status, to });
        }

        Ok(idx)
    }

    /// Receiver (or admin) withdraws an active request
    pub fn cancel(&mut self, actor: &Actor) -> Result<Vec<Uuid>, LifecycleError> {
        self.ensure_can_delete(actor)?;
        self.ensure_active()?;

        self.request.status = RequestStatus::Cancelled;
        Ok(self.cancel_open_responses())
    }

    /// Move an overdue active request to expired
    ///
    /// Returns `false` when the request is not active or still in date.
    pub fn expire_if_overdue(&mut self, today: NaiveDate) -> bool {
        if self.request.status != RequestStatus::Active || self.request.needed_by_date >= today {
            return false;
        }

        self.request.status = RequestStatus::Expired;
        self.cancel_open_responses();
        true
    }

    fn cancel_open_responses(&mut self) -> Vec<Uuid> {
        self.responses
            .iter_mut()
            .filter(|r| r.status.is_open())
            .map(|r| {
                r.status = ResponseStatus::Cancelled;
                r.id
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RequestingFor, Urgency};

    fn create_donor(group: BloodGroup) -> Donor {
        Donor {
            id: Uuid::new_v4(),
            name: "Donor".to_string(),
            email: "donor@example.com".to_string(),
            contact: "9000000000".to_string(),
            blood_group: group,
            age: 30,
            gender: "male".to_string(),
            location: "hubli".to_string(),
            latitude: None,
            longitude: None,
            geocode_stale: false,
            available: true,
            created_at: Utc::now(),
        }
    }

    fn create_draft(group: BloodGroup) -> CreateBloodRequest {
        CreateBloodRequest {
            blood_group_needed: group,
            quantity_needed: "2 units (450ml)".to_string(),
            urgency: Urgency::High,
            hospital_name: "KIMS".to_string(),
            hospital_location: "Vidyanagar, Hubli".to_string(),
            contact_person: "Ravi".to_string(),
            contact_number: "9000000001".to_string(),
            needed_by_date: NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
            additional_notes: None,
            requesting_for: RequestingFor::Myself,
            patient_name: None,
            patient_relation: None,
            target_donor_id: None,
        }
    }

    fn open(receiver: &Actor, group: BloodGroup) -> RequestLedger {
        open_request(receiver, &create_draft(group), Utc::now()).unwrap()
    }

    #[test]
    fn test_only_receivers_open_requests() {
        let donor = Actor::donor(Uuid::new_v4());
        let err = open_request(&donor, &create_draft(BloodGroup::APositive), Utc::now()).unwrap_err();
        assert!(matches!(err, LifecycleError::Forbidden(_)));
    }

    #[test]
    fn test_respond_twice_updates_single_row() {
        let receiver = Actor::receiver(Uuid::new_v4());
        let donor = create_donor(BloodGroup::OPositive);
        let actor = Actor::donor(donor.id);
        let mut ledger = open(&receiver, BloodGroup::APositive);

        ledger
            .respond(&actor, &donor, DonorAnswer::Reject, Some("busy".into()), Utc::now())
            .unwrap();
        let second = ledger
            .respond(&actor, &donor, DonorAnswer::Accept, Some("free now".into()), Utc::now())
            .unwrap()
            .clone();

        assert_eq!(ledger.responses().len(), 1);
        assert_eq!(second.status, ResponseStatus::Accepted);
        assert_eq!(second.donor_notes.as_deref(), Some("free now"));
    }

    #[test]
    fn test_incompatible_donor_cannot_accept() {
        let receiver = Actor::receiver(Uuid::new_v4());
        let donor = create_donor(BloodGroup::APositive);
        let mut ledger = open(&receiver, BloodGroup::ONegative);

        let err = ledger
            .respond(&Actor::donor(donor.id), &donor, DonorAnswer::Accept, None, Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            LifecycleError::Incompatible {
                donor: BloodGroup::APositive,
                needed: BloodGroup::ONegative
            }
        );
    }

    #[test]
    fn test_confirm_cancels_competitors_and_fulfils() {
        let receiver = Actor::receiver(Uuid::new_v4());
        let mut ledger = open(&receiver, BloodGroup::ABPositive);

        let donors: Vec<Donor> = [BloodGroup::OPositive, BloodGroup::APositive, BloodGroup::BPositive]
            .into_iter()
            .map(create_donor)
            .collect();
        for donor in &donors {
            ledger
                .respond(&Actor::donor(donor.id), donor, DonorAnswer::Accept, None, Utc::now())
                .unwrap();
        }
        let invitee = create_donor(BloodGroup::ONegative);
        ledger.invite(&invitee, Utc::now()).unwrap();

        let chosen = ledger.response_for_donor(donors[1].id).unwrap().id;
        let cancelled = ledger.confirm(&receiver, chosen, Some("see you".into()), None).unwrap();

        assert_eq!(cancelled.len(), 3);
        assert_eq!(ledger.request().status, RequestStatus::Fulfilled);
        let confirmed: Vec<_> = ledger
            .responses()
            .iter()
            .filter(|r| r.status == ResponseStatus::Confirmed)
            .collect();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].id, chosen);
        assert!(ledger
            .responses()
            .iter()
            .filter(|r| r.id != chosen)
            .all(|r| r.status == ResponseStatus::Cancelled));
    }

    #[test]
    fn test_confirm_requires_owner() {
        let receiver = Actor::receiver(Uuid::new_v4());
        let stranger = Actor::receiver(Uuid::new_v4());
        let donor = create_donor(BloodGroup::OPositive);
        let mut ledger = open(&receiver, BloodGroup::OPositive);
        let response_id = ledger
            .respond(&Actor::donor(donor.id), &donor, DonorAnswer::Accept, None, Utc::now())
            .unwrap()
            .id;

        let err = ledger.confirm(&stranger, response_id, None, None).unwrap_err();
        assert!(matches!(err, LifecycleError::Forbidden(_)));
        assert_eq!(ledger.request().status, RequestStatus::Active);
    }

    #[test]
    fn test_confirm_requires_accepted_response() {
        let receiver = Actor::receiver(Uuid::new_v4());
        let donor = create_donor(BloodGroup::OPositive);
        let mut ledger = open(&receiver, BloodGroup::OPositive);
        let response_id = ledger.invite(&donor, Utc::now()).unwrap().id;

        let err = ledger.confirm(&receiver, response_id, None, None).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::InvalidTransition {
                from: ResponseStatus::Pending,
                to: ResponseStatus::Confirmed
            }
        );
    }

    #[test]
    fn test_complete_appends_history() {
        let receiver = Actor::receiver(Uuid::new_v4());
        let donor = create_donor(BloodGroup::OPositive);
        let actor = Actor::donor(donor.id);
        let mut ledger = open(&receiver, BloodGroup::OPositive);
        let response_id = ledger
            .respond(&actor, &donor, DonorAnswer::Accept, None, Utc::now())
            .unwrap()
            .id;
        ledger.confirm(&receiver, response_id, None, None).unwrap();

        let history = ledger
            .complete(&actor, &donor, response_id, Some("done".into()), Utc::now())
            .unwrap();

        assert_eq!(history.donor_id, donor.id);
        assert_eq!(history.blood_type, BloodGroup::OPositive);
        assert_eq!(history.quantity, "2 units (450ml)");
        assert_eq!(
            ledger.response_for_donor(donor.id).unwrap().status,
            ResponseStatus::Completed
        );

        // Completed responses are final
        let err = ledger
            .withdraw(&actor, &donor, response_id, None)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    }

    #[test]
    fn test_complete_keeps_full_hospital_location() {
        let receiver = Actor::receiver(Uuid::new_v4());
        let donor = create_donor(BloodGroup::ONegative);
        let actor = Actor::donor(donor.id);

        let mut draft = create_draft(BloodGroup::ABPositive);
        draft.hospital_name = "H".repeat(200);
        draft.hospital_location = "L".repeat(200);
        assert!(validator::Validate::validate(&draft).is_ok());

        let mut ledger = open_request(&receiver, &draft, Utc::now()).unwrap();
        let response_id = ledger
            .respond(&actor, &donor, DonorAnswer::Accept, None, Utc::now())
            .unwrap()
            .id;
        ledger.confirm(&receiver, response_id, None, None).unwrap();

        let history = ledger
            .complete(&actor, &donor, response_id, None, Utc::now())
            .unwrap();

        assert_eq!(history.location.chars().count(), 402);
        assert_eq!(history.location, format!("{}, {}", "H".repeat(200), "L".repeat(200)));
    }

    #[test]
    fn test_cannot_respond_after_fulfilment() {
        let receiver = Actor::receiver(Uuid::new_v4());
        let first = create_donor(BloodGroup::OPositive);
        let late = create_donor(BloodGroup::OPositive);
        let mut ledger = open(&receiver, BloodGroup::OPositive);
        let response_id = ledger
            .respond(&Actor::donor(first.id), &first, DonorAnswer::Accept, None, Utc::now())
            .unwrap()
            .id;
        ledger.confirm(&receiver, response_id, None, None).unwrap();

        let err = ledger
            .respond(&Actor::donor(late.id), &late, DonorAnswer::Accept, None, Utc::now())
            .unwrap_err();
        assert_eq!(err, LifecycleError::RequestClosed(RequestStatus::Fulfilled));
    }

    #[test]
    fn test_cancel_and_expire() {
        let receiver = Actor::receiver(Uuid::new_v4());
        let donor = create_donor(BloodGroup::OPositive);
        let mut ledger = open(&receiver, BloodGroup::OPositive);
        ledger.invite(&donor, Utc::now()).unwrap();

        let cancelled = ledger.cancel(&receiver).unwrap();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(ledger.request().status, RequestStatus::Cancelled);

        let mut overdue = open(&receiver, BloodGroup::OPositive);
        let due = overdue.request().needed_by_date;
        assert!(!overdue.expire_if_overdue(due));
        assert!(overdue.expire_if_overdue(due.succ_opt().unwrap()));
        assert_eq!(overdue.request().status, RequestStatus::Expired);
    }

    #[test]
    fn test_invite_checks_compatibility_and_availability() {
        let receiver = Actor::receiver(Uuid::new_v4());
        let mut ledger = open(&receiver, BloodGroup::ONegative);

        let incompatible = create_donor(BloodGroup::OPositive);
        assert!(matches!(
            ledger.invite(&incompatible, Utc::now()),
            Err(LifecycleError::Incompatible { .. })
        ));

        let mut away = create_donor(BloodGroup::ONegative);
        away.available = false;
        assert_eq!(
            ledger.invite(&away, Utc::now()).unwrap_err(),
            LifecycleError::DonorUnavailable
        );

        let donor = create_donor(BloodGroup::ONegative);
        ledger.invite(&donor, Utc::now()).unwrap();
        assert_eq!(
            ledger.invite(&donor, Utc::now()).unwrap_err(),
            LifecycleError::AlreadyResponded
        );
    }
}
