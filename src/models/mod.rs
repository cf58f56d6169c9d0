// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    Actor, BloodGroup, BloodRequest, Coordinates, CoordinateUpdate, DonationHistory,
    DonationResponse, Donor, DonorMatch, Receiver, RequestStatus, RequestingFor, ResponseStatus,
    Role, Urgency,
};
pub use requests::{
    AvailabilityRequest, CreateBloodRequest, DonorAnswer, DonorFollowUpRequest,
    DonorProfileRequest, GeocodeQuery, ReceiverDecisionRequest, ReceiverProfileRequest,
    RespondRequest, ReverseGeocodeQuery, SearchDonorsRequest,
};
pub use responses::{
    ErrorResponse, ExpireResponse, GeocodeResponse, HealthResponse, ReverseGeocodeResponse,
    SearchDonorsResponse, SearchMode,
};
