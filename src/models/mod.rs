// Models module

pub mod appointment;
pub mod dashboard;
pub mod filter;
pub mod quotation;
pub mod request;
pub mod service;
pub mod status;

pub use appointment::{
    Appointment, AvailableHoursQuery, AvailableHoursResponse, CancelAppointmentRequest,
    CreateAppointmentRequest, NewAppointment, RescheduleAppointmentRequest,
};
pub use dashboard::DashboardSummary;
pub use filter::{ListFilterQuery, RecordFilter};
pub use quotation::{CreateQuotationRequest, EstimateRequest, NewQuotation, Quotation};
pub use request::{PhoneLookupQuery, RequestKind, ServiceRequest, ServiceRequestResponse};
pub use service::{ImageUpload, Service, ServiceFields, ServiceImage, StatusResponse};
pub use status::RequestStatus;
