// Lodge booking rates service: validates availability requests from the booking form
// and relays them to the upstream rates API

pub mod api;
pub mod audit;
pub mod booking;
pub mod config;
pub mod gateway;
pub mod service;
pub mod transform;
pub mod validation;

// Re-export key types for convenience
pub use api::{create_router, ApiResponse, AppState};
pub use audit::{AuditLog, EntryKind};
pub use booking::{parse_booking_request, BookingRequest};
pub use config::{Config, ConfigError, LogFormat};
pub use gateway::{ClientConfig, ClientError, GatewayError, RatesApi, RatesApiClient, RatesResult};
pub use service::{RatesService, ServiceError};
pub use transform::{
    convert_date, AgeGroup, Guest, OutboundRatesPayload, RatesTransformer, TransformError,
    UnitLookup, UnitTypeTable,
};
pub use validation::{booking_rules, validate, FieldRules, Rule, ValidationErrors, Violation};
