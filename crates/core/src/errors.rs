use thiserror::Error;

use crate::orders::TransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unknown order status `{0}`")]
    UnknownStatus(String),
    #[error("unknown user role `{0}`")]
    UnknownRole(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{message}")]
    Validation { message: String, required: Vec<String> },
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} `{id}` already exists")]
    AlreadyExists { entity: &'static str, id: String },
    #[error("{entity} `{id}` has invalid stored status `{status}`")]
    InvalidState { entity: &'static str, id: String, status: String },
    #[error("order `{id}` was modified concurrently (expected version {expected}, found {actual})")]
    ConcurrencyConflict { id: String, expected: u32, actual: u32 },
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn missing_fields(required: &[&str]) -> Self {
        Self::Validation {
            message: "Missing required fields".to_string(),
            required: required.iter().map(|field| (*field).to_string()).collect(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into(), required: Vec::new() }
    }

    /// Errors a caller may resolve by re-reading state and retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::ConcurrencyConflict { .. })
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::Unprocessable { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, required: Vec<String>, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, retryable: bool, correlation_id: String },
    #[error("unprocessable: {message}")]
    Unprocessable { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Forbidden { .. } => "Status update not allowed",
            Self::NotFound { .. } => "The requested resource does not exist.",
            Self::Conflict { retryable: true, .. } => {
                "The order changed while your update was in flight. Reload and try again."
            }
            Self::Conflict { .. } => "Status update not allowed",
            Self::Unprocessable { .. } => "The order is not ready for this status change.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::Forbidden { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::Unprocessable { .. } => 422,
            Self::ServiceUnavailable { .. } => 503,
            Self::Internal { .. } => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::Forbidden { message, .. }
            | Self::NotFound { message, .. }
            | Self::Conflict { message, .. }
            | Self::Unprocessable { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::Unprocessable { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }

    pub fn required(&self) -> &[String] {
        match self {
            Self::BadRequest { required, .. } => required,
            _ => &[],
        }
    }

    /// Detail that is safe to hand back to a client. Server-side failures only
    /// expose the generic user message.
    pub fn client_message(&self) -> &str {
        match self {
            Self::ServiceUnavailable { .. } | Self::Internal { .. } => self.user_message(),
            _ => self.message(),
        }
    }
}

const UNASSIGNED: &str = "unassigned";

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = UNASSIGNED.to_owned();
        match value {
            ApplicationError::Domain(DomainError::Transition(error)) => {
                let message = error.to_string();
                match error {
                    TransitionError::IllegalTransition { .. } => {
                        Self::Conflict { message, retryable: false, correlation_id }
                    }
                    TransitionError::Forbidden { .. } => Self::Forbidden { message, correlation_id },
                    TransitionError::PreconditionFailed { .. } => {
                        Self::Unprocessable { message, correlation_id }
                    }
                    TransitionError::InvalidState { .. } => Self::Internal { message, correlation_id },
                }
            }
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), required: Vec::new(), correlation_id }
            }
            ApplicationError::Validation { message, required } => {
                Self::BadRequest { message, required, correlation_id }
            }
            error @ ApplicationError::NotFound { .. } => {
                Self::NotFound { message: error.to_string(), correlation_id }
            }
            error @ ApplicationError::AlreadyExists { .. } => {
                Self::Conflict { message: error.to_string(), retryable: false, correlation_id }
            }
            error @ ApplicationError::ConcurrencyConflict { .. } => {
                Self::Conflict { message: error.to_string(), retryable: true, correlation_id }
            }
            error @ ApplicationError::InvalidState { .. } => {
                Self::Internal { message: error.to_string(), correlation_id }
            }
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::order::{ActorRole, OrderStatus};
    use crate::errors::{ApplicationError, DomainError, InterfaceError};
    use crate::orders::TransitionError;

    #[test]
    fn missing_fields_map_to_bad_request_with_required_list() {
        let interface = ApplicationError::missing_fields(&["orderId", "newStatus"])
            .into_interface("req-1");

        assert_eq!(interface.status_code(), 400);
        assert_eq!(interface.message(), "Missing required fields");
        assert_eq!(interface.required(), ["orderId".to_string(), "newStatus".to_string()]);
        assert_eq!(interface.correlation_id(), "req-1");
    }

    #[test]
    fn transition_errors_map_to_distinct_statuses() {
        let illegal = ApplicationError::from(DomainError::from(
            TransitionError::IllegalTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Cancelled,
                allowed: Vec::new(),
            },
        ))
        .into_interface("req-2");
        let forbidden = ApplicationError::from(DomainError::from(TransitionError::Forbidden {
            role: ActorRole::Consumer,
            to: OrderStatus::Confirmed,
            allowed_roles: vec![ActorRole::Farmer, ActorRole::Shg, ActorRole::Admin],
        }))
        .into_interface("req-2");
        let precondition =
            ApplicationError::from(DomainError::from(TransitionError::PreconditionFailed {
                reason: "Cancellation reason is required".to_string(),
            }))
            .into_interface("req-2");

        assert_eq!(illegal.status_code(), 409);
        assert_eq!(forbidden.status_code(), 403);
        assert_eq!(precondition.status_code(), 422);
        assert_eq!(precondition.client_message(), "Cancellation reason is required");
    }

    #[test]
    fn rejected_input_and_unknown_values_map_to_bad_request() {
        for error in [
            DomainError::InvalidInput("quantity exceeds the supported range".to_string()),
            DomainError::UnknownStatus("lost".to_string()),
            DomainError::UnknownRole("broker".to_string()),
        ] {
            let interface = ApplicationError::from(error).into_interface("req-7");
            assert!(matches!(interface, InterfaceError::BadRequest { ref required, .. } if required.is_empty()));
        }
    }

    #[test]
    fn concurrency_conflict_is_retryable_and_maps_to_conflict() {
        let error =
            ApplicationError::ConcurrencyConflict { id: "ORD-1".to_string(), expected: 2, actual: 3 };
        assert!(error.is_retryable());

        let interface = error.into_interface("req-3");
        assert!(matches!(interface, InterfaceError::Conflict { retryable: true, .. }));
        assert_eq!(
            interface.user_message(),
            "The order changed while your update was in flight. Reload and try again."
        );
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable_without_leaking_detail() {
        let error = ApplicationError::Persistence("database lock timeout".to_owned());
        assert!(error.is_retryable());

        let interface = error.into_interface("req-4");
        assert_eq!(interface.status_code(), 503);
        assert_eq!(
            interface.client_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn not_found_is_not_retryable() {
        let error = ApplicationError::NotFound { entity: "order", id: "ORD-404".to_string() };
        assert!(!error.is_retryable());
        assert_eq!(error.to_string(), "order `ORD-404` not found");
        assert_eq!(error.into_interface("req-5").status_code(), 404);
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface =
            ApplicationError::Configuration("invalid database url".to_owned()).into_interface("req-6");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
