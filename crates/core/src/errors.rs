//! Error taxonomy, layered by who handles the failure.
//!
//! Signal reads that fail degrade locally and never reach these types as
//! fatal errors; what does surface is classified so the batch scheduler can
//! skip a user, and the HTTP layer can answer with the upstream status and a
//! correlation id.

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// A signal read failed or came back empty in a way worth logging.
    /// Recovered locally: generation proceeds with degraded signals.
    #[error("signal unavailable: {0}")]
    SignalUnavailable(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    /// The external scoring service failed. Carries the upstream HTTP status
    /// when one was received.
    #[error("scoring service failure: {detail}")]
    ExternalService { status: Option<u16>, detail: String },
    #[error("configuration failure: {0}")]
    Configuration(String),
}

/// How a failure should be answered at the HTTP boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterfaceErrorKind {
    BadRequest,
    ServiceUnavailable,
    /// The external scoring service answered with a non-success status,
    /// which is passed through to the caller.
    UpstreamFailure { status: u16 },
    Internal,
}

/// A caller-facing error: classification, an operator-grade detail message,
/// and the correlation id issued for the request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceError {
    pub kind: InterfaceErrorKind,
    pub message: String,
    pub correlation_id: String,
}

impl std::fmt::Display for InterfaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            InterfaceErrorKind::BadRequest => write!(f, "bad request: {}", self.message),
            InterfaceErrorKind::ServiceUnavailable => {
                write!(f, "service unavailable: {}", self.message)
            }
            InterfaceErrorKind::UpstreamFailure { status } => {
                write!(f, "upstream failure ({status}): {}", self.message)
            }
            InterfaceErrorKind::Internal => write!(f, "internal error: {}", self.message),
        }
    }
}

impl std::error::Error for InterfaceError {}

impl InterfaceError {
    /// The end-user phrasing; detail messages stay server-side and in logs.
    pub fn user_message(&self) -> &'static str {
        match self.kind {
            InterfaceErrorKind::BadRequest => {
                "The request could not be processed. Check inputs and try again."
            }
            InterfaceErrorKind::ServiceUnavailable
            | InterfaceErrorKind::UpstreamFailure { .. } => {
                "Recommendations are temporarily unavailable. Please retry shortly."
            }
            InterfaceErrorKind::Internal => "An unexpected internal error occurred.",
        }
    }
}

impl ApplicationError {
    /// Map to the caller-facing layer, stamping the correlation id issued for
    /// this request. An external-service failure keeps its upstream status;
    /// without one it reads as plain unavailability.
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let (kind, message) = match self {
            Self::Domain(_) => {
                (InterfaceErrorKind::BadRequest, "domain validation failed".to_owned())
            }
            Self::SignalUnavailable(message) | Self::Persistence(message) => {
                (InterfaceErrorKind::ServiceUnavailable, message)
            }
            Self::ExternalService { status: Some(status), detail } => {
                (InterfaceErrorKind::UpstreamFailure { status }, detail)
            }
            Self::ExternalService { status: None, detail } => {
                (InterfaceErrorKind::ServiceUnavailable, detail)
            }
            Self::Configuration(message) => (InterfaceErrorKind::Internal, message),
        };

        InterfaceError { kind, message, correlation_id: correlation_id.into() }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, InterfaceErrorKind};

    #[test]
    fn domain_error_maps_to_bad_request() {
        let interface = ApplicationError::from(DomainError::InvariantViolation(
            "score outside [0, 1]".to_owned(),
        ))
        .into_interface("req-1");

        assert_eq!(interface.kind, InterfaceErrorKind::BadRequest);
        assert_eq!(interface.correlation_id, "req-1");
    }

    #[test]
    fn signal_unavailable_maps_to_service_unavailable() {
        let interface = ApplicationError::SignalUnavailable("event store offline".to_owned())
            .into_interface("req-6");

        assert_eq!(interface.kind, InterfaceErrorKind::ServiceUnavailable);
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable() {
        let interface = ApplicationError::Persistence("database lock timeout".to_owned())
            .into_interface("req-2");

        assert_eq!(interface.kind, InterfaceErrorKind::ServiceUnavailable);
        assert_eq!(
            interface.user_message(),
            "Recommendations are temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn external_service_error_carries_upstream_status() {
        let interface = ApplicationError::ExternalService {
            status: Some(422),
            detail: "invalid behavior payload".to_owned(),
        }
        .into_interface("req-3");

        assert_eq!(interface.kind, InterfaceErrorKind::UpstreamFailure { status: 422 });
        assert_eq!(interface.to_string(), "upstream failure (422): invalid behavior payload");
    }

    #[test]
    fn external_service_error_without_status_reads_as_unavailable() {
        let interface = ApplicationError::ExternalService {
            status: None,
            detail: "connect timeout".to_owned(),
        }
        .into_interface("req-4");

        assert_eq!(interface.kind, InterfaceErrorKind::ServiceUnavailable);
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface = ApplicationError::Configuration("invalid scoring base_url".to_owned())
            .into_interface("req-5");

        assert_eq!(interface.kind, InterfaceErrorKind::Internal);
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
