//! Error taxonomy for gateway requests.

use thiserror::Error;

/// Message shown when the server answered without a usable message
pub const SERVER_BUSY: &str = "server busy";
/// Message shown when a request was sent but nothing came back
pub const NETWORK_ERROR: &str = "network error";
/// Message shown when the server rejected the session
pub const SESSION_EXPIRED: &str = "session expired";

/// A classified request failure.
///
/// Variants are listed in the order the gateway classifies them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    /// The call was superseded by a newer token and aborted.
    #[error("request cancelled")]
    Cancelled,

    /// HTTP 401.
    #[error("{}", SESSION_EXPIRED)]
    AuthFailure,

    /// Any other non-success HTTP response.
    #[error("{}", .message.as_deref().unwrap_or(SERVER_BUSY))]
    ServerError {
        status: u16,
        message: Option<String>,
    },

    /// The request was dispatched but no response arrived.
    #[error("{}", NETWORK_ERROR)]
    NetworkError(String),

    /// The request failed before it was dispatched, or its result could not
    /// be used locally.
    #[error("{0}")]
    ClientError(String),

    /// The resource was used without a required setting. Never touches the
    /// network.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl RequestError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Handled errors never reach the notification collaborator.
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::AuthFailure)
    }

    /// Status code reported by the server, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthFailure => Some(401),
            Self::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failures a [`Transport`](super::Transport) can report.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The abort signal fired before the call completed.
    #[error("aborted")]
    Aborted,

    /// Sent, but no response was received (connection loss, timeout).
    #[error("no response: {0}")]
    NoResponse(String),

    /// The request could not be built or dispatched.
    #[error("{0}")]
    Build(String),
}

impl From<TransportError> for RequestError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Aborted => RequestError::Cancelled,
            TransportError::NoResponse(detail) => RequestError::NetworkError(detail),
            TransportError::Build(msg) => RequestError::ClientError(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(RequestError::AuthFailure.to_string(), "session expired");
        assert_eq!(
            RequestError::ServerError { status: 500, message: None }.to_string(),
            "server busy"
        );
        assert_eq!(
            RequestError::ServerError {
                status: 400,
                message: Some("name is required".into())
            }
            .to_string(),
            "name is required"
        );
        assert_eq!(
            RequestError::NetworkError("connection reset".into()).to_string(),
            "network error"
        );
        assert_eq!(
            RequestError::ClientError("relative URL without a base".into()).to_string(),
            "relative URL without a base"
        );
    }

    #[test]
    fn test_transport_error_mapping() {
        assert_eq!(RequestError::from(TransportError::Aborted), RequestError::Cancelled);
        assert!(matches!(
            RequestError::from(TransportError::NoResponse("timeout".into())),
            RequestError::NetworkError(_)
        ));
        assert!(matches!(
            RequestError::from(TransportError::Build("bad header".into())),
            RequestError::ClientError(_)
        ));
    }

    #[test]
    fn test_handled_errors() {
        assert!(RequestError::Cancelled.is_handled());
        assert!(RequestError::AuthFailure.is_handled());
        assert!(!RequestError::NetworkError(String::new()).is_handled());
        assert_eq!(RequestError::AuthFailure.status(), Some(401));
    }
}
