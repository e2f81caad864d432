use thiserror::Error;

/// Every way a network-calling operation can fail, as seen by the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngagementError {
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        /// Re-rendered form fragment carrying the field errors, when the
        /// endpoint returns one.
        form: Option<String>,
    },
    #[error("authentication required")]
    AuthRequired,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("server failure status={status:?} message={message:?}")]
    Server {
        status: Option<u16>,
        message: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid request url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

impl From<TransportError> for EngagementError {
    fn from(value: TransportError) -> Self {
        Self::Transport(value.to_string())
    }
}

/// User-facing fallback text for one operation.
#[derive(Debug, Clone, Copy)]
pub struct FailureCopy {
    pub server: &'static str,
    pub transport: &'static str,
    pub auth: &'static str,
}

impl EngagementError {
    pub fn malformed(status: u16) -> Self {
        Self::Server {
            status: Some(status),
            message: None,
        }
    }

    pub fn is_auth_required(&self) -> bool {
        matches!(self, Self::AuthRequired)
    }

    pub fn user_message(&self, copy: &FailureCopy) -> String {
        match self {
            Self::Validation { message, .. } if !message.trim().is_empty() => message.clone(),
            Self::Validation { .. } => copy.server.to_string(),
            Self::AuthRequired => copy.auth.to_string(),
            Self::Transport(_) => copy.transport.to_string(),
            Self::Server {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            Self::Server { .. } => copy.server.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COPY: FailureCopy = FailureCopy {
        server: "Something went wrong.",
        transport: "Cannot reach the server.",
        auth: "Please sign in.",
    };

    #[test]
    fn connectivity_and_validation_messages_differ() {
        let validation = EngagementError::Validation {
            message: "Keyword too long.".into(),
            form: None,
        };
        let transport = EngagementError::Transport("connection refused".into());

        assert_eq!(validation.user_message(&COPY), "Keyword too long.");
        assert_eq!(transport.user_message(&COPY), "Cannot reach the server.");
    }

    #[test]
    fn server_failure_prefers_service_message() {
        let with_message = EngagementError::Server {
            status: Some(400),
            message: Some("Preset not found.".into()),
        };
        let blank = EngagementError::Server {
            status: Some(500),
            message: Some("  ".into()),
        };

        assert_eq!(with_message.user_message(&COPY), "Preset not found.");
        assert_eq!(blank.user_message(&COPY), "Something went wrong.");
    }
}
