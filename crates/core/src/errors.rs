use thiserror::Error;

/// Boundary-facing error taxonomy for the HTTP and CLI surfaces. The engine
/// itself never raises these for a turn: every engine failure path degrades to
/// a valid `Decision`. They exist for the thin surfaces around it (request
/// validation, history queries, bootstrap).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String },
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl InterfaceError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into() }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Safe message for the end user; the detailed variant stays in logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::InterfaceError;

    #[test]
    fn user_messages_never_leak_detail() {
        let error = InterfaceError::unavailable("sqlite lock timeout on chat_history");
        assert_eq!(
            error.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
        assert!(error.to_string().contains("sqlite lock timeout"));
    }
}
