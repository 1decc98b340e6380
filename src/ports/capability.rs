//! Errors shared by the external capability ports.

/// Failure talking to an expert/device/weather/search service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CapabilityError {
    #[error("{capability} timed out after {timeout_ms}ms")]
    Timeout { capability: &'static str, timeout_ms: u64 },

    #[error("{0} unavailable")]
    Unavailable(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

impl CapabilityError {
    pub fn timeout(capability: &'static str, timeout_ms: u64) -> Self {
        Self::Timeout { capability, timeout_ms }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CapabilityError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_capability() {
        let err = CapabilityError::timeout("expert", 30_000);
        assert_eq!(err.to_string(), "expert timed out after 30000ms");
        assert!(err.is_timeout());
        assert!(!CapabilityError::network("reset").is_timeout());
    }
}
