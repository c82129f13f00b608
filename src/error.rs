use thiserror::Error;

/// Failures of the credential lifecycle.
///
/// `Clone` so that a single in-flight refresh can hand the same failure to
/// every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("No refresh token stored, authorization required")]
    NoRefreshCredential,

    #[error("Authorization state does not match")]
    StateMismatch,

    #[error("Token endpoint rejected the request ({status}): {body}")]
    ProviderRejected { status: u16, body: String },

    #[error("Authorization was declined: {0}")]
    AuthorizationDenied(String),

    #[error("Timed out waiting for authorization")]
    AuthorizationTimeout,

    #[error("Token endpoint unreachable: {0}")]
    Transport(String),

    #[error("Unexpected token response: {0}")]
    InvalidResponse(String),

    #[error("Credential store failure: {0}")]
    Store(String),

    #[error("Invalid OAuth endpoint: {0}")]
    InvalidEndpoint(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Store(err.to_string())
    }
}

/// Failures surfaced by the resilient API client once its own recovery
/// (token refresh, rate-limit pacing, bounded retries) is used up.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Gave up after {attempts} attempts: {reason}")]
    RetriesExhausted { attempts: u32, reason: String },

    #[error("Request failed{}: {reason}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Fatal { status: Option<u16>, reason: String },
}

impl ApiError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ApiError::RetriesExhausted { .. } | ApiError::Fatal { .. }
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Fatal { status, .. } => *status,
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Keyring error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serde(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serde(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Failed to prepare config directory: {0}")]
    Io(String),
}

/// Reasons a sync cycle is abandoned before it reaches the write phase.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Could not acquire access token: {0}")]
    Auth(#[from] AuthError),

    #[error("Could not fetch playlist {playlist}: {source}")]
    Fetch {
        playlist: String,
        #[source]
        source: ApiError,
    },

    #[error("Callback listener unavailable: {0}")]
    Listener(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhaustion_counts_as_fatal() {
        let err = ApiError::RetriesExhausted {
            attempts: 3,
            reason: "502".to_string(),
        };
        assert!(err.is_fatal());
        assert!(!ApiError::Auth(AuthError::NoRefreshCredential).is_fatal());
    }

    #[test]
    fn fatal_message_includes_status_when_known() {
        let err = ApiError::Fatal {
            status: Some(404),
            reason: "not found".to_string(),
        };
        assert_eq!(err.to_string(), "Request failed (404): not found");

        let err = ApiError::Fatal {
            status: None,
            reason: "bad body".to_string(),
        };
        assert_eq!(err.to_string(), "Request failed: bad body");
    }
}
