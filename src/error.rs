/// Error types for the background coordinator
use thiserror::Error;

/// A failed call into one of the extension APIs
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BrowserError {
    #[error("{api} failed: {message}")]
    Api { api: &'static str, message: String },

    /// The tab has no content script listening (e.g. "Receiving end does not exist")
    #[error("no message listener in tab")]
    NoReceiver,

    #[error("HTTP {0}")]
    Http(u16),

    #[error("could not decode browser payload: {0}")]
    Decode(String),
}

impl BrowserError {
    pub fn api(api: &'static str, message: impl Into<String>) -> Self {
        BrowserError::Api {
            api,
            message: message.into(),
        }
    }
}

/// Why an inbound message could not be turned into a request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("unknown action")]
    UnknownAction,

    #[error("missing field `{0}`")]
    Missing(&'static str),

    #[error("invalid {0}")]
    Invalid(&'static str),
}

impl RequestError {
    /// The error code placed in the response body
    pub fn code(&self) -> String {
        match self {
            RequestError::UnknownAction => "unknown_action".to_string(),
            RequestError::Missing(field) => format!("missing_{}", field),
            RequestError::Invalid(what) => format!("invalid_{}", what),
        }
    }
}
