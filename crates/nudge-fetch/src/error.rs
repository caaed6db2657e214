use nudge_core::CheckError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to fetch {what}: {source}")]
    Request {
        what: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{what} request failed with HTTP {status}{body_snippet}")]
    HttpStatus {
        what: &'static str,
        status: reqwest::StatusCode,
        body_snippet: String,
    },
    #[error("failed to read {what} response: {source}")]
    Body {
        what: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl From<FetchError> for CheckError {
    fn from(error: FetchError) -> Self {
        CheckError::unknown_from(error)
    }
}
