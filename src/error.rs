// src/error.rs
// Typed failure taxonomy for the survey runner.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SurveyError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to fetch context for topic '{topic}': {reason}")]
    ContextFetch { topic: String, reason: String },

    #[error("failed to create assistant session: {0}")]
    SessionCreation(String),

    #[error("request to assistant service failed: {0}")]
    TransientRequest(String),

    #[error("assistant job ended in terminal state '{0}'")]
    JobFailed(String),

    #[error("assistant job still pending after {attempts} polls at {interval_secs}s intervals")]
    JobTimeout { attempts: u32, interval_secs: u64 },

    #[error("failed to write result table: {0}")]
    ResultWrite(String),
}
