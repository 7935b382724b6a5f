//! Error types for the client binary.
//!
//! [`ClientError`] wraps every failure that can stop the client during
//! startup or while running the loop.

/// Top-level error for the client binary.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: relayworld_core::ConfigError,
    },

    /// The client loop failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: relayworld_core::RunnerError,
    },

    /// No configured relay could be reached.
    #[error("NATS error: {message}")]
    Nats {
        /// Description of the NATS failure.
        message: String,
    },
}
