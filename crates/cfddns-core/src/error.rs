//! Error types for the cfddns agent
//!
//! Only [`Error::Config`] is fatal, and only before the scheduler starts.
//! Everything else is reported per tick and feeds the backoff decision.

use thiserror::Error;

/// Result type alias for cfddns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the cfddns agent
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (missing credentials, zone, hostname, interval below floor)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A DNS lookup failed
    #[error("Resolution failed: {0}")]
    Resolution(String),

    /// Every configured DNS server failed for one query
    #[error("no dns resolver available for {fqdn} ({attempts} server(s) tried)")]
    ResolverExhausted {
        /// Name that was being resolved
        fqdn: String,
        /// Number of servers tried
        attempts: usize,
    },

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Zone or record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Listing the remote records failed
    #[error("list records for {fqdn} failed: {source}")]
    ListRecords {
        fqdn: String,
        #[source]
        source: Box<Error>,
    },

    /// Creating the remote record failed
    #[error("create record for {hostname} failed: {source}")]
    CreateRecord {
        hostname: String,
        #[source]
        source: Box<Error>,
    },

    /// Updating the remote record failed
    #[error("update record {record_id} for {hostname} failed: {source}")]
    UpdateRecord {
        hostname: String,
        record_id: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error must stop the process before the loop starts
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
