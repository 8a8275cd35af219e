//! Error types

use thiserror::Error;

use crate::VenueId;

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No tracked pairs configured")]
    EmptyPairs,

    #[error("No venues configured")]
    EmptyVenues,

    #[error("Duplicate venue: {0}")]
    DuplicateVenue(VenueId),

    #[error("Invalid tracked pair: {0}")]
    InvalidPair(String),

    #[error("Invalid threshold {name}: {value}")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error("Failed to load configuration: {0}")]
    Load(String),
}

/// Price and gas source errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Venue {venue} unavailable: {reason}")]
    SourceUnavailable { venue: VenueId, reason: String },

    #[error("Venue {venue} returned an invalid price: {price}")]
    InvalidQuote { venue: VenueId, price: f64 },

    #[error("Gas estimator unavailable: {0}")]
    EstimatorUnavailable(String),
}

impl SourceError {
    pub fn unavailable(venue: &VenueId, reason: impl ToString) -> Self {
        SourceError::SourceUnavailable {
            venue: venue.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Pending transaction feed errors
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),

    #[error("Feed disconnected")]
    Disconnected,

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

/// Trade submission errors. Never retried by the core.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Transaction reverted: {0}")]
    Reverted(String),
}

/// Result type alias
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type SourceResult<T> = Result<T, SourceError>;
pub type FeedResult<T> = Result<T, FeedError>;
pub type ExecutionResult<T> = Result<T, ExecutionError>;
