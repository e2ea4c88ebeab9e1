//! Error type definitions.
//!
//! Typed errors for initialization, storage, candidate validation, and
//! visits, plus the counter enums used by [`super::ProcessingStats`].

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),
}

/// Error types for durable-storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Error creating the database file.
    #[error("Database file creation error: {0}")]
    FileCreationError(String),

    /// SQL execution error.
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    /// The persisted payload could not be parsed in any known layout.
    #[error("Corrupt store payload: {0}")]
    CorruptPayload(String),
}

/// Reasons a candidate is rejected at registration time.
///
/// Validation failures are logged and the candidate is dropped; they never
/// propagate as a fault to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The page URL is missing, overlong, or not an http(s) URL.
    #[error("invalid page URL: {0}")]
    InvalidPageUrl(String),

    /// The candidate carries no content data.
    #[error("candidate has no content data")]
    MissingContentData,

    /// The target URL contains no recoverable http(s) URL.
    #[error("invalid target URL: {0}")]
    MalformedTarget(String),

    /// The target resolves to a syntactically invalid domain.
    #[error("invalid target domain: {0}")]
    InvalidTargetDomain(String),

    /// An image ad whose target stays on the page's own domain is site
    /// navigation, not advertising.
    #[error("internal target on {0}")]
    InternalTarget(String),
}

/// Failure modes of a single visit attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VisitError {
    /// The visit did not complete within the configured timeout.
    #[error("timeout")]
    Timeout,

    /// The server answered with a non-2xx status.
    #[error("{status} ({reason})")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Canonical reason phrase
        reason: String,
    },

    /// Connection or protocol-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// 2xx response whose landing-page title matches an error-page
    /// signature (soft 404).
    #[error("error-page title: {0}")]
    BadTitle(String),

    /// The response body could not be read.
    #[error("body read failed: {0}")]
    Body(String),
}

impl VisitError {
    /// Maps the failure to its statistics counter.
    pub fn error_type(&self) -> ErrorType {
        match self {
            VisitError::Timeout => ErrorType::VisitTimeout,
            VisitError::HttpStatus { .. } => ErrorType::VisitHttpStatus,
            VisitError::Network(_) => ErrorType::VisitNetwork,
            VisitError::BadTitle(_) => ErrorType::VisitBadTitle,
            VisitError::Body(_) => ErrorType::VisitBodyRead,
        }
    }
}

/// Types of errors counted during processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum ErrorType {
    /// Visit timed out
    VisitTimeout,
    /// Visit got a non-2xx status
    VisitHttpStatus,
    /// Visit failed at the network level
    VisitNetwork,
    /// Visit landed on an error page despite a 2xx status
    VisitBadTitle,
    /// Visit response body could not be read
    VisitBodyRead,
    /// Target URL was unrecoverably malformed (record deleted)
    TargetMalformed,
    /// Candidate failed structural validation (dropped)
    CandidateInvalid,
    /// Import payload matched no known format
    ImportParseFailure,
    /// Durable-storage flush failed
    StorageFlushFailure,
}

/// Types of warnings counted during processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum WarningType {
    /// Successful visit produced no usable title
    MissingVisitTitle,
    /// A stored bucket or record key failed the fingerprint format check
    /// and was repaired
    IntegrityDrift,
    /// A persisted record failed structural validation and was dropped
    InvalidStoredRecord,
}

/// Types of informational events counted during processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum InfoType {
    /// Registration was a duplicate within the reuse window
    DuplicateIgnored,
    /// Record excluded from visiting by do-not-track policy
    PolicyBlocked,
    /// Record excluded from visiting by the click-probability draw
    ProbabilitySkip,
    /// Record excluded because the user already clicked the target
    UserClickSkip,
    /// A private-context record was redacted and relocated
    PrivateRedacted,
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorType {
    /// Human-readable label for summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::VisitTimeout => "Visit timeout",
            ErrorType::VisitHttpStatus => "Visit HTTP status error",
            ErrorType::VisitNetwork => "Visit network error",
            ErrorType::VisitBadTitle => "Visit error-page title",
            ErrorType::VisitBodyRead => "Visit body read error",
            ErrorType::TargetMalformed => "Malformed target URL",
            ErrorType::CandidateInvalid => "Invalid candidate",
            ErrorType::ImportParseFailure => "Import parse failure",
            ErrorType::StorageFlushFailure => "Storage flush failure",
        }
    }
}

impl WarningType {
    /// Human-readable label for summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningType::MissingVisitTitle => "Missing visit title",
            WarningType::IntegrityDrift => "Fingerprint key repaired",
            WarningType::InvalidStoredRecord => "Invalid stored record dropped",
        }
    }
}

impl InfoType {
    /// Human-readable label for summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            InfoType::DuplicateIgnored => "Duplicate registration ignored",
            InfoType::PolicyBlocked => "Blocked by DNT policy",
            InfoType::ProbabilitySkip => "Skipped by click probability",
            InfoType::UserClickSkip => "Skipped, user already clicked",
            InfoType::PrivateRedacted => "Private record redacted",
        }
    }
}
