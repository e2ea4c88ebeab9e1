//! Error types and processing statistics.

mod stats;
mod types;

pub use stats::ProcessingStats;
pub use types::{
    ErrorType, InfoType, InitializationError, StorageError, ValidationError, VisitError,
    WarningType,
};
