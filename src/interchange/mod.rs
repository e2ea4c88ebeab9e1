//! Bulk import/export of ad records.

mod export;
mod import;

pub use export::export_snapshot;
pub use import::{apply_import, parse_payload, ImportPayload, ImportReport};
