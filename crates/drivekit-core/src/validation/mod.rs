//! Response-shape validation helpers.
//!
//! Validation failures are fatal for the single request that produced them; a
//! malformed record must never be partially applied to the registry or cache.

use validator::Validate;

use crate::error::AppError;
use crate::models::FileRecord;

/// Validate a single file record parsed from an API response.
pub fn validate_record(record: &FileRecord) -> Result<(), AppError> {
    record
        .validate()
        .map_err(|e| AppError::InvalidInput(format!("invalid file record {}: {}", record.id, e)))
}

/// Validate a batch of file records; fails on the first invalid record.
pub fn validate_records(records: &[FileRecord]) -> Result<(), AppError> {
    for record in records {
        validate_record(record)?;
    }
    Ok(())
}
