use crate::decoder::NormalizedPairRecord;
use crate::error::PersistenceError;

/// Destination for decoded pair records.
///
/// Inserts must be idempotent: the same pair may be seen again when ranges
/// are re-scanned or windows overlap.
pub trait RecordSink {
    /// Returns `true` when a new row was written.
    fn insert_record(&mut self, record: &NormalizedPairRecord) -> Result<bool, PersistenceError>;

    fn flush(&mut self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    fn insert_record(&mut self, record: &NormalizedPairRecord) -> Result<bool, PersistenceError> {
        (**self).insert_record(record)
    }

    fn flush(&mut self) -> Result<(), PersistenceError> {
        (**self).flush()
    }
}
