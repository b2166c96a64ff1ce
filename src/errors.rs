use thiserror::Error;

use crate::column_types::ColumnTypeId;

/// Error taxonomy for the row/JSON serializer core.
///
/// Every fallible step in this crate surfaces one of these variants; none of
/// them indicate partial output was produced (the caller never sees a
/// half-written buffer on error).
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("no serializer registered for column type {0:?}")]
    UnsupportedType(ColumnTypeId),

    #[error("out-of-band value resolution failed")]
    OutOfBandResolutionFailed(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("out-of-band value requires a node store but none was provided")]
    NodeStoreMissing,

    #[error("decimal encoding error: {0}")]
    DecimalEncoding(String),

    #[error("json string of {len} bytes exceeds the {limit} byte format limit")]
    JsonStringTooLong { len: usize, limit: usize },

    #[error("json value is not a recognized variant")]
    JsonUnsupportedValue,

    #[error("serialization was cancelled")]
    Cancelled,
}
