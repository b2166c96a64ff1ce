//! Consumed interfaces: the storage engine on the other side of this crate
//! implements [`TupleDescriptor`], [`NodeStore`], and [`JsonWrapper`]; this
//! crate only ever calls them.
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bigdecimal::BigDecimal;

use crate::errors::SerializeError;
use crate::jsonb::JsonValue;

/// Content address of an out-of-band (BLOB/TEXT/JSON/GEOMETRY) value.
///
/// Fixed-width to match the content-addressed hash schemes used by the
/// storage engines this crate is meant to sit behind (20 bytes, the same
/// width as a SHA-1 digest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash(pub [u8; 20]);

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Resolves a content-addressed [`Hash`] to the bytes it names.
///
/// Implementations may be in-memory, networked, or cached; this crate never
/// assumes which. Calls are synchronous.
pub trait NodeStore {
    fn read_bytes(
        &self,
        addr: &Hash,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync + 'static>>;
}

/// Bridges a storage-specific JSON representation into this crate's
/// [`JsonValue`] tree, without the row serializer needing to know anything
/// about the storage engine's internal encoding.
pub trait JsonWrapper {
    fn to_value(&self, ctx: &Context) -> Result<JsonValue, SerializeError>;
}

/// Typed field accessors over a raw tuple byte buffer.
///
/// A `TupleDescriptor` is schema-like: it is reused across every tuple that
/// shares its layout, and each accessor takes the raw tuple bytes plus a
/// field index. Every accessor returns `(value, not_null)` so a null field
/// can be represented without an extra `Option` allocation at every call
/// site.
pub trait TupleDescriptor {
    fn get_int8(&self, tuple: &[u8], field_index: usize) -> (i64, bool);
    fn get_int16(&self, tuple: &[u8], field_index: usize) -> (i64, bool);
    fn get_int32(&self, tuple: &[u8], field_index: usize) -> (i64, bool);
    fn get_int64(&self, tuple: &[u8], field_index: usize) -> (i64, bool);
    fn get_uint8(&self, tuple: &[u8], field_index: usize) -> (u64, bool);
    fn get_uint16(&self, tuple: &[u8], field_index: usize) -> (u64, bool);
    fn get_uint32(&self, tuple: &[u8], field_index: usize) -> (u64, bool);
    fn get_uint64(&self, tuple: &[u8], field_index: usize) -> (u64, bool);
    fn get_float32(&self, tuple: &[u8], field_index: usize) -> (f32, bool);
    fn get_float64(&self, tuple: &[u8], field_index: usize) -> (f64, bool);
    fn get_decimal(&self, tuple: &[u8], field_index: usize) -> (BigDecimal, bool);
    fn get_year(&self, tuple: &[u8], field_index: usize) -> (u16, bool);
    fn get_date(&self, tuple: &[u8], field_index: usize) -> (Date, bool);
    fn get_datetime(&self, tuple: &[u8], field_index: usize) -> (DateTime, bool);
    fn get_sql_time(&self, tuple: &[u8], field_index: usize) -> (SqlTime, bool);
    fn get_string(&self, tuple: &[u8], field_index: usize) -> (String, bool);
    fn get_bytes(&self, tuple: &[u8], field_index: usize) -> (Vec<u8>, bool);
    fn get_enum(&self, tuple: &[u8], field_index: usize) -> (u16, bool);
    fn get_set(&self, tuple: &[u8], field_index: usize) -> (u64, bool);
    fn get_bits(&self, tuple: &[u8], field_index: usize) -> (u64, bool);
    fn get_bytes_addr(&self, tuple: &[u8], field_index: usize) -> (Hash, bool);
    fn get_string_addr(&self, tuple: &[u8], field_index: usize) -> (Hash, bool);
    fn get_json(&self, tuple: &[u8], field_index: usize) -> (Option<Box<dyn JsonWrapper>>, bool);
}

/// A calendar date. Never validated beyond what packing it requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

/// A date and time with microsecond resolution, used for both DATETIME and
/// TIMESTAMP columns. TIMESTAMP is additionally converted to Unix seconds
/// before packing; see `temporal::encode_timestamp2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub micros: u32,
}

/// A signed duration-of-day value, as stored for SQL `TIME` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlTime {
    pub negative: bool,
    pub hours: u32,
    pub minutes: u8,
    pub seconds: u8,
    pub micros: u32,
}

/// Cooperative cancellation and (eventually) logging context threaded
/// through a single `serialize_row`/`build_table_map` call.
///
/// The serializer core never suspends and never does I/O of its own; the
/// only place cancellation is observed is immediately before a
/// [`NodeStore::read_bytes`] call.
#[derive(Clone, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from any thread holding a clone.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn check_cancelled(&self) -> Result<(), SerializeError> {
        if self.is_cancelled() {
            Err(SerializeError::Cancelled)
        } else {
            Ok(())
        }
    }
}
