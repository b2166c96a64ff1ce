//! Serializer for the MySQL binary log row and JSON wire formats.
//!
//! This crate produces byte-exact TABLE_MAP/WRITE_ROWS/UPDATE_ROWS/
//! DELETE_ROWS event bodies, including MySQL's internal binary JSON
//! encoding, from a caller-supplied [`Schema`] and raw value tuples. It
//! does not open files, frame full binlog events, or talk to a server;
//! callers own the event header, checksum, and transport.
//!
//! # Limitations
//!
//! - Targets the row and JSON formats used by Percona and Oracle MySQL 5.6
//!   and 5.7. Has not been checked against MariaDB, MySQL 8.0, or earlier
//!   versions.
//! - Like all 5.6/5.7-compatible implementations, UNSIGNED BIGINT cannot
//!   safely round-trip values between `2^63` and `2^64` through this
//!   crate's `i64`-based integer accessors.
//!
//! # Example
//!
//! ```no_run
//! use mysql_binlog_codec::{row::serialize_row_image, table_map::build_table_map, tuple::Context};
//! # use mysql_binlog_codec::schema::Schema;
//! # fn example(schema: &dyn Schema, key: &[u8], value: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let table_map = build_table_map(schema, 42, "mydb", "mytable")?;
//! let ctx = Context::new();
//! let row_bytes = serialize_row_image(schema, key, value, &ctx, None)?;
//! println!("{} TABLE_MAP bytes, {} row bytes", table_map.serialize().len(), row_bytes.len());
//! # Ok(())
//! # }
//! ```
mod bit_set;
pub mod column_types;
pub mod decimal;
pub mod errors;
pub mod jsonb;
mod packet_helpers;
pub mod row;
pub mod schema;
pub mod table_map;
pub mod temporal;
pub mod tuple;

pub use column_types::ColumnTypeId;
pub use errors::SerializeError;
pub use jsonb::JsonValue;
pub use row::{serialize_row, serialize_row_image, NullBitmap};
pub use schema::{Column, Schema};
pub use table_map::{build_table_map, TableMap};
pub use tuple::{Context, Date, DateTime, Hash, JsonWrapper, NodeStore, SqlTime, TupleDescriptor};
