//! # relcoll codec
//!
//! Column values and rows shared by every relcoll backend.
//!
//! A model flattens itself into a [`Row`] of [`Value`]s. Relational
//! backends bind those values as statement parameters; key/value backends
//! store the row as canonical CBOR produced by [`encode_row`].
//!
//! ```
//! use relcoll_codec::{decode_row, encode_row, Row};
//!
//! let row = Row::new().with("name", "f1").with("size", 10i64);
//! let bytes = encode_row(&row).unwrap();
//! let decoded = decode_row(&bytes).unwrap();
//! assert_eq!(decoded.integer("size").unwrap(), 10);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod encoder;
mod error;
mod row;
mod value;

pub use encoder::{decode_row, encode_row};
pub use error::{CodecError, CodecResult};
pub use row::Row;
pub use value::{format_timestamp, parse_timestamp, Value, TIMESTAMP_FORMAT};
