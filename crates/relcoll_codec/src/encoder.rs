//! Canonical CBOR encoding of rows.

use crate::error::{CodecError, CodecResult};
use crate::row::Row;

/// Encodes a row to canonical CBOR bytes.
///
/// Columns are sorted by name before encoding, so rows holding the same
/// column values always produce identical bytes.
pub fn encode_row(row: &Row) -> CodecResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(&row.canonical(), &mut bytes)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(bytes)
}

/// Decodes a row previously produced by [`encode_row`].
pub fn decode_row(bytes: &[u8]) -> CodecResult<Row> {
    ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
}
