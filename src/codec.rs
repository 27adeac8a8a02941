//! Gzip codec for binary cache values.
//!
//! Compression is a policy, not a format: only `Bson::Binary` values are
//! candidates, everything else is stored verbatim with no flag. A failed
//! compression aborts the write instead of silently falling back to the
//! uncompressed bytes, so the caller always knows what was stored.

use crate::entry::CacheEntry;
use crate::error::{Error, Result};
use bson::spec::BinarySubtype;
use bson::{Binary, Bson};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Compress an entry's value in place when it is a binary payload.
///
/// Non-binary values pass through unchanged and unflagged. On success the
/// value is replaced with the gzip bytes and `compressed` is set.
///
/// # Errors
/// Returns `CompressionError` if the gzip encoder fails; the entry must not
/// be written in that case.
pub fn compress(mut entry: CacheEntry) -> Result<CacheEntry> {
    let bytes = match &entry.value {
        Bson::Binary(bin) => &bin.bytes,
        _ => return Ok(entry),
    };

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| Error::CompressionError(e.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|e| Error::CompressionError(e.to_string()))?;

    entry.value = Bson::Binary(Binary {
        subtype: BinarySubtype::Generic,
        bytes: compressed,
    });
    entry.compressed = Some(true);
    Ok(entry)
}

/// Decompress a stored value back to its original bytes.
///
/// Accepts the database-native binary wrapper (`Bson::Binary`); anything else
/// under a `compressed` flag means the document was corrupted.
///
/// # Errors
/// Returns `DecompressionError` if the value is not binary or the bytes are
/// not valid gzip data.
pub fn decompress(value: &Bson) -> Result<Vec<u8>> {
    match value {
        Bson::Binary(bin) => decompress_bytes(&bin.bytes),
        other => Err(Error::DecompressionError(format!(
            "compressed entry holds a non-binary value: {:?}",
            other.element_type()
        ))),
    }
}

/// Gunzip a raw buffer.
pub fn decompress_bytes(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut raw = Vec::new();
    decoder
        .read_to_end(&mut raw)
        .map_err(|e| Error::DecompressionError(e.to_string()))?;
    Ok(raw)
}
