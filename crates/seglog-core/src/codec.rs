//! Segment payload codec
//!
//! Two on-disk forms are readable:
//!
//! - **Legacy**: `[0x01][postcard(SegmentPayload)]`. No version, no compression.
//! - **Envelope**: `[0xFF][varint schema version][varint algorithm][compressed legacy bytes]`.
//!
//! New segments are always written as an envelope. Readers branch on the
//! first byte, so legacy segments stay readable without migration.
//! Varints use postcard's LEB128 integer encoding.

use std::borrow::Cow;
use std::io::{Read, Write};

use bytes::Bytes;
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

use crate::error::CodecError;
use crate::model::LogEntry;
use crate::segment::SegmentPayload;

/// First byte of a bare encoded payload
pub const LEGACY_PAYLOAD_TAG: u8 = 0x01;

/// First byte of a versioned envelope
pub const ENVELOPE_MAGIC: u8 = 0xFF;

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Compression applied inside a versioned envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CompressionAlgorithm {
    None = 0,
    #[default]
    Deflate = 1,
}

impl CompressionAlgorithm {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(CompressionAlgorithm::None),
            1 => Some(CompressionAlgorithm::Deflate),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    fn compress(self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        match self {
            CompressionAlgorithm::None => Ok(data.to_vec()),
            CompressionAlgorithm::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder
                    .write_all(data)
                    .map_err(|e| CodecError::Compression(e.to_string()))?;
                encoder
                    .finish()
                    .map_err(|e| CodecError::Compression(e.to_string()))
            }
        }
    }

    fn decompress(self, data: &[u8]) -> Result<Cow<'_, [u8]>, CodecError> {
        match self {
            CompressionAlgorithm::None => Ok(Cow::Borrowed(data)),
            CompressionAlgorithm::Deflate => {
                let mut decoder = DeflateDecoder::new(data);
                let mut out = Vec::new();
                decoder
                    .read_to_end(&mut out)
                    .map_err(|e| CodecError::Compression(e.to_string()))?;
                Ok(Cow::Owned(out))
            }
        }
    }
}

/// Encode a payload in the bare (legacy) form
pub fn encode_payload<E: LogEntry>(payload: &SegmentPayload<E>) -> Result<Vec<u8>, CodecError> {
    let body = postcard::to_allocvec(payload).map_err(|e| CodecError::Encode(e.to_string()))?;
    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(LEGACY_PAYLOAD_TAG);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode a payload in the bare (legacy) form
pub fn decode_payload<E: LogEntry>(bytes: &[u8]) -> Result<SegmentPayload<E>, CodecError> {
    match bytes.split_first() {
        None => Err(CodecError::Empty),
        Some((&LEGACY_PAYLOAD_TAG, body)) => {
            postcard::from_bytes(body).map_err(|e| CodecError::Decode(e.to_string()))
        }
        Some((&marker, _)) => Err(CodecError::UnknownMarker(marker)),
    }
}

/// Encode and wrap a payload in a versioned, deflate-compressed envelope
pub fn compress_payload<E: LogEntry>(payload: &SegmentPayload<E>) -> Result<Bytes, CodecError> {
    compress_payload_with(payload, CompressionAlgorithm::Deflate)
}

pub fn compress_payload_with<E: LogEntry>(
    payload: &SegmentPayload<E>,
    algorithm: CompressionAlgorithm,
) -> Result<Bytes, CodecError> {
    let encoded = encode_payload(payload)?;
    let compressed = algorithm.compress(&encoded)?;

    let mut out = Vec::with_capacity(compressed.len() + 4);
    out.push(ENVELOPE_MAGIC);
    write_varint(&mut out, CURRENT_SCHEMA_VERSION)?;
    write_varint(&mut out, u32::from(algorithm.as_byte()))?;
    out.extend_from_slice(&compressed);
    Ok(Bytes::from(out))
}

/// Decode a stored payload in either form
pub fn decompress_payload<E: LogEntry>(bytes: &[u8]) -> Result<SegmentPayload<E>, CodecError> {
    match bytes.first() {
        None => Err(CodecError::Empty),
        Some(&LEGACY_PAYLOAD_TAG) => decode_payload(bytes),
        Some(&ENVELOPE_MAGIC) => {
            let (schema_version, rest) = read_varint(&bytes[1..])?;
            if schema_version != CURRENT_SCHEMA_VERSION {
                return Err(CodecError::UnsupportedSchemaVersion(schema_version));
            }

            let (algorithm_id, compressed) = read_varint(rest)?;
            let algorithm = u8::try_from(algorithm_id)
                .ok()
                .and_then(CompressionAlgorithm::from_byte)
                .ok_or(CodecError::UnsupportedCompression(algorithm_id))?;

            let encoded = algorithm.decompress(compressed)?;
            decode_payload(&encoded)
        }
        Some(&marker) => Err(CodecError::UnknownMarker(marker)),
    }
}

fn write_varint(out: &mut Vec<u8>, value: u32) -> Result<(), CodecError> {
    let bytes = postcard::to_allocvec(&value).map_err(|e| CodecError::Encode(e.to_string()))?;
    out.extend_from_slice(&bytes);
    Ok(())
}

fn read_varint(input: &[u8]) -> Result<(u32, &[u8]), CodecError> {
    postcard::take_from_bytes::<u32>(input).map_err(|_| CodecError::Truncated)
}
