//! # File Identifier Codec
//!
//! Converts Telegram file references into short URL-safe keys used as the
//! primary key of the media catalog.
//!
//! A Bot API file id is base64url text over a zero-run-length compressed
//! buffer. The buffer holds the file type and datacenter id (little-endian
//! `i32`), an optional TL-encoded file reference, the media id and access
//! hash (little-endian `i64`), and finally a sub-version and version byte.
//! The catalog key keeps only the four integers plus the fixed trailer, so the
//! same media gets the same key whatever file reference Telegram attached.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;

use crate::errors::FileIdError;

/// Type id flag marking a file id that points at a web location
pub const WEB_LOCATION_FLAG: i32 = 1 << 24;
/// Type id flag marking a file id that embeds a file reference
pub const FILE_REFERENCE_FLAG: i32 = 1 << 25;
/// Trailer byte preceding the version byte
pub const SUB_VERSION: u8 = 22;
/// Last byte of every encoded identifier
pub const VERSION: u8 = 4;

/// URL-safe alphabet, no padding on output, padding tolerated on input
const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Structured content of a Telegram file identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdParts {
    pub file_type: i32,
    pub dc_id: i32,
    pub media_id: i64,
    pub access_hash: i64,
    pub file_reference: Vec<u8>,
}

impl FileIdParts {
    /// Pack type, datacenter, media id and access hash as `<iiqq`
    pub fn pack(&self) -> [u8; 24] {
        let mut out = [0u8; 24];
        out[0..4].copy_from_slice(&self.file_type.to_le_bytes());
        out[4..8].copy_from_slice(&self.dc_id.to_le_bytes());
        out[8..16].copy_from_slice(&self.media_id.to_le_bytes());
        out[16..24].copy_from_slice(&self.access_hash.to_le_bytes());
        out
    }

    /// Decode a Bot API file id string
    pub fn decode(file_id: &str) -> Result<Self, FileIdError> {
        let raw = BASE64_URL
            .decode(file_id)
            .map_err(|e| FileIdError::Base64(e.to_string()))?;
        let decoded = rle_decode(&raw)?;

        let (&version, rest) = decoded
            .split_last()
            .ok_or(FileIdError::Truncated("version"))?;
        let body = if version >= 4 {
            rest.split_last()
                .ok_or(FileIdError::Truncated("sub-version"))?
                .1
        } else {
            rest
        };

        let mut reader = Reader::new(body);
        let type_id = reader.read_i32("file type")?;
        let dc_id = reader.read_i32("dc id")?;

        if type_id & WEB_LOCATION_FLAG != 0 {
            return Err(FileIdError::WebLocation);
        }

        let file_reference = if type_id & FILE_REFERENCE_FLAG != 0 {
            reader.read_tl_bytes("file reference")?
        } else {
            Vec::new()
        };

        let media_id = reader.read_i64("media id")?;
        let access_hash = reader.read_i64("access hash")?;

        Ok(Self {
            file_type: type_id & !(WEB_LOCATION_FLAG | FILE_REFERENCE_FLAG),
            dc_id,
            media_id,
            access_hash,
            file_reference,
        })
    }

    /// Encode back into a Bot API file id string
    pub fn encode(&self) -> String {
        let mut type_id = self.file_type;
        if !self.file_reference.is_empty() {
            type_id |= FILE_REFERENCE_FLAG;
        }

        let mut buf = Vec::with_capacity(32 + self.file_reference.len());
        buf.extend_from_slice(&type_id.to_le_bytes());
        buf.extend_from_slice(&self.dc_id.to_le_bytes());
        if !self.file_reference.is_empty() {
            write_tl_bytes(&mut buf, &self.file_reference);
        }
        buf.extend_from_slice(&self.media_id.to_le_bytes());
        buf.extend_from_slice(&self.access_hash.to_le_bytes());
        buf.push(SUB_VERSION);
        buf.push(VERSION);

        BASE64_URL.encode(rle_encode(&buf))
    }
}

/// Replace every run of zero bytes with a `0x00, count` marker.
///
/// Runs longer than 255 are split across several markers.
pub fn rle_encode(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut zeros: u8 = 0;

    for &byte in input {
        if byte == 0 {
            if zeros == u8::MAX {
                out.extend_from_slice(&[0, zeros]);
                zeros = 0;
            }
            zeros += 1;
        } else {
            if zeros > 0 {
                out.extend_from_slice(&[0, zeros]);
                zeros = 0;
            }
            out.push(byte);
        }
    }

    if zeros > 0 {
        out.extend_from_slice(&[0, zeros]);
    }

    out
}

/// Expand `0x00, count` markers back into zero runs
pub fn rle_decode(input: &[u8]) -> Result<Vec<u8>, FileIdError> {
    let mut out = Vec::with_capacity(input.len() * 2);
    let mut bytes = input.iter().enumerate();

    while let Some((pos, &byte)) = bytes.next() {
        if byte == 0 {
            let (_, &count) = bytes
                .next()
                .ok_or(FileIdError::DanglingZeroMarker(pos))?;
            out.resize(out.len() + usize::from(count), 0);
        } else {
            out.push(byte);
        }
    }

    Ok(out)
}

/// Build the catalog key from packed `<iiqq` bytes
pub fn encode_file_id(packed: &[u8]) -> String {
    let mut buf = Vec::with_capacity(packed.len() + 2);
    buf.extend_from_slice(packed);
    buf.push(SUB_VERSION);
    buf.push(VERSION);
    BASE64_URL.encode(rle_encode(&buf))
}

/// Encode raw file reference bytes, without run-length compression
pub fn encode_file_ref(file_ref: &[u8]) -> String {
    BASE64_URL.encode(file_ref)
}

/// Return `(file_id, file_ref)` catalog values for a Bot API file id
pub fn unpack_new_file_id(bot_api_file_id: &str) -> Result<(String, String), FileIdError> {
    let parts = FileIdParts::decode(bot_api_file_id)?;
    Ok((
        encode_file_id(&parts.pack()),
        encode_file_ref(&parts.file_reference),
    ))
}

fn write_tl_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    let header = if len <= 253 {
        buf.push(len as u8);
        1
    } else {
        buf.push(254);
        buf.extend_from_slice(&(len as u32).to_le_bytes()[..3]);
        4
    };
    buf.extend_from_slice(data);
    let padding = (4 - (header + len) % 4) % 4;
    buf.resize(buf.len() + padding, 0);
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], FileIdError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or(FileIdError::Truncated(what))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_i32(&mut self, what: &'static str) -> Result<i32, FileIdError> {
        let bytes = self.take(4, what)?;
        let array: [u8; 4] = bytes.try_into().map_err(|_| FileIdError::Truncated(what))?;
        Ok(i32::from_le_bytes(array))
    }

    fn read_i64(&mut self, what: &'static str) -> Result<i64, FileIdError> {
        let bytes = self.take(8, what)?;
        let array: [u8; 8] = bytes.try_into().map_err(|_| FileIdError::Truncated(what))?;
        Ok(i64::from_le_bytes(array))
    }

    fn read_tl_bytes(&mut self, what: &'static str) -> Result<Vec<u8>, FileIdError> {
        let first = self.take(1, what)?[0];
        let (len, header) = if first <= 253 {
            (usize::from(first), 1)
        } else {
            let b = self.take(3, what)?;
            (
                usize::from(b[0]) | usize::from(b[1]) << 8 | usize::from(b[2]) << 16,
                4,
            )
        };
        let data = self.take(len, what)?.to_vec();
        self.take((4 - (header + len) % 4) % 4, what)?;
        Ok(data)
    }
}
