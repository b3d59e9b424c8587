//! # Image Payloads
//!
//! An image travels as a data URL (`data:<mime>;base64,<payload>`) between the
//! browser and the relay, and as raw bytes plus a MIME type between the relay
//! and the processing service. [`ImagePayload`] is the binary form.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use image::ImageFormat;

use crate::relay::RelayError;

/// Content type used when neither the caller nor the bytes say what the image is.
pub const DEFAULT_MIME_TYPE: &str = "image/png";

/// Accepts payloads with or without trailing `=` padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// An image in binary form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    /// Wraps raw bytes. Without a declared type the type is sniffed from the
    /// magic bytes, falling back to [`DEFAULT_MIME_TYPE`].
    pub fn new(bytes: Vec<u8>, declared_type: Option<&str>) -> Self {
        let mime_type = declared_type
            .and_then(media_type)
            .unwrap_or_else(|| sniff_mime_type(&bytes).to_string());
        Self { mime_type, bytes }
    }

    /// Parses a data URL.
    ///
    /// The input is split on the first comma. The part after it must be a
    /// non-empty base64 payload; the part before it may declare a MIME type.
    /// Whitespace inside the payload is ignored.
    ///
    /// # Errors
    ///
    /// [`RelayError::BadInput`] when the comma is missing, the payload is
    /// empty, or the payload is not base64.
    pub fn from_data_url(input: &str) -> Result<Self, RelayError> {
        let (header, payload) = input.split_once(',').ok_or_else(|| {
            RelayError::BadInput("expected a data URL of the form data:<mime>;base64,<payload>".into())
        })?;

        let payload: String = payload
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        if payload.is_empty() {
            return Err(RelayError::BadInput("the image payload is empty".into()));
        }

        let bytes = LENIENT_BASE64
            .decode(payload.as_bytes())
            .map_err(|e| RelayError::BadInput(format!("the image payload is not valid base64: {e}")))?;

        Ok(Self::new(bytes, declared_mime_type(header)))
    }

    /// Encodes the payload as `data:<mime>;base64,<payload>`.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The MIME type named in a data URL header such as `data:image/jpeg;base64`.
fn declared_mime_type(header: &str) -> Option<&str> {
    let header = header.trim();
    let rest = header
        .get(..5)
        .filter(|scheme| scheme.eq_ignore_ascii_case("data:"))
        .map(|_| &header[5..])
        .unwrap_or(header);
    rest.split(';').next()
}

/// Reduces a Content-Type value to its lowercase `type/subtype` essence.
/// Returns `None` for values without a subtype or with non-token characters.
pub fn media_type(value: &str) -> Option<String> {
    let essence = value.split(';').next()?.trim();
    let (kind, subtype) = essence.split_once('/')?;
    if !is_token(kind) || !is_token(subtype) {
        return None;
    }
    Some(essence.to_ascii_lowercase())
}

/// RFC 7230 `token`: one or more tchar.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

/// Guesses the MIME type from the image magic bytes.
pub fn sniff_mime_type(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .ok()
        .and_then(mime_for_format)
        .unwrap_or(DEFAULT_MIME_TYPE)
}

fn mime_for_format(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Bmp => Some("image/bmp"),
        ImageFormat::Tiff => Some("image/tiff"),
        ImageFormat::Ico => Some("image/x-icon"),
        ImageFormat::Avif => Some("image/avif"),
        _ => None,
    }
}
