//! Output-compression negotiation and the streaming compression writer.
//!
//! Encoding preference is fixed: brotli over gzip over deflate, falling back
//! to identity when the client accepts none of them. Only compressible
//! content types are encoded; compressing a JPEG wastes CPU on both ends.

use std::io::Write;

use edgestack_model::EdgeResult;

const BROTLI_BUFFER_SIZE: usize = 4096;
const BROTLI_QUALITY: u32 = 4;
const BROTLI_LG_WINDOW_SIZE: u32 = 22;

/// A negotiated output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// `Content-Encoding: br`
    Brotli,
    /// `Content-Encoding: gzip`
    Gzip,
    /// `Content-Encoding: deflate`
    Deflate,
    /// No compression.
    #[default]
    Identity,
}

impl Encoding {
    /// Pick the preferred encoding from an `accept-encoding` header value.
    #[must_use]
    pub fn negotiate(accept_encoding: Option<&str>) -> Self {
        let Some(accepted) = accept_encoding else {
            return Self::Identity;
        };
        let tokens: Vec<&str> = accepted
            .split(',')
            .map(|t| t.split(';').next().unwrap_or("").trim())
            .collect();

        if tokens.contains(&"br") {
            Self::Brotli
        } else if tokens.contains(&"gzip") {
            Self::Gzip
        } else if tokens.contains(&"deflate") {
            Self::Deflate
        } else {
            Self::Identity
        }
    }

    /// The `content-encoding` token for this encoding, or `None` for
    /// identity.
    #[must_use]
    pub fn token(self) -> Option<&'static str> {
        match self {
            Self::Brotli => Some("br"),
            Self::Gzip => Some("gzip"),
            Self::Deflate => Some("deflate"),
            Self::Identity => None,
        }
    }
}

/// Returns `true` when a content type is worth compressing: textual types,
/// structured `application/*` payloads, and SVG.
#[must_use]
pub fn is_compressible(content_type: &str) -> bool {
    // Ignore parameters like "; charset=utf-8".
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    if essence.starts_with("text/") {
        return true;
    }
    if essence == "image/svg+xml" {
        return true;
    }
    if let Some(subtype) = essence.strip_prefix("application/") {
        return matches!(
            subtype,
            "json" | "javascript" | "x-javascript" | "xml" | "xhtml+xml" | "rss+xml" | "atom+xml"
        ) || subtype.ends_with("+json")
            || subtype.ends_with("+xml");
    }
    false
}

/// A streaming compression sink.
///
/// Bytes written through the writer come back out of `flush_pending` already
/// encoded, so each application-level chunk can be shipped to the client as
/// soon as it is written. `finish` finalizes the stream and returns the
/// trailing codec bytes.
pub enum CompressionWriter {
    /// Brotli stream.
    Brotli(brotli::CompressorWriter<Vec<u8>>),
    /// Gzip stream.
    Gzip(flate2::write::GzEncoder<Vec<u8>>),
    /// Raw deflate (zlib) stream.
    Deflate(flate2::write::ZlibEncoder<Vec<u8>>),
    /// Pass-through.
    Identity(Vec<u8>),
}

impl std::fmt::Debug for CompressionWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Brotli(_) => "Brotli",
            Self::Gzip(_) => "Gzip",
            Self::Deflate(_) => "Deflate",
            Self::Identity(_) => "Identity",
        };
        f.debug_tuple("CompressionWriter").field(&name).finish()
    }
}

impl CompressionWriter {
    /// Create a writer for the given encoding.
    #[must_use]
    pub fn new(encoding: Encoding) -> Self {
        match encoding {
            Encoding::Brotli => Self::Brotli(brotli::CompressorWriter::new(
                Vec::new(),
                BROTLI_BUFFER_SIZE,
                BROTLI_QUALITY,
                BROTLI_LG_WINDOW_SIZE,
            )),
            Encoding::Gzip => Self::Gzip(flate2::write::GzEncoder::new(
                Vec::new(),
                flate2::Compression::default(),
            )),
            Encoding::Deflate => Self::Deflate(flate2::write::ZlibEncoder::new(
                Vec::new(),
                flate2::Compression::default(),
            )),
            Encoding::Identity => Self::Identity(Vec::new()),
        }
    }

    /// Feed a chunk into the stream.
    pub fn write(&mut self, chunk: &[u8]) -> EdgeResult<()> {
        match self {
            Self::Brotli(w) => w.write_all(chunk)?,
            Self::Gzip(w) => w.write_all(chunk)?,
            Self::Deflate(w) => w.write_all(chunk)?,
            Self::Identity(buf) => buf.extend_from_slice(chunk),
        }
        Ok(())
    }

    /// Flush the codec and take whatever encoded bytes are ready to ship.
    pub fn flush_pending(&mut self) -> EdgeResult<Vec<u8>> {
        match self {
            Self::Brotli(w) => {
                w.flush()?;
                Ok(std::mem::take(w.get_mut()))
            }
            Self::Gzip(w) => {
                w.flush()?;
                Ok(std::mem::take(w.get_mut()))
            }
            Self::Deflate(w) => {
                w.flush()?;
                Ok(std::mem::take(w.get_mut()))
            }
            Self::Identity(buf) => Ok(std::mem::take(buf)),
        }
    }

    /// Finalize the stream, returning any trailing codec bytes.
    pub fn finish(self) -> EdgeResult<Vec<u8>> {
        match self {
            Self::Brotli(mut w) => {
                w.flush()?;
                Ok(w.into_inner())
            }
            Self::Gzip(w) => Ok(w.finish()?),
            Self::Deflate(w) => Ok(w.finish()?),
            Self::Identity(buf) => Ok(buf),
        }
    }
}

/// Compress a complete buffer in one shot.
pub fn compress_buffer(encoding: Encoding, data: &[u8]) -> EdgeResult<Vec<u8>> {
    let mut writer = CompressionWriter::new(encoding);
    writer.write(data)?;
    writer.finish()
}
