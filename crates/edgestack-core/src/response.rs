//! The unified outbound response model.
//!
//! [`EdgeResponse`] is a small state machine: `Idle` until the head is
//! committed, `HeadSent` while streaming, `Ended` once the body is complete.
//! `write_head` and `end` are idempotent so action chains and error paths
//! can call them defensively without corrupting the wire output.
//!
//! Output compression is negotiated up front (`set_output_compression`) but
//! applied lazily: a streamed body is piped through the compression writer
//! chunk by chunk, with a codec flush after every `write` so client-perceived
//! latency follows the application's write cadence; a buffered body is
//! compressed in one shot when `end` runs, which also keeps `content-length`
//! accurate for the cloud transport.

use bytes::Bytes;
use edgestack_model::contract::{PROVIDER_INTERNAL_PREFIXES, SINGLE_VALUE_ONLY_HEADERS};
use edgestack_model::{EdgeResult, HeaderBag, HeaderValues, ProxyResult};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::compression::{CompressionWriter, Encoding, compress_buffer, is_compressible};

/// Lifecycle state of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseState {
    /// Nothing committed; status, headers, and body may still change.
    #[default]
    Idle,
    /// Status and headers are locked; body chunks are streaming out.
    HeadSent,
    /// The body is complete.
    Ended,
}

/// The final body of an ended response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// No body.
    Empty,
    /// A complete in-memory body.
    Buffered(Bytes),
    /// Wire-ready chunks produced by streamed writes, in order.
    Streamed(Vec<Bytes>),
}

impl ResponseBody {
    /// Concatenate into one buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Self::Empty => Bytes::new(),
            Self::Buffered(bytes) => bytes.clone(),
            Self::Streamed(frames) => {
                let mut all = Vec::with_capacity(frames.iter().map(Bytes::len).sum());
                for frame in frames {
                    all.extend_from_slice(frame);
                }
                Bytes::from(all)
            }
        }
    }
}

/// A transport-independent outbound response.
#[derive(Debug)]
pub struct EdgeResponse {
    /// The response status code.
    pub status: u16,
    /// Response headers, lower-cased.
    pub headers: HeaderBag,
    state: ResponseState,
    encoding: Encoding,
    writer: Option<CompressionWriter>,
    buffered: Vec<u8>,
    frames: Vec<Bytes>,
    streaming: bool,
}

impl Default for EdgeResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeResponse {
    /// Create an idle `200` response with no headers or body.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: HeaderBag::new(),
            state: ResponseState::Idle,
            encoding: Encoding::Identity,
            writer: None,
            buffered: Vec::new(),
            frames: Vec::new(),
            streaming: false,
        }
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ResponseState {
        self.state
    }

    /// Returns `true` once the head is committed.
    #[must_use]
    pub fn head_sent(&self) -> bool {
        self.state != ResponseState::Idle
    }

    /// Returns `true` once the body is complete.
    #[must_use]
    pub fn ended(&self) -> bool {
        self.state == ResponseState::Ended
    }

    /// Select the output encoding to apply when the body is produced.
    /// Ignored once the head is committed.
    pub fn set_output_compression(&mut self, encoding: Encoding) {
        if self.state == ResponseState::Idle {
            self.encoding = encoding;
        } else {
            tracing::warn!(
                requested = ?encoding,
                kept = ?self.encoding,
                "output compression change ignored after head commit"
            );
        }
    }

    /// The encoding selected for output compression.
    #[must_use]
    pub fn output_compression(&self) -> Encoding {
        self.encoding
    }

    /// Replace the buffered body, recomputing `content-length` and clearing
    /// any stale `content-encoding`. Ignored once the head is committed.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        if self.state != ResponseState::Idle {
            return;
        }
        self.buffered = body.into();
        self.headers.delete("content-encoding");
        self.headers.set("content-length", self.buffered.len().to_string());
    }

    /// The buffered body set so far. Empty once streaming has started.
    #[must_use]
    pub fn buffered_body(&self) -> &[u8] {
        &self.buffered
    }

    /// Reset status, headers, and body to a fresh idle response. Ignored
    /// once the head is committed.
    pub fn clear(&mut self) {
        if self.state != ResponseState::Idle {
            return;
        }
        self.status = 200;
        self.headers = HeaderBag::new();
        self.buffered.clear();
        self.encoding = Encoding::Identity;
    }

    /// Whether the negotiated encoding actually applies: something other
    /// than identity, no upstream encoding already present, and a
    /// compressible content type.
    fn compression_applies(&self) -> bool {
        self.encoding != Encoding::Identity
            && !self.headers.contains("content-encoding")
            && self
                .headers
                .get("content-type")
                .is_some_and(is_compressible)
    }

    /// Commit the status and headers. Idempotent; the second and later
    /// calls are no-ops.
    ///
    /// A committed head implies a body of unknown length, so any stale
    /// `content-length` is dropped and the response switches to chunked
    /// transfer.
    pub fn write_head(&mut self) {
        if self.state != ResponseState::Idle {
            return;
        }
        if self.compression_applies() {
            if let Some(token) = self.encoding.token() {
                self.headers.set("content-encoding", token);
            }
            self.writer = Some(CompressionWriter::new(self.encoding));
        }
        self.headers.delete("content-length");
        self.headers.set("transfer-encoding", "chunked");
        self.state = ResponseState::HeadSent;
    }

    /// Stream one body chunk, committing the head first if needed. The
    /// codec is flushed after every chunk.
    ///
    /// # Errors
    ///
    /// Returns [`edgestack_model::EdgeError::Io`] on a codec failure.
    pub fn write(&mut self, chunk: &[u8]) -> EdgeResult<()> {
        if self.state == ResponseState::Ended {
            return Ok(());
        }
        self.write_head();
        self.streaming = true;

        if let Some(writer) = self.writer.as_mut() {
            writer.write(chunk)?;
            let ready = writer.flush_pending()?;
            if !ready.is_empty() {
                self.frames.push(Bytes::from(ready));
            }
        } else if !chunk.is_empty() {
            self.frames.push(Bytes::copy_from_slice(chunk));
        }
        Ok(())
    }

    /// Complete the body. Idempotent.
    ///
    /// For a streamed response the final chunk (if any) is written and the
    /// codec finalized. For a buffered response the whole body is encoded
    /// in one shot and `content-length` updated to the encoded size.
    ///
    /// # Errors
    ///
    /// Returns [`edgestack_model::EdgeError::Io`] on a codec failure.
    pub fn end(&mut self, final_chunk: Option<&[u8]>) -> EdgeResult<()> {
        if self.state == ResponseState::Ended {
            return Ok(());
        }

        if self.streaming {
            if let Some(chunk) = final_chunk {
                self.write(chunk)?;
            }
            if let Some(writer) = self.writer.take() {
                let tail = writer.finish()?;
                if !tail.is_empty() {
                    self.frames.push(Bytes::from(tail));
                }
            }
            self.state = ResponseState::Ended;
            return Ok(());
        }

        if self.state == ResponseState::HeadSent {
            // The head was committed explicitly but nothing streamed yet:
            // the buffered body still has to pass through the codec the
            // head advertised.
            if let Some(chunk) = final_chunk {
                self.buffered.extend_from_slice(chunk);
            }
            let data = std::mem::take(&mut self.buffered);
            if let Some(mut writer) = self.writer.take() {
                writer.write(&data)?;
                let encoded = writer.finish()?;
                if !encoded.is_empty() {
                    self.frames.push(Bytes::from(encoded));
                }
            } else if !data.is_empty() {
                self.frames.push(Bytes::from(data));
            }
            self.streaming = true;
            self.state = ResponseState::Ended;
            return Ok(());
        }

        // Buffered path: the head is not committed yet, so the body can be
        // encoded whole, the length kept exact, and chunked transfer is
        // unnecessary.
        if let Some(chunk) = final_chunk {
            self.buffered.extend_from_slice(chunk);
        }
        self.headers.delete("transfer-encoding");
        if self.compression_applies() && !self.buffered.is_empty() {
            let encoded = compress_buffer(self.encoding, &self.buffered)?;
            if let Some(token) = self.encoding.token() {
                self.headers.set("content-encoding", token);
            }
            self.headers.set("content-length", encoded.len().to_string());
            self.buffered = encoded;
        } else if !self.buffered.is_empty() {
            self.headers
                .set_default("content-length", self.buffered.len().to_string());
        }
        self.writer = None;
        self.state = ResponseState::Ended;
        Ok(())
    }

    /// Tear down into wire parts, ending the response first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`edgestack_model::EdgeError::Io`] on a codec failure while
    /// ending.
    pub fn into_wire_parts(mut self) -> EdgeResult<(u16, HeaderBag, ResponseBody)> {
        self.end(None)?;
        let body = if self.streaming {
            if self.frames.is_empty() {
                ResponseBody::Empty
            } else {
                ResponseBody::Streamed(std::mem::take(&mut self.frames))
            }
        } else if self.buffered.is_empty() {
            ResponseBody::Empty
        } else {
            ResponseBody::Buffered(Bytes::from(std::mem::take(&mut self.buffered)))
        };
        Ok((self.status, self.headers, body))
    }

    /// Project into the cloud proxy result shape: single-valued headers and
    /// multi-valued ones split apart, body base64-encoded, provider-internal
    /// headers stripped.
    ///
    /// # Errors
    ///
    /// Returns [`edgestack_model::EdgeError::Io`] on a codec failure while
    /// ending.
    pub fn into_proxy_result(self) -> EdgeResult<ProxyResult> {
        let (status, mut headers, body) = self.into_wire_parts()?;
        headers.delete_by_prefix(PROVIDER_INTERNAL_PREFIXES);
        // The body is materialized in the result envelope; hop-by-hop
        // framing headers must not leak into it.
        headers.delete("transfer-encoding");

        let mut result = ProxyResult {
            status_code: status,
            is_base64_encoded: true,
            body: BASE64.encode(body.to_bytes()),
            ..ProxyResult::default()
        };

        for (name, values) in &headers {
            match values {
                HeaderValues::One(v) => {
                    result.headers.insert(name.to_owned(), v.clone());
                }
                HeaderValues::Many(list) => {
                    // Some providers refuse multi-value entries for these
                    // names even with a single value in them.
                    if SINGLE_VALUE_ONLY_HEADERS.contains(&name) {
                        result.headers.insert(name.to_owned(), list.join(", "));
                    } else {
                        result
                            .multi_value_headers
                            .insert(name.to_owned(), list.clone());
                    }
                }
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn test_should_start_idle_with_status_200() {
        let response = EdgeResponse::new();
        assert_eq!(response.status, 200);
        assert_eq!(response.state(), ResponseState::Idle);
        assert!(!response.head_sent());
    }

    #[test]
    fn test_should_lock_head_after_write_head() {
        let mut response = EdgeResponse::new();
        response.headers.set("content-type", "text/plain");
        response.write_head();
        assert_eq!(response.state(), ResponseState::HeadSent);

        // Later head writes and body replacements are ignored.
        response.set_body("too late");
        response.clear();
        assert!(response.buffered_body().is_empty());
        assert_eq!(response.state(), ResponseState::HeadSent);
    }

    #[test]
    fn test_should_recompute_content_length_on_set_body() {
        let mut response = EdgeResponse::new();
        response.headers.set("content-encoding", "gzip");
        response.set_body("hello");
        assert_eq!(response.headers.get("content-length"), Some("5"));
        assert!(!response.headers.contains("content-encoding"));
    }

    #[test]
    fn test_should_compress_buffered_body_on_end() {
        let mut response = EdgeResponse::new();
        response.headers.set("content-type", "text/html");
        response.set_output_compression(Encoding::Gzip);
        response.set_body("<html>hello hello hello hello</html>");
        response.end(None).expect("ends");

        assert_eq!(response.headers.get("content-encoding"), Some("gzip"));
        let (_, headers, body) = {
            let mut r = EdgeResponse::new();
            r.headers.set("content-type", "text/html");
            r.set_output_compression(Encoding::Gzip);
            r.set_body("<html>hello hello hello hello</html>");
            r.into_wire_parts().expect("parts")
        };
        assert_eq!(headers.get("content-encoding"), Some("gzip"));
        let ResponseBody::Buffered(bytes) = body else {
            panic!("expected buffered body");
        };
        assert_eq!(
            headers.get("content-length"),
            Some(bytes.len().to_string().as_str())
        );

        let mut decoder = flate2::read::GzDecoder::new(bytes.as_ref());
        let mut decoded = String::new();
        decoder.read_to_string(&mut decoded).expect("decodes");
        assert_eq!(decoded, "<html>hello hello hello hello</html>");
    }

    #[test]
    fn test_should_not_compress_incompressible_content_type() {
        let mut response = EdgeResponse::new();
        response.headers.set("content-type", "image/png");
        response.set_output_compression(Encoding::Gzip);
        response.set_body("binary-ish");
        response.end(None).expect("ends");
        assert!(!response.headers.contains("content-encoding"));
    }

    #[test]
    fn test_should_not_double_compress_pre_encoded_body() {
        let mut response = EdgeResponse::new();
        response.headers.set("content-type", "text/html");
        response.headers.set("content-encoding", "br");
        response.set_output_compression(Encoding::Gzip);
        response.buffered = b"already encoded".to_vec();
        response.end(None).expect("ends");
        assert_eq!(response.headers.get("content-encoding"), Some("br"));
    }

    #[test]
    fn test_should_stream_compressed_chunks() {
        let mut response = EdgeResponse::new();
        response.headers.set("content-type", "text/plain");
        response.set_output_compression(Encoding::Gzip);
        response.write(b"chunk one ").expect("writes");
        response.write(b"chunk two").expect("writes");
        response.end(None).expect("ends");

        assert_eq!(response.headers.get("content-encoding"), Some("gzip"));
        assert!(!response.headers.contains("content-length"));

        let (status, _, body) = {
            let mut r = EdgeResponse::new();
            r.headers.set("content-type", "text/plain");
            r.set_output_compression(Encoding::Gzip);
            r.write(b"chunk one ").expect("writes");
            r.write(b"chunk two").expect("writes");
            r.into_wire_parts().expect("parts")
        };
        assert_eq!(status, 200);
        let ResponseBody::Streamed(frames) = body else {
            panic!("expected streamed body");
        };
        assert!(frames.len() >= 2, "each write should flush a frame");

        let all = ResponseBody::Streamed(frames).to_bytes();
        let mut decoder = flate2::read::GzDecoder::new(all.as_ref());
        let mut decoded = String::new();
        decoder.read_to_string(&mut decoded).expect("decodes");
        assert_eq!(decoded, "chunk one chunk two");
    }

    #[test]
    fn test_should_encode_buffered_body_when_head_committed_first() {
        let mut response = EdgeResponse::new();
        response.headers.set("content-type", "text/html");
        response.set_output_compression(Encoding::Gzip);
        response.set_body("<html>hello hello hello hello</html>");
        response.write_head();
        let (_, headers, body) = response.into_wire_parts().expect("parts");

        assert_eq!(headers.get("content-encoding"), Some("gzip"));
        assert!(!headers.contains("content-length"));

        let bytes = body.to_bytes();
        let mut decoder = flate2::read::GzDecoder::new(bytes.as_ref());
        let mut decoded = String::new();
        decoder.read_to_string(&mut decoded).expect("decodes");
        assert_eq!(decoded, "<html>hello hello hello hello</html>");
    }

    #[test]
    fn test_should_drop_stale_content_length_when_streaming_identity() {
        let mut response = EdgeResponse::new();
        response.headers.set("content-type", "text/plain");
        response.headers.set("content-length", "999");
        response.write(b"streamed without a codec").expect("writes");
        response.end(None).expect("ends");

        assert!(!response.headers.contains("content-length"));
        assert_eq!(response.headers.get("transfer-encoding"), Some("chunked"));
    }

    #[test]
    fn test_should_swap_transfer_encoding_for_length_on_buffered_end() {
        let mut response = EdgeResponse::new();
        response.headers.set("transfer-encoding", "chunked");
        response.set_body("plain");
        response.end(None).expect("ends");

        assert!(!response.headers.contains("transfer-encoding"));
        assert_eq!(response.headers.get("content-length"), Some("5"));
    }

    #[test]
    fn test_should_keep_negotiated_encoding_after_head_commit() {
        let mut response = EdgeResponse::new();
        response.headers.set("content-type", "text/plain");
        response.set_output_compression(Encoding::Gzip);
        response.write_head();
        response.set_output_compression(Encoding::Brotli);
        assert_eq!(response.output_compression(), Encoding::Gzip);
    }

    #[test]
    fn test_should_make_end_idempotent() {
        let mut response = EdgeResponse::new();
        response.set_body("done");
        response.end(None).expect("ends");
        response.end(Some(b"ignored")).expect("second end is a no-op");
        assert_eq!(response.buffered_body(), b"done");
    }

    #[test]
    fn test_should_project_proxy_result_with_split_headers() {
        let mut response = EdgeResponse::new();
        response.status = 201;
        response.headers.set("content-type", "text/plain");
        response.headers.add("set-cookie", "a=1");
        response.headers.add("set-cookie", "b=2");
        response.headers.set("x-amz-internal", "strip-me");
        response.set_body("OK");

        let result = response.into_proxy_result().expect("projects");
        assert_eq!(result.status_code, 201);
        assert!(result.is_base64_encoded);
        assert_eq!(result.body, BASE64.encode("OK"));
        assert_eq!(
            result.headers.get("content-type").map(String::as_str),
            Some("text/plain")
        );
        assert_eq!(
            result.multi_value_headers.get("set-cookie"),
            Some(&vec!["a=1".to_owned(), "b=2".to_owned()])
        );
        assert!(!result.headers.contains_key("x-amz-internal"));
    }
}
