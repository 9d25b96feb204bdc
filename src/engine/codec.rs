//! Line codec for engine stdio streams.
//!
//! Wraps [`tokio_util::codec::AnyDelimiterCodec`] split on `\n` with a fixed
//! maximum line length so an engine that never emits a newline cannot exhaust
//! memory. Decoding strips the delimiter and a trailing `\r`; encoding
//! appends `\n`.
//!
//! Engines are not guaranteed to print UTF-8 (Windows builds may emit
//! GBK-encoded `id` lines), so each line is decoded lossily: invalid bytes
//! become U+FFFD and the line is still delivered.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder, Encoder};

use crate::{AppError, Result};

/// Maximum accepted line length: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Newline-delimited codec for engine stdin and stdout.
///
/// Over-long inbound lines yield [`AppError::Engine`]`("line too long: …")`.
/// I/O errors map to [`AppError::Io`].
#[derive(Debug)]
pub struct EngineCodec(AnyDelimiterCodec);

impl EngineCodec {
    /// Create a codec with the [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self(AnyDelimiterCodec::new_with_max_length(
            b"\n".to_vec(),
            b"\n".to_vec(),
            MAX_LINE_BYTES,
        ))
    }
}

impl Default for EngineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EngineCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let frame = self.0.decode(src).map_err(map_codec_error)?;
        Ok(frame.map(into_line))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let frame = self.0.decode_eof(src).map_err(map_codec_error)?;
        Ok(frame.map(into_line))
    }
}

impl Encoder<String> for EngineCodec {
    type Error = AppError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        self.0.encode(item, dst).map_err(map_codec_error)
    }
}

/// Strip a trailing `\r` and decode, replacing invalid UTF-8.
fn into_line(frame: Bytes) -> String {
    let bytes = frame.strip_suffix(b"\r").unwrap_or(&frame);
    String::from_utf8_lossy(bytes).into_owned()
}

fn map_codec_error(e: AnyDelimiterCodecError) -> AppError {
    match e {
        AnyDelimiterCodecError::MaxChunkLengthExceeded => {
            AppError::Engine(format!("line too long: exceeded {MAX_LINE_BYTES} bytes"))
        }
        AnyDelimiterCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
