//! Payload compression capability
//!
//! The data path asks [`Compression::is_compressible`] whether a payload is
//! worth compressing and wraps its streams accordingly. Only the decision
//! and the stream wrappers live here; the choice of codec is pluggable.

use std::io::{self, BufReader, Read, Write};
use tracing::error;
use zstd::stream::write::Encoder;

/// A swappable payload compression codec
pub trait Compression: Send + Sync {
    /// Whether an object with this name and MIME type should be compressed
    fn is_compressible(&self, object_name: &str, mime_type: &str) -> bool {
        is_compressible(object_name, mime_type)
    }

    /// Wrap a reader over stored (compressed) bytes, yielding plain bytes
    fn compress_reader(&self, reader: Box<dyn Read + Send>) -> io::Result<Box<dyn Read + Send>>;

    /// Wrap a writer so that bytes written to it are stored compressed.
    ///
    /// The caller must call [`CompressedWrite::finish`] to complete the
    /// stream; until it returns `Ok` the stored payload is truncated.
    fn compress_writer(
        &self,
        writer: Box<dyn Write + Send>,
    ) -> io::Result<Box<dyn CompressedWrite>>;
}

/// Encoding writer returned by [`Compression::compress_writer`]
pub trait CompressedWrite: Write + Send {
    /// Write the end of the stream and flush the underlying writer
    fn finish(self: Box<Self>) -> io::Result<()>;
}

/// Zstandard codec
#[derive(Debug, Clone, Copy)]
pub struct ZstdCompression {
    level: i32,
}

impl ZstdCompression {
    /// Create a codec at the given level (1-22)
    #[must_use]
    pub const fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for ZstdCompression {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Compression for ZstdCompression {
    fn compress_reader(&self, reader: Box<dyn Read + Send>) -> io::Result<Box<dyn Read + Send>> {
        let decoder = zstd::stream::read::Decoder::with_buffer(BufReader::new(reader))?;
        Ok(Box::new(decoder))
    }

    fn compress_writer(
        &self,
        writer: Box<dyn Write + Send>,
    ) -> io::Result<Box<dyn CompressedWrite>> {
        let encoder = Encoder::new(writer, self.level)?;
        Ok(Box::new(ZstdWriter {
            encoder: Some(encoder),
        }))
    }
}

/// Zstd encoding writer
struct ZstdWriter<W: Write> {
    encoder: Option<Encoder<'static, W>>,
}

impl<W: Write> Write for ZstdWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.encoder.as_mut() {
            Some(encoder) => encoder.write(buf),
            None => Err(io::Error::other("zstd stream already finished")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.as_mut().map_or(Ok(()), Write::flush)
    }
}

impl<W: Write + Send> CompressedWrite for ZstdWriter<W> {
    fn finish(mut self: Box<Self>) -> io::Result<()> {
        match self.encoder.take() {
            Some(encoder) => encoder.finish()?.flush(),
            None => Ok(()),
        }
    }
}

impl<W: Write> Drop for ZstdWriter<W> {
    fn drop(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            error!("Compressed stream dropped without finish");
            if let Err(e) = encoder.finish() {
                error!("Failed to finish compressed stream: {}", e);
            }
        }
    }
}

/// Suffix and MIME heuristic shared by all codecs.
///
/// Text and markup or source code compresses well; archives and most image
/// formats are already compressed.
#[must_use]
pub fn is_compressible(object_name: &str, mime_type: &str) -> bool {
    let suffix = object_name
        .rsplit_once('.')
        .map_or(object_name, |(_, ext)| ext)
        .to_ascii_lowercase();

    if mime_type.starts_with("text/") {
        return true;
    }

    if matches!(suffix.as_str(), "svg" | "bmp") {
        return true;
    }
    if mime_type.starts_with("image/") {
        return false;
    }

    match suffix.as_str() {
        "zip" | "rar" | "gz" | "bz2" | "xz" | "png" | "jpg" | "jpeg" => return false,
        "pdf" | "txt" | "html" | "htm" | "css" | "js" | "json" | "php" | "java" | "go" | "rb"
        | "c" | "cpp" | "h" | "hpp" => return true,
        _ => {}
    }

    mime_type.starts_with("application/")
        && (mime_type.ends_with("xml") || mime_type.ends_with("script"))
}
