//! File payloads handed to the queue.

use std::path::{Path, PathBuf};
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;
use serde::Serialize;
use tokio_util::io::ReaderStream;

/// Chunks of a payload, read on demand.
pub type PayloadStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>;

/// Where the bytes of a payload live.
#[derive(Debug, Clone)]
pub enum PayloadSource {
    /// Already in memory (drag-drop, clipboard, tests).
    Memory(Bytes),
    /// On disk; read lazily by the transport.
    Path(PathBuf),
}

/// One file to upload: metadata plus its binary source.
///
/// Owned by its queue item (behind an `Arc`) and never mutated after
/// enqueue.
#[derive(Debug, Clone, Serialize)]
pub struct FilePayload {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    #[serde(skip)]
    pub source: PayloadSource,
}

impl FilePayload {
    /// Build a payload from in-memory bytes. The MIME type is guessed from
    /// the file name.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let name = name.into();
        let bytes = bytes.into();
        Self {
            mime_type: guess_mime_type(&name).to_string(),
            size: bytes.len() as u64,
            name,
            source: PayloadSource::Memory(bytes),
        }
    }

    /// Build a payload that points at a file on disk.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            ));
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin")
            .to_string();
        Ok(Self {
            mime_type: guess_mime_type(&name).to_string(),
            size: metadata.len(),
            name,
            source: PayloadSource::Path(path.to_path_buf()),
        })
    }

    /// Stream the payload in pieces of at most `chunk_size` bytes.
    ///
    /// Files on disk are read as the stream is polled, never loaded whole.
    pub async fn open_stream(
        &self,
        chunk_size: usize,
    ) -> std::io::Result<PayloadStream> {
        let chunk_size = chunk_size.max(1);
        match &self.source {
            PayloadSource::Memory(bytes) => {
                let reader = std::io::Cursor::new(bytes.clone());
                Ok(Box::pin(ReaderStream::with_capacity(reader, chunk_size)))
            }
            PayloadSource::Path(path) => {
                let file = tokio::fs::File::open(path).await?;
                Ok(Box::pin(ReaderStream::with_capacity(file, chunk_size)))
            }
        }
    }
}

/// Guess a MIME type from the file extension. Covers the media types a
/// media library usually sees; anything else is `application/octet-stream`.
pub fn guess_mime_type(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("avif") => "image/avif",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("pdf") => "application/pdf",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("csv") => "text/csv",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}
