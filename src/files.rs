//! Data-URL encoding for file-array fields.
//!
//! A selected file is stored in the form data as a single string:
//!
//! ```text
//! data:<mime-type>;name=<original-filename>;base64,<standard-base64-payload>
//! ```
//!
//! Reading file bytes is the only asynchronous step in the engine. A batch of
//! files is encoded concurrently and committed only when every file in the
//! batch has been encoded; one failure fails the whole batch.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::try_join_all;

use crate::error::FileEncodeError;

/// Mime type used when the file source does not report one.
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// A file picked by the user, read lazily.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Original file name, stored verbatim in the data URL.
    fn name(&self) -> &str;

    fn mime_type(&self) -> &str;

    async fn read(&self) -> std::io::Result<Vec<u8>>;
}

/// A file whose bytes are already in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl InMemoryFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }
}

#[async_trait]
impl FileSource for InMemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    async fn read(&self) -> std::io::Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}

/// Build the data URL for already-read bytes.
pub fn data_url(mime_type: &str, name: &str, bytes: &[u8]) -> String {
    let mime_type = if mime_type.is_empty() {
        FALLBACK_MIME_TYPE
    } else {
        mime_type
    };
    format!(
        "data:{};name={};base64,{}",
        mime_type,
        name,
        STANDARD.encode(bytes)
    )
}

/// Read and encode one file.
pub async fn encode_file(file: &dyn FileSource) -> Result<String, FileEncodeError> {
    let bytes = file.read().await.map_err(|source| FileEncodeError::Read {
        name: file.name().to_string(),
        source,
    })?;
    Ok(data_url(file.mime_type(), file.name(), &bytes))
}

/// Encode a batch of files, preserving selection order.
///
/// # Errors
///
/// Returns the first `FileEncodeError` of the batch; no partial result is produced.
pub async fn encode_batch<F: FileSource>(files: &[F]) -> Result<Vec<String>, FileEncodeError> {
    try_join_all(files.iter().map(|file| encode_file(file))).await
}

/// A decoded data URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime_type: String,
    pub name: Option<String>,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    /// Split an encoded value back into its parts.
    pub fn parse(value: &str) -> Result<Self, FileEncodeError> {
        let malformed = |message: &str| FileEncodeError::MalformedDataUrl {
            message: message.to_string(),
        };

        let rest = value
            .strip_prefix("data:")
            .ok_or_else(|| malformed("missing data: scheme"))?;
        // Base64 never contains a comma; a file name may
        let (header, payload) = rest
            .rsplit_once(',')
            .ok_or_else(|| malformed("missing payload separator"))?;
        let header = header
            .strip_suffix(";base64")
            .ok_or_else(|| malformed("only base64 payloads are supported"))?;

        let (mime_type, name) = match header.split_once(';') {
            Some((mime_type, params)) => (
                mime_type,
                params.split_once("name=").map(|(_, name)| name.to_string()),
            ),
            None => (header, None),
        };
        let mime_type = mime_type.to_string();

        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| malformed(&e.to_string()))?;
        Ok(Self {
            mime_type,
            name,
            bytes,
        })
    }
}
