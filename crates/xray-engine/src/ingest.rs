use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use tracing::debug;
use xray_contracts::uploads::{ImageSource, UploadedImage};

use crate::error::IngestError;

/// An image ready for the model call: base64 payload plus declared MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodedImage {
    pub name: String,
    pub mime_type: String,
    pub data: String,
}

/// Reads and encodes every upload in order. The first read failure aborts
/// the batch.
pub async fn ingest_uploads(uploads: &[UploadedImage]) -> Result<Vec<EncodedImage>, IngestError> {
    let mut encoded = Vec::with_capacity(uploads.len());
    for upload in uploads {
        encoded.push(encode_upload(upload).await?);
    }
    debug!(count = encoded.len(), "ingested uploads");
    Ok(encoded)
}

pub async fn encode_upload(upload: &UploadedImage) -> Result<EncodedImage, IngestError> {
    let data = match upload.source() {
        ImageSource::Bytes(bytes) => BASE64.encode(bytes),
        ImageSource::Path(path) => {
            let bytes = tokio::fs::read(path).await.map_err(|source| IngestError {
                name: upload.name().to_string(),
                source,
            })?;
            BASE64.encode(bytes)
        }
    };
    Ok(EncodedImage {
        name: upload.name().to_string(),
        mime_type: upload.mime_type().to_string(),
        data,
    })
}
