use crate::error::PredictError;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart,
    },
    http::StatusCode,
};
use bytes::{Bytes, BytesMut};

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// Slack on top of the file ceiling for boundaries, headers and other fields.
pub const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// A file accepted by the validator. Lives for one request.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Bytes,
    pub content_type: String,
    pub file_name: String,
    pub size: usize,
}

fn multipart_error(error: MultipartError, max_bytes: usize) -> PredictError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        PredictError::PayloadTooLarge { limit: max_bytes }
    } else {
        PredictError::Malformed(error.body_text())
    }
}

/// Pulls the `image` file out of a multipart body.
///
/// The declared content type is checked before any payload is read, and the
/// size ceiling is enforced chunk by chunk. Fields other than `image`, and an
/// `image` field without a filename, are skipped.
pub async fn read_image(
    multipart: Result<Multipart, MultipartRejection>,
    max_bytes: usize,
) -> Result<UploadedImage, PredictError> {
    // not a multipart request at all: nothing was uploaded
    let mut multipart = multipart.map_err(|_| PredictError::MissingFile)?;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(PredictError::NotAnImage);
        }

        let mut buffer = BytesMut::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?
        {
            if buffer.len() + chunk.len() > max_bytes {
                return Err(PredictError::PayloadTooLarge { limit: max_bytes });
            }
            buffer.extend_from_slice(&chunk);
        }

        let bytes = buffer.freeze();
        return Ok(UploadedImage {
            size: bytes.len(),
            bytes,
            content_type,
            file_name,
        });
    }

    Err(PredictError::MissingFile)
}
