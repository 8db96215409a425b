use std::path::Path;

use axum::{
    Extension, Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::IntoResponse,
};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use uuid::Uuid;

use bookswap_types::api::{Claims, UploadResponse};

use crate::error::ApiError;
use crate::state::AppState;

/// 10 MB upload limit for listing images
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// URL prefix uploaded files are served under.
pub const UPLOADS_PREFIX: &str = "/uploads";

/// POST /api/upload: multipart form with one `image` file field.
/// Saves to `{upload_dir}/image-{uuid}{ext}` and returns the public path.
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("image") {
            continue;
        }

        let ext = field.file_name().map(file_extension).unwrap_or_default();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        if bytes.is_empty() {
            break;
        }

        let file_name = format!("image-{}{}", Uuid::new_v4(), ext);

        // Ensure uploads directory exists
        tokio::fs::create_dir_all(&state.upload_dir)
            .await
            .map_err(|e| {
                error!("Failed to create uploads directory: {}", e);
                ApiError::Internal(e.into())
            })?;

        let file_path = state.upload_dir.join(&file_name);
        let mut file = tokio::fs::File::create(&file_path).await.map_err(|e| {
            error!("Failed to create file {}: {}", file_path.display(), e);
            ApiError::Internal(e.into())
        })?;
        file.write_all(&bytes).await.map_err(|e| {
            error!("Failed to write file {}: {}", file_path.display(), e);
            ApiError::Internal(e.into())
        })?;
        file.flush().await.map_err(|e| ApiError::Internal(e.into()))?;

        info!(
            "User {} uploaded {} ({} bytes)",
            claims.id,
            file_name,
            bytes.len()
        );

        return Ok(Json(UploadResponse {
            message: "Image uploaded successfully".to_string(),
            image: format!("{}/{}", UPLOADS_PREFIX, file_name),
        }));
    }

    Err(ApiError::bad_request("Please upload a file"))
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::bad_request(e.body_text())
    }
}

/// `.jpg` style suffix taken from the client's filename, or empty when it is
/// missing or not plain alphanumeric.
fn file_extension(original: &str) -> String {
    Path::new(original)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_sanitized() {
        assert_eq!(file_extension("cover.JPG"), ".jpg");
        assert_eq!(file_extension("archive.tar.gz"), ".gz");
        assert_eq!(file_extension("noext"), "");
        assert_eq!(file_extension("evil.p/hp"), "");
        assert_eq!(file_extension("weird.j$g"), "");
    }
}
