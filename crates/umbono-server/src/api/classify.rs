//! Classification endpoints: multipart upload, classify-by-url, and the
//! static form page

use axum::{
    extract::{Multipart, Query, State},
    response::Html,
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;
use umbono_core::PredictionResult;

/// Query parameters for `GET /classify-url`
#[derive(Debug, Deserialize)]
pub struct ClassifyUrlParams {
    pub url: String,
}

/// Classify an uploaded image (multipart field `file`)
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PredictionResult>, ApiError> {
    let mut image_bytes = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart payload: {e}")))?
    {
        if field.name() == Some("file") {
            let bytes = field.bytes().await.map_err(|e| {
                ApiError::bad_request(format!("Failed reading multipart 'file' field: {e}"))
            })?;
            if bytes.is_empty() {
                return Err(ApiError::bad_request("Multipart 'file' field is empty"));
            }
            image_bytes = Some(bytes);
        }
    }

    let image_bytes = image_bytes
        .ok_or_else(|| ApiError::bad_request("Missing 'file' field in multipart request"))?;

    info!("Upload request: {} bytes", image_bytes.len());
    let result = state.classifier.predict(&image_bytes)?;
    Ok(Json(result))
}

/// Fetch an image from a remote URL and classify it
pub async fn classify_url(
    State(state): State<AppState>,
    Query(params): Query<ClassifyUrlParams>,
) -> Result<Json<PredictionResult>, ApiError> {
    info!("Classify-url request: {}", params.url);

    let image_bytes = state.fetcher.fetch(&params.url).await?;
    let result = state.classifier.predict(&image_bytes)?;
    Ok(Json(result))
}

/// Static HTML page with the upload and URL forms
pub async fn form() -> Html<&'static str> {
    Html(
        r#"<form action="/upload" method="post" enctype="multipart/form-data">
    Select image to upload:
    <input type="file" name="file">
    <input type="submit" value="Upload Image">
</form>
<p>Or submit a URL:</p>
<form action="/classify-url" method="get">
    <input type="url" name="url">
    <input type="submit" value="Fetch and analyze image">
</form>
"#,
    )
}
