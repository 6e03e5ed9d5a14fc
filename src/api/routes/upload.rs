use super::MultipartForm;
use crate::api::state::AppState;
use crate::upload::UploadRequest;
use axum::{
    Json,
    extract::{Multipart, State},
    response::{IntoResponse, Response},
};

/// POST /upload - Forward a multipart file to the file service
///
/// Fields: `file`, optional `name` (stored file name) and `subfolder`.
pub async fn upload_file(State(state): State<AppState>, multipart: Multipart) -> Response {
    let mut form = match MultipartForm::read(multipart).await {
        Ok(form) => form,
        Err(e) => return e.into_response(),
    };

    let file = match form.require_file() {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!("Upload without a file part");
            return e.into_response();
        }
    };

    let request = UploadRequest {
        file_name: file.file_name,
        content_type: file.content_type,
        bytes: file.bytes,
        replace_file_name: form.field("name").map(str::to_string),
        file_path: form.field("subfolder").map(str::to_string),
    };

    match state.service.uploads().forward(request).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Upload proxy failed");
            e.into_response()
        }
    }
}
