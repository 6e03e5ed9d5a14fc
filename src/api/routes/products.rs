use super::MultipartForm;
use crate::api::state::AppState;
use crate::catalog::ProductDraft;
use crate::error::ApiError;
use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::str::FromStr;

/// Parse an optional numeric form field; absent means zero
fn numeric_field<T>(form: &MultipartForm, name: &str) -> Result<T, ApiError>
where
    T: FromStr + Default,
    T::Err: std::fmt::Display,
{
    match form.field(name) {
        None => Ok(T::default()),
        Some(raw) => raw
            .parse()
            .map_err(|e| ApiError::validation(format!("Field '{}' is not a number: {}", name, e))),
    }
}

/// POST /product - Create a product from a multipart form
///
/// Fields: `file` (image), `name`, `price`, `stock`, `description`.
pub async fn create_product(State(state): State<AppState>, multipart: Multipart) -> Response {
    let mut form = match MultipartForm::read(multipart).await {
        Ok(form) => form,
        Err(e) => return e.into_response(),
    };

    let file = match form.require_file() {
        Ok(file) => file,
        Err(e) => return e.into_response(),
    };

    let Some(name) = form.field("name").map(str::to_string) else {
        return ApiError::validation("Missing required field: name").into_response();
    };

    let (price, stock) = match (
        numeric_field::<f64>(&form, "price"),
        numeric_field::<i64>(&form, "stock"),
    ) {
        (Ok(price), Ok(stock)) => (price, stock),
        (Err(e), _) | (_, Err(e)) => return e.into_response(),
    };

    let draft = ProductDraft {
        name,
        price,
        stock,
        description: form.field("description").unwrap_or_default().to_string(),
        file_name: file.file_name,
        content_type: file.content_type,
        image: file.bytes,
    };

    match state.service.create_product(draft).await {
        Ok(created) => (StatusCode::OK, Json(created)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to create product");
            e.into_response()
        }
    }
}
