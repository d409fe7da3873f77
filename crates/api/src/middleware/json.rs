//! JSON body extractor whose rejections use the `{ error, code }` shape.

use axum::extract::FromRequest;

use crate::error::AppError;

/// Like [`axum::Json`], but a malformed or missing body becomes
/// [`AppError::BadRequest`] instead of axum's plain-text rejection.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
