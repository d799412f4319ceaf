use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    checkout::CheckoutError,
    models::ItemId,
    response::ApiResponse,
    store::StoreError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request {0}")]
    BadRequest(String),

    #[error("{0}")]
    Checkout(#[from] CheckoutError),

    #[error("Store error")]
    Store(#[from] StoreError),

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    item_id: Option<ItemId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    available: Option<u32>,
    retryable: bool,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Checkout(err) => match err {
                CheckoutError::EmptyCart => StatusCode::BAD_REQUEST,
                CheckoutError::ItemNotFound(_) => StatusCode::NOT_FOUND,
                CheckoutError::InsufficientStock { .. } => StatusCode::CONFLICT,
                CheckoutError::TransientConflict { .. } => StatusCode::SERVICE_UNAVAILABLE,
                CheckoutError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Store(_) | AppError::DbError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        let (item_id, available) = match &self {
            AppError::Checkout(CheckoutError::ItemNotFound(item_id)) => (Some(item_id.clone()), None),
            AppError::Checkout(CheckoutError::InsufficientStock { item_id, available }) => {
                (Some(item_id.clone()), Some(*available))
            }
            _ => (None, None),
        };
        let retryable = matches!(&self, AppError::Checkout(err) if err.is_retryable());

        let body = ApiResponse::failure(
            self.to_string(),
            ErrorData {
                error: self.to_string(),
                item_id,
                available,
                retryable,
            },
        );

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
