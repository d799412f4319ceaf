use axum::{
    Json, Router,
    extract::{Path, State},
    routing::patch,
};

use crate::{
    dto::items::SetStockRequest,
    error::AppResult,
    models::{Item, ItemId},
    response::ApiResponse,
    services::item_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/items/{id}/stock", patch(set_stock))
}

#[utoipa::path(
    patch,
    path = "/api/admin/items/{id}/stock",
    params(("id" = String, Path, description = "Item ID")),
    request_body = SetStockRequest,
    responses(
        (status = 200, description = "Stock replaced", body = ApiResponse<Item>),
        (status = 404, description = "Item not found")
    ),
    tag = "Admin"
)]
pub async fn set_stock(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<SetStockRequest>,
) -> AppResult<Json<ApiResponse<Item>>> {
    let resp = item_service::set_stock(&state, ItemId::new(id), payload).await?;
    Ok(Json(resp))
}
