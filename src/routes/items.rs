use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};

use crate::{
    dto::items::ItemList,
    error::AppResult,
    models::{Item, ItemId},
    response::ApiResponse,
    routes::params::ItemQuery,
    services::item_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_items))
        .route("/{id}", get(get_item))
}

#[utoipa::path(
    get,
    path = "/api/items",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("q" = Option<String>, Query, description = "Case-insensitive name search")
    ),
    responses(
        (status = 200, description = "Catalog items with current stock", body = ApiResponse<ItemList>)
    ),
    tag = "Items"
)]
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> AppResult<Json<ApiResponse<ItemList>>> {
    let resp = item_service::list_items(&state, query)?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/items/{id}",
    params(("id" = String, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Item", body = ApiResponse<Item>),
        (status = 404, description = "Item not found")
    ),
    tag = "Items"
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Item>>> {
    let resp = item_service::get_item(&state, ItemId::new(id))?;
    Ok(Json(resp))
}
