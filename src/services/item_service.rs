use crate::{
    dto::items::{ItemList, SetStockRequest},
    error::{AppError, AppResult},
    models::{Item, ItemId},
    response::{ApiResponse, Meta},
    routes::params::ItemQuery,
    state::AppState,
};

/// Catalog listing, served from the in-memory snapshot.
pub fn list_items(state: &AppState, query: ItemQuery) -> AppResult<ApiResponse<ItemList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let view = state.catalog.view();

    let needle = query
        .q
        .as_deref()
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());
    let matching: Vec<&Item> = view
        .items()
        .iter()
        .filter(|item| match &needle {
            Some(needle) => item.name.to_lowercase().contains(needle.as_str()),
            None => true,
        })
        .collect();

    let total = i64::try_from(matching.len()).unwrap_or(i64::MAX);
    let items = matching
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(usize::try_from(limit).unwrap_or(0))
        .cloned()
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Items", ItemList { items }, Some(meta)))
}

pub fn get_item(state: &AppState, id: ItemId) -> AppResult<ApiResponse<Item>> {
    let item = state.catalog.get(&id).ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Item", item, None))
}

/// Admin stock override. In-flight checkouts on this item will see a new
/// version and retry against the new stock.
pub async fn set_stock(
    state: &AppState,
    id: ItemId,
    payload: SetStockRequest,
) -> AppResult<ApiResponse<Item>> {
    let item = state
        .store
        .set_stock(&id, payload.stock)
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::info!(item_id = %item.id, stock = item.stock, "stock updated");
    if let Err(err) = state.catalog.refresh(&state.store).await {
        tracing::warn!(error = %err, "catalog refresh failed");
    }

    Ok(ApiResponse::success("Stock updated", item, Some(Meta::empty())))
}
