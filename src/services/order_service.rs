use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    checkout::CheckoutLine,
    db::DbPool,
    dto::orders::{CheckoutRequest, OrderList},
    error::{AppError, AppResult},
    models::{Customer, ItemId, Order, OrderLine},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
    store::StoreError,
};

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    customer_name: String,
    customer_phone: String,
    customer_address: String,
    payment_mode: String,
    total: i64,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct OrderLineRow {
    order_id: Uuid,
    item_id: String,
    name: String,
    quantity: i32,
    unit_price: i64,
}

pub async fn checkout(
    state: &AppState,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<Order>> {
    if payload.lines.iter().any(|line| line.quantity == 0) {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }
    let lines: Vec<CheckoutLine> = payload
        .lines
        .into_iter()
        .map(|line| CheckoutLine::new(line.item_id, line.quantity))
        .collect();

    let order = state.engine.checkout(&lines, &payload.customer).await?;

    if let Err(err) = state.catalog.refresh(&state.store).await {
        tracing::warn!(error = %err, "catalog refresh failed");
    }

    Ok(ApiResponse::success(
        "Checkout success",
        order,
        Some(Meta::empty()),
    ))
}

/// Order ledger, newest first unless asked otherwise.
pub async fn list_orders(
    state: &AppState,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize_with(50);
    let status = query.status.as_ref().filter(|s| !s.is_empty()).cloned();
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let sql = format!(
        r#"
        SELECT id, customer_name, customer_phone, customer_address, payment_mode,
               total, status, created_at
        FROM orders
        WHERE ($1::text IS NULL OR status = $1)
        ORDER BY created_at {}
        LIMIT $2 OFFSET $3
        "#,
        sort_order.as_sql()
    );
    let rows = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(&status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.pool)
        .await?;

    let total: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM orders WHERE ($1::text IS NULL OR status = $1)")
            .bind(&status)
            .fetch_one(&state.pool)
            .await?;

    let items = with_lines(&state.pool, rows).await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

pub async fn get_order(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Order>> {
    let row = sqlx::query_as::<_, OrderRow>(
        r#"
        SELECT id, customer_name, customer_phone, customer_address, payment_mode,
               total, status, created_at
        FROM orders
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?;
    let row = match row {
        Some(row) => row,
        None => return Err(AppError::NotFound),
    };

    let order = with_lines(&state.pool, vec![row])
        .await?
        .pop()
        .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success("OK", order, Some(Meta::empty())))
}

async fn with_lines(pool: &DbPool, rows: Vec<OrderRow>) -> AppResult<Vec<Order>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let line_rows = sqlx::query_as::<_, OrderLineRow>(
        r#"
        SELECT order_id, item_id, name, quantity, unit_price
        FROM order_lines
        WHERE order_id = ANY($1)
        ORDER BY order_id, position
        "#,
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut lines: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
    for row in line_rows {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            StoreError::Corrupt(format!("order {} has quantity {}", row.order_id, row.quantity))
        })?;
        lines.entry(row.order_id).or_default().push(OrderLine {
            item_id: ItemId::new(row.item_id),
            name: row.name,
            quantity,
            unit_price: row.unit_price,
        });
    }

    Ok(rows
        .into_iter()
        .map(|row| order_from_row(row, &mut lines))
        .collect())
}

fn order_from_row(row: OrderRow, lines: &mut HashMap<Uuid, Vec<OrderLine>>) -> Order {
    Order {
        id: row.id,
        created_at: row.created_at,
        customer: Customer {
            name: row.customer_name,
            phone: row.customer_phone,
            address: row.customer_address,
            payment_mode: row.payment_mode,
        },
        lines: lines.remove(&row.id).unwrap_or_default(),
        total: row.total,
        status: row.status,
    }
}
