use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::Expr;
use uuid::Uuid;

use super::{
    CommitOutcome, CommitRequest, InventoryStore, StockRecord, StoreError, next_created_at,
};
use crate::{
    catalog::Catalog,
    entity::{
        items::{Column as ItemCol, Entity as Items, Model as ItemModel},
        order_lines::ActiveModel as OrderLineActive,
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
    },
    models::{Item, ItemId, ORDER_STATUS_PENDING, Order},
};

/// Advisory lock key guarding the order ledger's timestamp sequence.
const LEDGER_LOCK_KEY: i64 = 0x5348_4f50_4c45_4447;

/// PostgreSQL-backed items and order ledger.
#[derive(Debug, Clone)]
pub struct PgStore {
    orm: DatabaseConnection,
}

impl PgStore {
    pub fn new(orm: DatabaseConnection) -> Self {
        Self { orm }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.orm
    }

    /// Overwrite an item's stock and bump its version. `None` if the item is unknown.
    pub async fn set_stock(&self, id: &ItemId, stock: u32) -> Result<Option<Item>, StoreError> {
        let stock = to_db_count(stock)?;
        let result = Items::update_many()
            .col_expr(ItemCol::Stock, Expr::value(stock))
            .col_expr(ItemCol::Version, Expr::col(ItemCol::Version).add(1))
            .filter(ItemCol::Id.eq(id.as_str()))
            .exec(&self.orm)
            .await?;
        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.get_item(id).await
    }
}

#[async_trait]
impl Catalog for PgStore {
    async fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        Items::find()
            .order_by_asc(ItemCol::CreatedAt)
            .order_by_asc(ItemCol::Id)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(item_from_entity)
            .collect()
    }

    async fn get_item(&self, id: &ItemId) -> Result<Option<Item>, StoreError> {
        Items::find_by_id(id.as_str().to_owned())
            .one(&self.orm)
            .await?
            .map(item_from_entity)
            .transpose()
    }
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn read_stock(&self, ids: &[ItemId]) -> Result<Vec<Option<StockRecord>>, StoreError> {
        let rows = Items::find()
            .filter(ItemCol::Id.is_in(ids.iter().map(|id| id.as_str().to_owned())))
            .all(&self.orm)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let version = row.version;
            records.push(StockRecord {
                item: item_from_entity(row)?,
                version,
            });
        }

        Ok(ids
            .iter()
            .map(|id| records.iter().find(|record| &record.item.id == id).cloned())
            .collect())
    }

    async fn commit(&self, request: CommitRequest) -> Result<CommitOutcome, StoreError> {
        let txn = self.orm.begin().await?;

        // Decrements run in item-id order so two commits never wait on each
        // other's row locks in opposite order.
        for decrement in &request.decrements {
            let quantity = to_db_count(decrement.quantity)?;
            let result = Items::update_many()
                .col_expr(ItemCol::Stock, Expr::col(ItemCol::Stock).sub(quantity))
                .col_expr(ItemCol::Version, Expr::col(ItemCol::Version).add(1))
                .filter(ItemCol::Id.eq(decrement.item_id.as_str()))
                .filter(ItemCol::Version.eq(decrement.expected_version))
                .filter(ItemCol::Stock.gte(quantity))
                .exec(&txn)
                .await?;

            if result.rows_affected != 1 {
                txn.rollback().await?;
                return Ok(CommitOutcome::Conflict {
                    item_id: decrement.item_id.clone(),
                });
            }
        }

        // Serializes ledger appends so created_at follows commit order.
        txn.execute_unprepared(&format!("SELECT pg_advisory_xact_lock({LEDGER_LOCK_KEY})"))
            .await?;
        let last_created_at = Orders::find()
            .select_only()
            .column_as(Expr::col(OrderCol::CreatedAt).max(), "last_created_at")
            .into_tuple::<Option<sea_orm::prelude::DateTimeWithTimeZone>>()
            .one(&txn)
            .await?
            .flatten()
            .map(|at| at.with_timezone(&Utc));
        let created_at = next_created_at(last_created_at);

        let order_id = Uuid::new_v4();
        let customer = request.order.customer;
        OrderActive {
            id: Set(order_id),
            customer_name: Set(customer.name.clone()),
            customer_phone: Set(customer.phone.clone()),
            customer_address: Set(customer.address.clone()),
            payment_mode: Set(customer.payment_mode.clone()),
            total: Set(request.order.total),
            status: Set(ORDER_STATUS_PENDING.into()),
            created_at: Set(created_at.into()),
        }
        .insert(&txn)
        .await?;

        for (position, line) in request.order.lines.iter().enumerate() {
            OrderLineActive {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                item_id: Set(line.item_id.as_str().to_owned()),
                position: Set(to_db_count(position)?),
                name: Set(line.name.clone()),
                quantity: Set(to_db_count(line.quantity)?),
                unit_price: Set(line.unit_price),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        Ok(CommitOutcome::Committed(Order {
            id: order_id,
            created_at,
            customer,
            lines: request.order.lines,
            total: request.order.total,
            status: ORDER_STATUS_PENDING.to_string(),
        }))
    }
}

pub(crate) fn item_from_entity(model: ItemModel) -> Result<Item, StoreError> {
    let stock = u32::try_from(model.stock)
        .map_err(|_| StoreError::Corrupt(format!("item {} has stock {}", model.id, model.stock)))?;
    Ok(Item {
        id: ItemId::new(model.id),
        name: model.name,
        mrp: model.mrp,
        price: model.price,
        stock,
    })
}

fn to_db_count<T>(value: T) -> Result<i32, StoreError>
where
    T: TryInto<i32> + Copy + std::fmt::Display,
{
    value
        .try_into()
        .map_err(|_| StoreError::Corrupt(format!("count {value} does not fit the database column")))
}
