use std::sync::Arc;

use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};
use sea_orm::ActiveValue::NotSet;
use shopp_storefront::{
    catalog::{Catalog, CatalogSnapshot},
    checkout::{CheckoutEngine, CheckoutError, CheckoutLine, CheckoutPolicy},
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        items::SetStockRequest,
        orders::{CheckoutLineRequest, CheckoutRequest},
    },
    entity::items::ActiveModel as ItemActive,
    error::AppError,
    models::{Customer, ItemId},
    routes::params::{ItemQuery, OrderListQuery, SortOrder},
    services::{item_service, order_service},
    state::AppState,
    store::{InventoryStore, PgStore},
};

fn customer() -> Customer {
    Customer {
        name: "Ravi Kulkarni".into(),
        phone: "9000012345".into(),
        address: "4 Temple Street, Dharwad".into(),
        payment_mode: "upi".into(),
    }
}

// Integration flow: checkout decrements stock, a short line aborts everything,
// and an admin stock override is visible to the next checkout.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn checkout_and_stock_override_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    // Seed items
    insert_item(&state, "flow-rice", "Sona Masoori Rice 5kg", 389, 420, 4).await?;
    insert_item(&state, "flow-tea", "Tea Powder 500g", 265, 290, 0).await?;
    state.catalog.refresh(&state.store).await?;

    let listed = item_service::list_items(
        &state,
        ItemQuery {
            page: None,
            per_page: None,
            q: Some("RICE".into()),
        },
    )?;
    assert_eq!(listed.data.unwrap().items.len(), 1);

    // Checkout
    let resp = order_service::checkout(
        &state,
        CheckoutRequest {
            customer: customer(),
            lines: vec![CheckoutLineRequest {
                item_id: ItemId::new("flow-rice"),
                quantity: 3,
            }],
        },
    )
    .await?;
    let order = resp.data.unwrap();
    assert_eq!(order.total, 3 * 389);
    assert_eq!(order.status, "pending");

    let rice = item_service::get_item(&state, ItemId::new("flow-rice"))?;
    assert_eq!(rice.data.unwrap().stock, 1);

    // A short line aborts the whole order
    let err = order_service::checkout(
        &state,
        CheckoutRequest {
            customer: customer(),
            lines: vec![
                CheckoutLineRequest {
                    item_id: ItemId::new("flow-rice"),
                    quantity: 1,
                },
                CheckoutLineRequest {
                    item_id: ItemId::new("flow-tea"),
                    quantity: 1,
                },
            ],
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        AppError::Checkout(CheckoutError::InsufficientStock { available: 0, .. })
    ));
    let records = state.store.read_stock(&[ItemId::new("flow-rice")]).await?;
    assert_eq!(records[0].as_ref().map(|record| record.item.stock), Some(1));

    // Admin restocks tea; the old version no longer commits
    let before = state.store.read_stock(&[ItemId::new("flow-tea")]).await?;
    let before_version = before[0].as_ref().map(|record| record.version);
    item_service::set_stock(&state, ItemId::new("flow-tea"), SetStockRequest { stock: 6 }).await?;
    let after = state.store.read_stock(&[ItemId::new("flow-tea")]).await?;
    assert_ne!(after[0].as_ref().map(|record| record.version), before_version);
    assert_eq!(state.catalog.get(&ItemId::new("flow-tea")).map(|item| item.stock), Some(6));

    let order = state
        .engine
        .checkout(&[CheckoutLine::new("flow-tea", 6)], &customer())
        .await?;
    assert_eq!(order.lines[0].unit_price, 265);

    // Ledger lists newest first
    let list = order_service::list_orders(
        &state,
        OrderListQuery {
            page: None,
            per_page: None,
            status: None,
            sort_order: None,
        },
    )
    .await?;
    let orders = list.data.unwrap().items;
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].id, order.id);
    assert!(orders[0].created_at >= orders[1].created_at);

    let fetched = order_service::get_order(&state, order.id).await?;
    assert_eq!(fetched.data.unwrap().lines, order.lines);

    let missing =
        item_service::set_stock(&state, ItemId::new("flow-ghee"), SetStockRequest { stock: 1 })
            .await;
    assert!(matches!(missing, Err(AppError::NotFound)));

    // Concurrent checkouts on disjoint items still get ledger-ordered timestamps
    let mut tasks = Vec::new();
    for n in 0..6 {
        let id = format!("flow-batch-{n}");
        insert_item(&state, &id, &format!("Batch Sugar {n}"), 48, 52, 1).await?;
        let engine = Arc::clone(&state.engine);
        tasks.push(tokio::spawn(async move {
            engine.checkout(&[CheckoutLine::new(id, 1)], &customer()).await
        }));
    }
    let mut batch = Vec::new();
    for task in tasks {
        batch.push(task.await??);
    }

    let ledger = order_service::list_orders(
        &state,
        OrderListQuery {
            page: None,
            per_page: None,
            status: None,
            sort_order: Some(SortOrder::Asc),
        },
    )
    .await?
    .data
    .unwrap()
    .items;
    assert_eq!(ledger.len(), 8);
    assert!(ledger.windows(2).all(|pair| pair[0].created_at <= pair[1].created_at));
    assert!(batch.iter().all(|order| ledger.iter().any(|o| o.id == order.id)));

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_lines, orders, items CASCADE",
    ))
    .await?;

    let pool = create_pool(database_url).await?;
    let store = PgStore::new(orm);
    let catalog = Arc::new(CatalogSnapshot::new(store.list_items().await?));
    let engine = Arc::new(CheckoutEngine::new(store.clone(), CheckoutPolicy::default()));

    Ok(AppState {
        pool,
        store,
        engine,
        catalog,
    })
}

async fn insert_item(
    state: &AppState,
    id: &str,
    name: &str,
    price: i64,
    mrp: i64,
    stock: i32,
) -> anyhow::Result<()> {
    ItemActive {
        id: Set(id.to_string()),
        name: Set(name.to_string()),
        mrp: Set(mrp),
        price: Set(price),
        stock: Set(stock),
        version: Set(0),
        created_at: NotSet,
    }
    .insert(state.store.connection())
    .await?;
    Ok(())
}
