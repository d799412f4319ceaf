mod common;

use std::{sync::Arc, time::Duration};

use common::{customer, grocery};
use shopp_storefront::{
    cart::{CartStore, MemoryCartPersistence},
    catalog::CatalogSnapshot,
    checkout::{CheckoutEngine, CheckoutError, CheckoutPolicy, CheckoutSession},
    models::ItemId,
    store::MemoryStore,
};

type Session = CheckoutSession<MemoryStore, Arc<MemoryCartPersistence>>;

async fn session(
    rice: u32,
    sugar: u32,
) -> anyhow::Result<(Session, Arc<MemoryCartPersistence>, Arc<CatalogSnapshot>)> {
    let store = MemoryStore::with_items(grocery(rice, 5, sugar));
    let catalog = Arc::new(CatalogSnapshot::default());
    catalog.refresh(&store).await?;

    let persistence = Arc::new(MemoryCartPersistence::new());
    let (cart, _) = CartStore::open(Arc::clone(&persistence), Arc::clone(&catalog))?;
    let engine = Arc::new(CheckoutEngine::new(
        store,
        CheckoutPolicy {
            max_attempts: 3,
            base_backoff: Duration::ZERO,
        },
    ));
    Ok((CheckoutSession::new(cart, engine), persistence, catalog))
}

#[tokio::test]
async fn successful_checkout_empties_the_cart() -> anyhow::Result<()> {
    let (session, persistence, _) = session(4, 10).await?;
    session.cart().set_quantity(&ItemId::new("rice-5kg"), 2)?;
    session.cart().set_quantity(&ItemId::new("sugar-1kg"), 1)?;
    let expected_total = session.cart().total_amount();

    let order = session.submit_checkout(&customer()).await?;

    assert_eq!(order.total, expected_total);
    assert_eq!(order.lines.len(), 2);
    assert!(session.cart().lines().is_empty());
    assert_eq!(session.cart().total_quantity(), 0);
    assert!(persistence.saved().expect("saved").is_empty());
    Ok(())
}

#[tokio::test]
async fn failed_checkout_leaves_the_cart_alone() -> anyhow::Result<()> {
    let (session, persistence, catalog) = session(4, 10).await?;
    let rice = ItemId::new("rice-5kg");
    session.cart().set_quantity(&rice, 4)?;
    let saved_before = persistence.saved();

    // Someone else bought rice after it went into this cart.
    let mut items = catalog.view().items().to_vec();
    items[0].stock = 1;
    catalog.replace(items.clone());
    let engine_store = MemoryStore::with_items(items);
    let engine = Arc::new(CheckoutEngine::new(engine_store, CheckoutPolicy::default()));
    let (cart, _) = CartStore::open(Arc::clone(&persistence), Arc::clone(&catalog))?;
    let session = CheckoutSession::new(cart, engine);

    let err = session.submit_checkout(&customer()).await.unwrap_err();

    assert!(matches!(err, CheckoutError::InsufficientStock { available: 1, .. }));
    assert_eq!(session.cart().quantity(&rice), 4);
    assert_eq!(persistence.saved(), saved_before);
    Ok(())
}

#[tokio::test]
async fn empty_cart_is_refused() -> anyhow::Result<()> {
    let (session, _, _) = session(4, 10).await?;

    let err = session.submit_checkout(&customer()).await.unwrap_err();

    assert!(matches!(err, CheckoutError::EmptyCart));
    Ok(())
}
