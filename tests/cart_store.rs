mod common;

use std::{sync::Arc, thread};

use common::grocery;
use serde_json::json;
use shopp_storefront::{
    cart::{CartError, CartPersistence, CartStore, JsonFileCartPersistence, MemoryCartPersistence},
    catalog::CatalogSnapshot,
    models::ItemId,
};

fn snapshot(rice: u32, atta: u32, sugar: u32) -> Arc<CatalogSnapshot> {
    Arc::new(CatalogSnapshot::new(grocery(rice, atta, sugar)))
}

fn open_empty(catalog: Arc<CatalogSnapshot>) -> anyhow::Result<CartStore<Arc<MemoryCartPersistence>>> {
    let (cart, _) = CartStore::open(Arc::new(MemoryCartPersistence::new()), catalog)?;
    Ok(cart)
}

#[test]
fn quantity_is_clamped_to_stock_and_zero() -> anyhow::Result<()> {
    let cart = open_empty(snapshot(3, 2, 10))?;
    let rice = ItemId::new("rice-5kg");

    assert_eq!(cart.set_quantity(&rice, 2)?, Some(2));
    assert_eq!(cart.set_quantity(&rice, 5)?, Some(3));
    assert_eq!(cart.quantity(&rice), 3);

    assert_eq!(cart.set_quantity(&rice, -10)?, Some(0));
    assert_eq!(cart.quantity(&rice), 0);
    assert!(cart.is_empty());
    Ok(())
}

#[test]
fn reaching_zero_removes_the_line() -> anyhow::Result<()> {
    let persistence = Arc::new(MemoryCartPersistence::new());
    let (cart, _) = CartStore::open(Arc::clone(&persistence), snapshot(3, 2, 10))?;
    let sugar = ItemId::new("sugar-1kg");

    cart.set_quantity(&sugar, 1)?;
    cart.set_quantity(&sugar, -1)?;

    assert!(cart.lines().is_empty());
    let saved = persistence.saved().expect("saved");
    assert!(!saved.contains_key("sugar-1kg"));
    Ok(())
}

#[test]
fn unknown_items_are_ignored() -> anyhow::Result<()> {
    let persistence = Arc::new(MemoryCartPersistence::new());
    let (cart, _) = CartStore::open(Arc::clone(&persistence), snapshot(3, 2, 10))?;
    let before = persistence.saved();

    assert_eq!(cart.set_quantity(&ItemId::new("ghee-1l"), 1)?, None);

    assert!(cart.is_empty());
    assert_eq!(persistence.saved(), before);
    Ok(())
}

#[test]
fn totals_follow_the_lines() -> anyhow::Result<()> {
    let cart = open_empty(snapshot(3, 2, 10))?;

    cart.set_quantity(&ItemId::new("rice-5kg"), 2)?;
    cart.set_quantity(&ItemId::new("sugar-1kg"), 3)?;

    assert_eq!(cart.total_quantity(), 5);
    assert_eq!(cart.total_amount(), 2 * 389 + 3 * 48);
    assert_eq!(cart.lines().len(), 2);
    Ok(())
}

#[test]
fn reopening_restores_the_same_cart() -> anyhow::Result<()> {
    let persistence = Arc::new(MemoryCartPersistence::new());
    let catalog = snapshot(3, 2, 10);
    {
        let (cart, _) = CartStore::open(Arc::clone(&persistence), Arc::clone(&catalog))?;
        cart.set_quantity(&ItemId::new("atta-10kg"), 2)?;
    }

    let (cart, report) = CartStore::open(Arc::clone(&persistence), catalog)?;

    assert!(report.resolved.is_empty());
    assert_eq!(cart.quantity(&ItemId::new("atta-10kg")), 2);
    let saved = persistence.saved().expect("saved");
    assert_eq!(
        saved.get("atta-10kg"),
        Some(&json!({"quantity": 2, "name": "Chakki Atta 10kg", "price": 449, "mrp": 480}))
    );
    Ok(())
}

#[test]
fn clear_keeps_unresolved_entries() -> anyhow::Result<()> {
    let raw = json!({"1": 1, "42": 2}).as_object().cloned().expect("object");
    let persistence = Arc::new(MemoryCartPersistence::with_raw(raw));
    let (cart, _) = CartStore::open(Arc::clone(&persistence), snapshot(3, 2, 10))?;
    assert_eq!(cart.quantity(&ItemId::new("atta-10kg")), 1);

    cart.clear()?;

    assert!(cart.is_empty());
    assert_eq!(cart.unresolved().len(), 1);
    let saved = persistence.saved().expect("saved");
    assert_eq!(saved.len(), 1);
    assert!(saved.contains_key("unresolved:42"));

    assert!(cart.discard_unresolved("42")?);
    assert!(!cart.discard_unresolved("42")?);
    assert!(persistence.saved().expect("saved").is_empty());
    Ok(())
}

#[test]
fn concurrent_increments_are_not_lost() -> anyhow::Result<()> {
    let cart = Arc::new(open_empty(snapshot(0, 0, 1_000))?);
    let sugar = ItemId::new("sugar-1kg");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cart = Arc::clone(&cart);
            let sugar = sugar.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    cart.set_quantity(&sugar, 1).expect("save");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread");
    }

    assert_eq!(cart.quantity(&sugar), 200);
    Ok(())
}

#[test]
fn file_persistence_survives_reopen() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("carts").join("cart.json");
    let catalog = snapshot(3, 2, 10);

    assert!(JsonFileCartPersistence::new(&path).load()?.is_none());

    {
        let (cart, _) = CartStore::open(JsonFileCartPersistence::new(&path), Arc::clone(&catalog))?;
        cart.set_quantity(&ItemId::new("rice-5kg"), 1)?;
    }

    let (cart, _) = CartStore::open(JsonFileCartPersistence::new(&path), catalog)?;
    assert_eq!(cart.quantity(&ItemId::new("rice-5kg")), 1);
    assert!(!path.with_extension("json.tmp").exists());
    Ok(())
}

#[test]
fn garbage_file_is_reported() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("cart.json");
    std::fs::write(&path, "[1, 2]")?;

    let result = CartStore::open(JsonFileCartPersistence::new(&path), snapshot(1, 1, 1));

    assert!(result.is_err());
    Ok(())
}

#[test]
fn mixed_legacy_cart_opens_without_stuck_lines() -> anyhow::Result<()> {
    let raw = json!({
        "1": 2,
        "sugar-1kg": {"quantity": 1, "name": "Sugar 1kg", "price": 48, "mrp": 52},
    })
    .as_object()
    .cloned()
    .expect("object");
    let persistence = Arc::new(MemoryCartPersistence::with_raw(raw));

    let (cart, report) = CartStore::open(Arc::clone(&persistence), snapshot(3, 2, 10))?;

    assert_eq!(report.resolved.len(), 1);
    assert_eq!(cart.quantity(&ItemId::new("atta-10kg")), 2);
    assert_eq!(cart.quantity(&ItemId::new("sugar-1kg")), 1);
    assert!(cart.lines().iter().all(|line| line.item_id().as_str() != "1"));
    assert!(!persistence.saved().expect("saved").contains_key("1"));
    Ok(())
}

#[test]
fn lines_the_catalog_dropped_can_still_be_removed() -> anyhow::Result<()> {
    let catalog = Arc::new(CatalogSnapshot::default());
    let raw = json!({"ghee-1l": {"quantity": 1, "name": "Ghee 1L", "price": 610, "mrp": 650}})
        .as_object()
        .cloned()
        .expect("object");
    let persistence = Arc::new(MemoryCartPersistence::with_raw(raw));
    let (cart, _) = CartStore::open(Arc::clone(&persistence), Arc::clone(&catalog))?;
    catalog.replace(grocery(3, 2, 10));
    let ghee = ItemId::new("ghee-1l");

    assert_eq!(cart.set_quantity(&ghee, -1)?, None);
    assert_eq!(cart.quantity(&ghee), 1);

    assert!(cart.remove_line(&ghee)?);
    assert!(!cart.remove_line(&ghee)?);
    assert!(cart.is_empty());
    assert!(persistence.saved().expect("saved").is_empty());
    Ok(())
}

#[test]
fn catalog_item_with_bad_price_is_an_error_not_a_removal() -> anyhow::Result<()> {
    let catalog = snapshot(3, 2, 10);
    let cart = open_empty(Arc::clone(&catalog))?;
    let rice = ItemId::new("rice-5kg");
    cart.set_quantity(&rice, 1)?;

    let mut items = grocery(3, 2, 10);
    items[0].price = -5;
    catalog.replace(items);

    let result = cart.set_quantity(&rice, 1);

    assert!(matches!(result, Err(CartError::Line(_))));
    assert_eq!(cart.quantity(&rice), 1);
    Ok(())
}

#[test]
fn huge_prices_saturate_the_total() -> anyhow::Result<()> {
    let raw = json!({"rice-5kg": {"quantity": 2, "name": "Rice", "price": i64::MAX, "mrp": 420}})
        .as_object()
        .cloned()
        .expect("object");
    let (cart, _) = CartStore::open(
        Arc::new(MemoryCartPersistence::with_raw(raw)),
        snapshot(3, 2, 10),
    )?;

    assert_eq!(cart.total_amount(), i64::MAX);
    Ok(())
}
