#![allow(dead_code)]

use shopp_storefront::models::{Customer, Item, ItemId};

pub fn item(id: &str, name: &str, price: i64, mrp: i64, stock: u32) -> Item {
    Item {
        id: ItemId::new(id),
        name: name.to_string(),
        mrp,
        price,
        stock,
    }
}

pub fn customer() -> Customer {
    Customer {
        name: "Asha Rao".into(),
        phone: "9876543210".into(),
        address: "12 Market Road, Hubli".into(),
        payment_mode: "cash".into(),
    }
}

/// Rice, atta and sugar with the given stocks.
pub fn grocery(rice: u32, atta: u32, sugar: u32) -> Vec<Item> {
    vec![
        item("rice-5kg", "Sona Masoori Rice 5kg", 389, 420, rice),
        item("atta-10kg", "Chakki Atta 10kg", 449, 480, atta),
        item("sugar-1kg", "Sugar 1kg", 48, 52, sugar),
    ]
}
