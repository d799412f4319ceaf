//! Upgrades persisted carts written by older storefront versions.
//!
//! Three layouts have existed:
//!
//! * `V1`: `{"3": 2}`, small integer keys with a bare quantity.
//! * `V2`: `{"3": {"quantity": 2, "name": "Rice", "price": 50, "mrp": 60}}`.
//! * `V3`: the same values keyed by stable item id. Current.
//!
//! Each transition is one function: [`upgrade_v1`] lifts bare quantities into
//! lines, [`upgrade_v2`] resolves integer keys to item ids against the catalog,
//! and [`reconcile_v3`] only backfills metadata and parks lines the catalog no
//! longer carries, so running [`migrate`] on its own output changes nothing.
//!
//! Keys are classified one by one: integer keys found next to stable ids are
//! still resolved like any other legacy entry.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::{
    line::{CartLine, CartLineError},
    persist::{RawCart, StoredLine},
};
use crate::{
    catalog::CatalogView,
    models::{Item, ItemId},
};

/// Key prefix of the bucket holding legacy entries nobody could place.
pub const UNRESOLVED_PREFIX: &str = "unresolved:";

const MAX_LEGACY_KEY_DIGITS: usize = 9;
const FUZZY_NAME_THRESHOLD: f64 = 0.85;
const FUZZY_PRICE_TOLERANCE_PERCENT: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchemaVersion {
    V1,
    V2,
    V3,
}

/// A pre-V3 key: the raw text plus the integer it spells.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LegacyKey {
    pub index: usize,
    pub raw: String,
}

impl LegacyKey {
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty()
            || raw.len() > MAX_LEGACY_KEY_DIGITS
            || !raw.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        let index = raw.parse().ok()?;
        Some(Self {
            index,
            raw: raw.to_string(),
        })
    }
}

/// A loaded cart tagged with the layout it was written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistedCart {
    V1(Vec<(LegacyKey, u32)>),
    V2(Vec<(LegacyKey, StoredLine)>),
    V3 {
        lines: Vec<(ItemId, StoredLine)>,
        unresolved: Vec<(String, StoredLine)>,
        /// Integer keys left behind next to stable ids by a partial upgrade.
        legacy: Vec<(LegacyKey, StoredLine)>,
    },
}

impl PersistedCart {
    /// Classify `raw` key by key. An integer key is legacy unless the catalog
    /// actually knows it as an id; the cart is V3 as soon as any other key is present.
    pub fn detect(raw: &RawCart, catalog: &CatalogView) -> Self {
        let mut unresolved = Vec::new();
        let mut lines = Vec::new();
        let mut legacy: Vec<(LegacyKey, &Value)> = Vec::new();

        for (key, value) in raw {
            if let Some(legacy_key) = key.strip_prefix(UNRESOLVED_PREFIX) {
                unresolved.push((legacy_key.to_string(), parse_stored(value)));
                continue;
            }
            match LegacyKey::parse(key).filter(|_| !catalog.contains_key(key)) {
                Some(legacy_key) => legacy.push((legacy_key, value)),
                None => lines.push((ItemId::new(key.clone()), parse_stored(value))),
            }
        }
        legacy.sort_by(|a, b| a.0.cmp(&b.0));

        if !lines.is_empty() || !unresolved.is_empty() || legacy.is_empty() {
            return PersistedCart::V3 {
                lines,
                unresolved,
                legacy: legacy
                    .into_iter()
                    .map(|(key, value)| (key, parse_stored(value)))
                    .collect(),
            };
        }

        if legacy.iter().all(|(_, value)| !value.is_object()) {
            PersistedCart::V1(
                legacy
                    .into_iter()
                    .map(|(key, value)| (key, parse_count(value).unwrap_or(0)))
                    .collect(),
            )
        } else {
            PersistedCart::V2(
                legacy
                    .into_iter()
                    .map(|(key, value)| (key, parse_stored(value)))
                    .collect(),
            )
        }
    }

    pub fn version(&self) -> SchemaVersion {
        match self {
            PersistedCart::V1(_) => SchemaVersion::V1,
            PersistedCart::V2(_) => SchemaVersion::V2,
            PersistedCart::V3 { .. } => SchemaVersion::V3,
        }
    }
}

/// A cart in the current layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentCart {
    pub lines: BTreeMap<ItemId, CartLine>,
    pub unresolved: BTreeMap<String, StoredLine>,
}

impl CurrentCart {
    pub fn to_raw(&self) -> RawCart {
        let mut raw = Map::new();
        for (id, line) in &self.lines {
            let stored = StoredLine {
                quantity: line.quantity(),
                name: Some(line.name().to_string()),
                price: Some(line.unit_price()),
                mrp: Some(line.unit_mrp()),
            };
            raw.insert(id.to_string(), stored_to_value(&stored));
        }
        for (key, stored) in &self.unresolved {
            raw.insert(format!("{UNRESOLVED_PREFIX}{key}"), stored_to_value(stored));
        }
        raw
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchStrategy {
    /// Stored name, price and MRP all equal a catalog item.
    Exact,
    /// The legacy integer used as an index into the catalog order.
    Positional,
    /// Similar name at a similar price.
    Fuzzy,
}

impl MatchStrategy {
    /// Positional and fuzzy matches are guesses the UI should let the user confirm.
    pub fn is_advisory(self) -> bool {
        !matches!(self, MatchStrategy::Exact)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub legacy_key: String,
    pub item_id: ItemId,
    pub strategy: MatchStrategy,
}

/// A migrated quantity cut down to the stock available at migration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuantityClamp {
    pub item_id: ItemId,
    pub requested: u32,
    pub kept: u32,
}

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[error("legacy cart entry {0} matches no catalog item")]
pub struct MigrationUnresolved(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub source: SchemaVersion,
    pub resolved: Vec<Resolution>,
    pub unresolved: Vec<MigrationUnresolved>,
    pub clamped: Vec<QuantityClamp>,
}

impl MigrationReport {
    fn new(source: SchemaVersion) -> Self {
        Self {
            source,
            resolved: Vec::new(),
            unresolved: Vec::new(),
            clamped: Vec::new(),
        }
    }

    pub fn advisory(&self) -> impl Iterator<Item = &Resolution> {
        self.resolved
            .iter()
            .filter(|resolution| resolution.strategy.is_advisory())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub cart: CurrentCart,
    pub report: MigrationReport,
}

/// Bring `raw` to the current layout using `catalog` to place legacy entries.
pub fn migrate(raw: &RawCart, catalog: &CatalogView) -> Migration {
    match PersistedCart::detect(raw, catalog) {
        PersistedCart::V1(entries) => {
            let mut migration = upgrade_v2(upgrade_v1(entries), catalog);
            migration.report.source = SchemaVersion::V1;
            migration
        }
        PersistedCart::V2(entries) => upgrade_v2(entries, catalog),
        PersistedCart::V3 {
            lines,
            unresolved,
            legacy,
        } => {
            let mut migration = reconcile_v3(lines, unresolved, catalog);
            if !legacy.is_empty() {
                absorb(&mut migration, upgrade_v2(legacy, catalog), catalog);
            }
            migration
        }
    }
}

/// V1 -> V2: a bare quantity becomes a line without metadata.
pub fn upgrade_v1(entries: Vec<(LegacyKey, u32)>) -> Vec<(LegacyKey, StoredLine)> {
    entries
        .into_iter()
        .map(|(key, quantity)| {
            (
                key,
                StoredLine {
                    quantity,
                    ..StoredLine::default()
                },
            )
        })
        .collect()
}

/// V2 -> V3: place every non-empty legacy entry on a catalog item.
pub fn upgrade_v2(entries: Vec<(LegacyKey, StoredLine)>, catalog: &CatalogView) -> Migration {
    let mut report = MigrationReport::new(SchemaVersion::V2);
    let mut cart = CurrentCart::default();
    let mut wanted: BTreeMap<ItemId, u32> = BTreeMap::new();

    for (key, stored) in entries {
        if stored.quantity == 0 {
            continue;
        }
        match resolve(&key, &stored, catalog) {
            Some((item, strategy)) => {
                let quantity = wanted.entry(item.id.clone()).or_default();
                *quantity = quantity.saturating_add(stored.quantity);
                report.resolved.push(Resolution {
                    legacy_key: key.raw,
                    item_id: item.id.clone(),
                    strategy,
                });
            }
            None => {
                tracing::warn!(legacy_key = %key.raw, "legacy cart entry left unresolved");
                report.unresolved.push(MigrationUnresolved(key.raw.clone()));
                cart.unresolved.insert(key.raw, stored);
            }
        }
    }

    for (item_id, requested) in wanted {
        let Some(item) = catalog.get(&item_id) else {
            continue;
        };
        let kept = requested.min(item.stock);
        if kept < requested {
            report.clamped.push(QuantityClamp {
                item_id: item_id.clone(),
                requested,
                kept,
            });
        }
        if let Ok(line) = CartLine::for_item(item, kept) {
            cart.lines.insert(item_id, line);
        }
    }

    Migration { cart, report }
}

/// V3: keep every line the catalog can still sell, filling only missing metadata.
///
/// Lines for ids a loaded catalog no longer knows are parked as unresolved,
/// since nothing could ever check them out or adjust them.
pub fn reconcile_v3(
    lines: Vec<(ItemId, StoredLine)>,
    unresolved: Vec<(String, StoredLine)>,
    catalog: &CatalogView,
) -> Migration {
    let mut report = MigrationReport::new(SchemaVersion::V3);
    let mut cart = CurrentCart {
        lines: BTreeMap::new(),
        unresolved: unresolved.into_iter().collect(),
    };

    for (item_id, stored) in lines {
        if stored.quantity == 0 {
            continue;
        }
        let item = catalog.get(&item_id);
        if item.is_none() && !catalog.is_empty() {
            tracing::warn!(item_id = %item_id, "cart line for unknown item parked as unresolved");
            report.unresolved.push(MigrationUnresolved(item_id.to_string()));
            cart.unresolved.insert(item_id.to_string(), stored);
            continue;
        }
        let name = stored
            .name
            .clone()
            .or_else(|| item.map(|item| item.name.clone()))
            .unwrap_or_default();
        let price = stored.price.or(item.map(|item| item.price)).unwrap_or(0);
        let mrp = stored.mrp.or(item.map(|item| item.mrp)).unwrap_or(0);

        match CartLine::new(item_id.clone(), stored.quantity, name, price, mrp) {
            Ok(line) => {
                cart.lines.insert(item_id, line);
            }
            Err(err) => {
                tracing::warn!(error = %err, "cart line parked as unresolved");
                report.unresolved.push(MigrationUnresolved(item_id.to_string()));
                cart.unresolved.insert(item_id.to_string(), stored);
            }
        }
    }

    Migration { cart, report }
}

/// Fold the upgrade of stray legacy keys into an already reconciled cart.
fn absorb(base: &mut Migration, legacy: Migration, catalog: &CatalogView) {
    let Migration { cart, report } = legacy;
    base.report.resolved.extend(report.resolved);
    base.report.unresolved.extend(report.unresolved);
    base.report.clamped.extend(report.clamped);
    base.cart.unresolved.extend(cart.unresolved);

    for (item_id, line) in cart.lines {
        let Some(existing) = base.cart.lines.get(&item_id) else {
            base.cart.lines.insert(item_id, line);
            continue;
        };
        let Some(item) = catalog.get(&item_id) else {
            continue;
        };
        let requested = existing.quantity().saturating_add(line.quantity());
        let kept = requested.min(item.stock);
        if kept < requested {
            base.report.clamped.push(QuantityClamp {
                item_id: item_id.clone(),
                requested,
                kept,
            });
        }
        match CartLine::for_item(item, kept) {
            Ok(merged) => {
                base.cart.lines.insert(item_id, merged);
            }
            Err(CartLineError::ZeroQuantity(_)) => {
                base.cart.lines.remove(&item_id);
            }
            Err(err) => tracing::warn!(error = %err, "legacy entry not merged"),
        }
    }
}

fn resolve<'a>(
    key: &LegacyKey,
    stored: &StoredLine,
    catalog: &'a CatalogView,
) -> Option<(&'a Item, MatchStrategy)> {
    if let Some(item) = exact_match(stored, catalog) {
        return Some((item, MatchStrategy::Exact));
    }
    if let Some(item) = catalog.at(key.index) {
        return Some((item, MatchStrategy::Positional));
    }
    fuzzy_match(stored, catalog).map(|item| (item, MatchStrategy::Fuzzy))
}

fn exact_match<'a>(stored: &StoredLine, catalog: &'a CatalogView) -> Option<&'a Item> {
    let name = normalize_name(stored.name.as_deref()?);
    let (price, mrp) = (stored.price?, stored.mrp?);
    catalog
        .items()
        .iter()
        .find(|item| item.price == price && item.mrp == mrp && normalize_name(&item.name) == name)
}

fn fuzzy_match<'a>(stored: &StoredLine, catalog: &'a CatalogView) -> Option<&'a Item> {
    let name = normalize_name(stored.name.as_deref()?);
    let price = stored.price?;

    let mut best: Option<(&Item, f64)> = None;
    for item in catalog.items() {
        if !price_close(price, item.price) {
            continue;
        }
        let score = strsim::jaro_winkler(&name, &normalize_name(&item.name));
        if score >= FUZZY_NAME_THRESHOLD && best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((item, score));
        }
    }
    best.map(|(item, _)| item)
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn price_close(stored: i64, current: i64) -> bool {
    // Stored prices come from the client; widen so no product can overflow.
    let (stored, current) = (i128::from(stored), i128::from(current));
    let base = stored.abs().max(current.abs());
    let tolerance = (base * i128::from(FUZZY_PRICE_TOLERANCE_PERCENT) / 100).max(1);
    (stored - current).abs() <= tolerance
}

fn parse_stored(value: &Value) -> StoredLine {
    let Value::Object(fields) = value else {
        return StoredLine {
            quantity: parse_count(value).unwrap_or(0),
            ..StoredLine::default()
        };
    };
    StoredLine {
        quantity: fields
            .get("quantity")
            .or_else(|| fields.get("qty"))
            .and_then(parse_count)
            .unwrap_or(0),
        name: fields
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string),
        price: fields.get("price").and_then(parse_amount),
        mrp: fields.get("mrp").and_then(parse_amount),
    }
}

/// Quantities were written as numbers, floats or strings over the years.
fn parse_count(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() || number < 0.0 {
        return Some(0);
    }
    Some(number.trunc().min(f64::from(u32::MAX)) as u32)
}

fn parse_amount(value: &Value) -> Option<i64> {
    let amount = match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|f| f.round() as i64))?,
        Value::String(text) => text.trim().parse::<f64>().ok()?.round() as i64,
        _ => return None,
    };
    (amount >= 0).then_some(amount)
}

fn stored_to_value(stored: &StoredLine) -> Value {
    let mut fields = Map::new();
    fields.insert("quantity".into(), Value::from(stored.quantity));
    if let Some(name) = &stored.name {
        fields.insert("name".into(), Value::from(name.clone()));
    }
    if let Some(price) = stored.price {
        fields.insert("price".into(), Value::from(price));
    }
    if let Some(mrp) = stored.mrp {
        fields.insert("mrp".into(), Value::from(mrp));
    }
    Value::Object(fields)
}
