//! Inventory-safe order creation.
//!
//! A checkout reads every referenced item with its version, validates all
//! lines, then asks the store for one conditional commit. When another writer
//! moved any of those versions in between, the commit is refused and the whole
//! read-validate-write sequence starts over, up to [`CheckoutPolicy::max_attempts`].

use std::time::Duration;

use crate::{
    models::{Customer, ItemId, Order, OrderLine},
    store::{CommitOutcome, CommitRequest, InventoryStore, NewOrder, StockDecrement, StockRecord},
};

mod error;
mod phase;
pub mod session;

pub use error::CheckoutError;
pub use phase::CheckoutPhase;
pub use session::CheckoutSession;

use phase::PhaseTracker;

/// One requested line. Prices are never taken from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    pub item_id: ItemId,
    pub quantity: u32,
}

impl CheckoutLine {
    pub fn new(item_id: impl Into<ItemId>, quantity: u32) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for CheckoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(25),
        }
    }
}

impl CheckoutPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(attempt)
    }
}

#[derive(Debug)]
pub struct CheckoutEngine<S> {
    store: S,
    policy: CheckoutPolicy,
}

impl<S: InventoryStore> CheckoutEngine<S> {
    pub fn new(store: S, policy: CheckoutPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> CheckoutPolicy {
        self.policy
    }

    /// Turn `lines` into an order, decrementing stock for every line.
    ///
    /// Either the returned order exists and all decrements happened, or the
    /// error says why and the store is unchanged. Never touches any cart.
    pub async fn checkout(
        &self,
        lines: &[CheckoutLine],
        customer: &Customer,
    ) -> Result<Order, CheckoutError> {
        let lines = merge_lines(lines);
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let ids: Vec<ItemId> = lines.iter().map(|line| line.item_id.clone()).collect();
        let max_attempts = self.policy.max_attempts.max(1);

        let mut tracker = PhaseTracker::new();
        loop {
            tracker.enter(CheckoutPhase::Reading);
            let records = match self.store.read_stock(&ids).await {
                Ok(records) => records,
                Err(err) => {
                    tracker.enter(CheckoutPhase::Aborted);
                    return Err(err.into());
                }
            };
            let records = match require_all(&lines, records) {
                Ok(records) => records,
                Err(err) => {
                    tracker.enter(CheckoutPhase::Aborted);
                    return Err(err);
                }
            };

            tracker.enter(CheckoutPhase::Validating);
            if let Err(err) = validate(&lines, &records) {
                tracker.enter(CheckoutPhase::Aborted);
                tracing::info!(error = %err, "checkout rejected");
                return Err(err);
            }

            tracker.enter(CheckoutPhase::Writing);
            let request = build_commit(&lines, &records, customer);
            match self.store.commit(request).await {
                Ok(CommitOutcome::Committed(order)) => {
                    tracker.enter(CheckoutPhase::Committed);
                    tracing::info!(
                        order_id = %order.id,
                        total = order.total,
                        attempts = tracker.attempt(),
                        "checkout committed"
                    );
                    return Ok(order);
                }
                Ok(CommitOutcome::Conflict { item_id }) => {
                    tracker.enter(CheckoutPhase::ConflictRetry);
                    let attempt = tracker.attempt();
                    tracing::warn!(item_id = %item_id, attempt, "checkout conflict");
                    if attempt >= max_attempts {
                        tracker.enter(CheckoutPhase::Aborted);
                        return Err(CheckoutError::TransientConflict { attempts: attempt });
                    }
                    let delay = self.policy.delay_for_attempt(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => {
                    tracker.enter(CheckoutPhase::Aborted);
                    return Err(err.into());
                }
            }
        }
    }
}

/// Drop empty lines and fold repeated ids into the first occurrence.
fn merge_lines(lines: &[CheckoutLine]) -> Vec<CheckoutLine> {
    let mut merged: Vec<CheckoutLine> = Vec::with_capacity(lines.len());
    for line in lines.iter().filter(|line| line.quantity > 0) {
        match merged.iter_mut().find(|seen| seen.item_id == line.item_id) {
            Some(seen) => seen.quantity = seen.quantity.saturating_add(line.quantity),
            None => merged.push(line.clone()),
        }
    }
    merged
}

fn require_all(
    lines: &[CheckoutLine],
    records: Vec<Option<StockRecord>>,
) -> Result<Vec<StockRecord>, CheckoutError> {
    lines
        .iter()
        .zip(records)
        .map(|(line, record)| record.ok_or_else(|| CheckoutError::ItemNotFound(line.item_id.clone())))
        .collect()
}

fn validate(lines: &[CheckoutLine], records: &[StockRecord]) -> Result<(), CheckoutError> {
    for (line, record) in lines.iter().zip(records) {
        if line.quantity > record.item.stock {
            return Err(CheckoutError::InsufficientStock {
                item_id: line.item_id.clone(),
                available: record.item.stock,
            });
        }
    }
    Ok(())
}

fn build_commit(lines: &[CheckoutLine], records: &[StockRecord], customer: &Customer) -> CommitRequest {
    let order_lines: Vec<OrderLine> = lines
        .iter()
        .zip(records)
        .map(|(line, record)| OrderLine {
            item_id: line.item_id.clone(),
            name: record.item.name.clone(),
            quantity: line.quantity,
            unit_price: record.item.price,
        })
        .collect();
    let total = order_lines
        .iter()
        .map(OrderLine::amount)
        .fold(0i64, i64::saturating_add);

    let mut decrements: Vec<StockDecrement> = lines
        .iter()
        .zip(records)
        .map(|(line, record)| StockDecrement {
            item_id: line.item_id.clone(),
            expected_version: record.version,
            quantity: line.quantity,
        })
        .collect();
    decrements.sort_by(|a, b| a.item_id.cmp(&b.item_id));

    CommitRequest {
        decrements,
        order: NewOrder {
            customer: customer.clone(),
            lines: order_lines,
            total,
        },
    }
}
