use std::sync::Arc;

use super::{CheckoutEngine, CheckoutError, CheckoutLine};
use crate::{
    cart::{CartPersistence, CartStore},
    models::{Customer, Order},
    store::InventoryStore,
};

/// One shopper's cart wired to a shared checkout engine.
#[derive(Debug)]
pub struct CheckoutSession<S, P> {
    cart: CartStore<P>,
    engine: Arc<CheckoutEngine<S>>,
}

impl<S: InventoryStore, P: CartPersistence> CheckoutSession<S, P> {
    pub fn new(cart: CartStore<P>, engine: Arc<CheckoutEngine<S>>) -> Self {
        Self { cart, engine }
    }

    pub fn cart(&self) -> &CartStore<P> {
        &self.cart
    }

    /// Check the current cart out and clear it once the order exists.
    ///
    /// On error the cart is left exactly as it was. If the outcome is unknown
    /// to the caller (for example the request was abandoned), re-read the cart
    /// and stock before trying again instead of resubmitting blindly.
    pub async fn submit_checkout(&self, customer: &Customer) -> Result<Order, CheckoutError> {
        let lines: Vec<CheckoutLine> = self.cart.lines().iter().map(CheckoutLine::from).collect();
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let order = self.engine.checkout(&lines, customer).await?;

        // The order is committed; a local save failure must not turn that into an error.
        if let Err(err) = self.cart.clear() {
            tracing::warn!(order_id = %order.id, error = %err, "cart clear failed after checkout");
        }
        Ok(order)
    }
}
