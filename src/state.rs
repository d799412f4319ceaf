use std::sync::Arc;

use crate::{
    catalog::CatalogSnapshot,
    checkout::CheckoutEngine,
    db::DbPool,
    store::PgStore,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub store: PgStore,
    pub engine: Arc<CheckoutEngine<PgStore>>,
    pub catalog: Arc<CatalogSnapshot>,
}
