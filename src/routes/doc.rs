use utoipa::{OpenApi, openapi::OpenApi as OpenApiSpec};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        items::{ItemList, SetStockRequest},
        orders::{CheckoutLineRequest, CheckoutRequest, OrderList},
    },
    models::{Customer, Item, ItemId, Order, OrderLine},
    response::{ApiResponse, Meta},
    routes::{admin, health, items, orders, params},
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        items::list_items,
        items::get_item,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        admin::set_stock
    ),
    components(
        schemas(
            ItemId,
            Item,
            Customer,
            Order,
            OrderLine,
            ItemList,
            SetStockRequest,
            CheckoutLineRequest,
            CheckoutRequest,
            OrderList,
            params::Pagination,
            params::ItemQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Item>,
            ApiResponse<ItemList>,
            ApiResponse<Order>,
            ApiResponse<OrderList>
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Items", description = "Catalog endpoints"),
        (name = "Orders", description = "Checkout and order ledger endpoints"),
        (name = "Admin", description = "Inventory administration"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
