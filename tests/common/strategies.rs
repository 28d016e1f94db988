use super::{product, Product};
use proptest::prelude::*;

/// One single-key mutation against a store
#[derive(Debug, Clone)]
pub enum StoreOp {
    Set(u32, Product),
    Delete(u32),
}

/// Strategy for category names drawn from a small pool so groups collide
pub fn category_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["X", "Y", "Z", "W"]).prop_map(str::to_string)
}

/// Strategy for products with keys in a narrow range so operations overlap
pub fn keyed_product_strategy() -> impl Strategy<Value = (u32, Product)> {
    (0u32..16, category_strategy(), 0u32..1_000).prop_map(|(id, category, price)| {
        let mut item = product(id, &category);
        item.price = price;
        (id, item)
    })
}

/// Strategy for a mixed sequence of sets and deletes
pub fn store_ops_strategy() -> impl Strategy<Value = Vec<StoreOp>> {
    prop::collection::vec(
        prop_oneof![
            3 => keyed_product_strategy().prop_map(|(id, item)| StoreOp::Set(id, item)),
            1 => (0u32..16).prop_map(StoreOp::Delete),
        ],
        0..64,
    )
}

/// Strategy for an initial snapshot
pub fn snapshot_strategy() -> impl Strategy<Value = Vec<(u32, Product)>> {
    prop::collection::vec(keyed_product_strategy(), 0..24)
}
