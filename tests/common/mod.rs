#![allow(dead_code)]

pub mod sources;
pub mod strategies;

pub use sources::*;

use items_cache::{CacheStore, GroupedIndex};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Product {
    pub id: u32,
    pub name: String,
    pub category: String,
    pub price: u32,
}

pub fn product(id: u32, category: &str) -> Product {
    Product {
        id,
        name: format!("Product {id}"),
        category: category.to_string(),
        price: id * 100,
    }
}

pub type ProductStore = CacheStore<u32, Product>;
pub type CategoryIndex = GroupedIndex<u32, Product, String>;

/// Store with a by-category index already registered
pub fn indexed_store(label: &str) -> (Arc<ProductStore>, Arc<CategoryIndex>) {
    let store: Arc<ProductStore> = Arc::new(CacheStore::new(label));
    let index: Arc<CategoryIndex> = Arc::new(GroupedIndex::new("by_category", |p: &Product| {
        p.category.clone()
    }));
    store.register_observer(index.clone());
    (store, index)
}

/// Sorted ids of the items in a group
pub fn ids(items: &[Product]) -> Vec<u32> {
    let mut ids: Vec<u32> = items.iter().map(|p| p.id).collect();
    ids.sort_unstable();
    ids
}
