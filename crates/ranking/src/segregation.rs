//! Pre-processing: pinned products and out-of-stock demotion.

use catalog::{Product, ProductId};
use std::collections::HashSet;

/// Merchant-pinned product ids for one collection, in pin order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinnedSet {
    ids: Vec<ProductId>,
    lookup: HashSet<ProductId>,
}

impl PinnedSet {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ProductId>,
    {
        let mut set = Self::default();
        for id in ids {
            let id = id.into();
            if set.lookup.insert(id.clone()) {
                set.ids.push(id);
            }
        }
        set
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lookup.contains(id)
    }

    pub fn ids(&self) -> &[ProductId] {
        &self.ids
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Stock handling switches for one collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StockPolicy {
    /// Move out-of-stock non-pinned products to the end
    pub out_of_stock_down: bool,
    /// Move out-of-stock pinned products to the end
    pub pinned_out_of_stock_down: bool,
}

/// The four-way split of a collection's products.
///
/// Every input product lands in exactly one list; each list keeps the
/// relative input order.
#[derive(Debug, Clone, Default)]
pub struct Segregated {
    pub in_stock_pinned: Vec<Product>,
    pub working_set: Vec<Product>,
    pub out_of_stock_pinned: Vec<Product>,
    pub out_of_stock_non_pinned: Vec<Product>,
}

impl Segregated {
    pub fn total(&self) -> usize {
        self.in_stock_pinned.len()
            + self.working_set.len()
            + self.out_of_stock_pinned.len()
            + self.out_of_stock_non_pinned.len()
    }
}

/// Split products by pin status and stock.
///
/// When a stock flag is off the corresponding out-of-stock list stays
/// empty and those products stay with their in-stock peers.
pub fn segregate(products: Vec<Product>, pinned: &PinnedSet, policy: StockPolicy) -> Segregated {
    let mut segregated = Segregated::default();

    for product in products {
        let is_pinned = pinned.contains(&product.id);
        let in_stock = product.is_in_stock();
        match (is_pinned, in_stock) {
            (true, false) if policy.pinned_out_of_stock_down => {
                segregated.out_of_stock_pinned.push(product)
            }
            (true, _) => segregated.in_stock_pinned.push(product),
            (false, false) if policy.out_of_stock_down => {
                segregated.out_of_stock_non_pinned.push(product)
            }
            (false, _) => segregated.working_set.push(product),
        }
    }

    segregated
}
