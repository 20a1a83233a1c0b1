//! Dashboard figures computed from the current products and documents.

use serde::Serialize;

use stockmaster_operations::{DocumentType, StockDocument};
use stockmaster_products::{Product, StockStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub total_products: usize,
    /// Low-stock and out-of-stock products.
    pub low_stock_items: usize,
    pub out_of_stock_items: usize,
    pub pending_receipts: usize,
    pub pending_deliveries: usize,
    pub total_on_hand: u64,
    pub total_reserved: u64,
}

impl Dashboard {
    pub fn compute(products: &[Product], documents: &[StockDocument]) -> Self {
        let mut dashboard = Dashboard {
            total_products: products.len(),
            ..Dashboard::default()
        };

        for product in products {
            let status = product.status();
            if status.needs_reorder() {
                dashboard.low_stock_items += 1;
            }
            if status == StockStatus::OutOfStock {
                dashboard.out_of_stock_items += 1;
            }
            dashboard.total_on_hand = dashboard.total_on_hand.saturating_add(product.on_hand());
            dashboard.total_reserved = dashboard.total_reserved.saturating_add(product.reserved());
        }

        for document in documents.iter().filter(|d| !d.status().is_terminal()) {
            match document.document_type() {
                Some(DocumentType::Receipt) => dashboard.pending_receipts += 1,
                Some(DocumentType::Delivery) => dashboard.pending_deliveries += 1,
                None => {}
            }
        }

        dashboard
    }
}
