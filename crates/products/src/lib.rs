//! Product catalog and quantity ledger.
//!
//! This crate contains the business rules for product stock, implemented purely
//! as deterministic domain logic (no IO, no storage).

pub mod ledger;
pub mod product;

pub use ledger::{LedgerError, LedgerOp, MoveDirection, StockLevels};
pub use product::{
    NewProduct, Product, ProductDetails, ProductId, ProductView, StockStatus,
};
