//! Warehouse operations: receipts and deliveries.
//!
//! This crate contains the document lifecycle (status state machine and the
//! `StockDocument` aggregate), implemented purely as deterministic domain logic.
//! Applying the resulting ledger plan to products is the caller's job.

pub mod document;
pub mod moves;
pub mod reference;
pub mod status;

pub use document::{
    AddLine, ChangeStatus, CreateDocument, DeleteDocument, DocumentCommand, DocumentCreated,
    DocumentDeleted, DocumentEvent, DocumentId, DocumentLine, LineAdded, LineInput, LineRemoved,
    RemoveLine, StatusChanged, StockDocument,
};
pub use moves::{ADJUSTMENT_REFERENCE, StockMove};
pub use reference::DocumentNumber;
pub use status::{DocumentStatus, DocumentType, LedgerEffect, SameStatus, TransitionPlan, plan};
