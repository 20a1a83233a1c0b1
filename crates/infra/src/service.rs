//! Stock service: application-level orchestration.
//!
//! Every document status change runs this pipeline:
//!
//! ```text
//! set_status(document, target)
//!   ↓
//! 1. Lock the document and every product on its lines (all at once)
//!   ↓
//! 2. Decide: StockDocument::handle(ChangeStatus) validates and plans ledger effects
//!   ↓
//! 3. Dry-run every effect on working copies of the products
//!   ↓
//! 4. Commit products, document and stock moves in one repository call
//! ```
//!
//! A failure at any step leaves products and document exactly as they were.
//! The repository is injected; the service holds no global state.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use stockmaster_core::{
    Aggregate, AggregateId, AggregateRoot, CorrelationId, DomainError, ExpectedVersion,
};
use stockmaster_operations::{
    AddLine, ChangeStatus, CreateDocument, DeleteDocument, DocumentCommand, DocumentEvent,
    DocumentId, DocumentNumber, DocumentStatus, DocumentType, LineInput, RemoveLine, SameStatus,
    StockDocument, StockMove, TransitionPlan,
};
use stockmaster_products::{
    LedgerOp, NewProduct, Product, ProductDetails, ProductId, ProductView,
};

use crate::config::StockConfig;
use crate::dashboard::Dashboard;
use crate::locks::{LockGuard, LockKey, ProductLockTable};
use crate::repository::{Commit, Repository, RepositoryError, Versioned};

/// Lock attempts for a transition whose product set changed while waiting.
const MAX_LOCK_ATTEMPTS: usize = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("repository failure: {0}")]
    Repository(RepositoryError),
}

impl ServiceError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Domain(e) => e.is_retryable(),
            ServiceError::Repository(_) => false,
        }
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Concurrency(msg) => {
                ServiceError::Domain(DomainError::contention(msg))
            }
            RepositoryError::DuplicateSku(sku) => ServiceError::Domain(DomainError::conflict(
                format!("SKU '{sku}' is already in use"),
            )),
            RepositoryError::NotFound(_) => ServiceError::Domain(DomainError::not_found()),
            other => {
                error!(error = %other, "repository failure");
                ServiceError::Repository(other)
            }
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Request to open a receipt or delivery in draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub document_type: DocumentType,
    /// Supplier for receipts, customer for deliveries.
    pub counterparty: String,
    #[serde(default)]
    pub contact: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub schedule_date: Option<NaiveDate>,
    #[serde(default)]
    pub lines: Vec<LineInput>,
}

/// Coordinates products, documents and the lock table over a repository.
#[derive(Debug)]
pub struct StockService<R> {
    repository: R,
    locks: ProductLockTable,
    config: StockConfig,
}

impl<R> StockService<R> {
    pub fn new(repository: R, config: StockConfig) -> Self {
        Self {
            repository,
            locks: ProductLockTable::new(),
            config,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn config(&self) -> &StockConfig {
        &self.config
    }

    pub fn lock_table(&self) -> &ProductLockTable {
        &self.locks
    }
}

impl<R: Repository> StockService<R> {
    // ---- catalog ----

    pub fn create_product(&self, new: NewProduct) -> ServiceResult<ProductView> {
        let product = Product::create(ProductId::new(AggregateId::new()), new)?;
        let view = ProductView::from(&product);
        self.repository.insert_product(product)?;
        info!(product = %view.id, sku = %view.sku, on_hand = view.on_hand, "product created");
        Ok(view)
    }

    pub fn update_product(
        &self,
        id: ProductId,
        details: ProductDetails,
    ) -> ServiceResult<ProductView> {
        let _guard = self.lock(&[LockKey::Product(id)])?;
        let mut product = self.load_product(id)?;
        let expected = ExpectedVersion::Exact(product.version());

        product.update_details(details)?;
        let view = ProductView::from(&product);
        self.repository.save_product(product, expected)?;
        info!(product = %id, sku = %view.sku, "product updated");
        Ok(view)
    }

    /// Receive stock directly on a product, outside any document.
    ///
    /// Records an adjustment move under the product's lock.
    pub fn receive_stock(&self, id: ProductId, quantity: u64) -> ServiceResult<ProductView> {
        let _guard = self.lock(&[LockKey::Product(id)])?;
        let mut product = self.load_product(id)?;
        let expected = ExpectedVersion::Exact(product.version());

        product.apply_ledger(LedgerOp::Receive, quantity)?;
        let view = ProductView::from(&product);
        let adjustment = StockMove::adjustment(CorrelationId::new(), id, quantity, Utc::now());
        self.repository.commit(Commit {
            products: vec![Versioned::new(product, expected)],
            document: None,
            moves: vec![adjustment],
        })?;
        info!(product = %id, quantity, on_hand = view.on_hand, "stock received");
        Ok(view)
    }

    /// Delete a product no open document refers to.
    pub fn delete_product(&self, id: ProductId) -> ServiceResult<()> {
        let _guard = self.lock(&[LockKey::Product(id)])?;
        let product = self.load_product(id)?;

        let in_use = self
            .repository
            .documents(None)?
            .into_iter()
            .find(|d| !d.status().is_terminal() && d.references(id));
        if let Some(document) = in_use {
            return Err(DomainError::conflict(format!(
                "product {} is still on open document {}",
                product.sku(),
                code(&document)
            ))
            .into());
        }

        self.repository
            .delete_product(id, ExpectedVersion::Exact(product.version()))?;
        info!(product = %id, sku = %product.sku(), "product deleted");
        Ok(())
    }

    pub fn product(&self, id: ProductId) -> ServiceResult<ProductView> {
        Ok(ProductView::from(&self.load_product(id)?))
    }

    /// Products ordered by SKU, with free-to-use and stock status filled in.
    pub fn list_products(&self) -> ServiceResult<Vec<ProductView>> {
        Ok(self
            .repository
            .products()?
            .iter()
            .map(ProductView::from)
            .collect())
    }

    // ---- documents ----

    pub fn create_document(&self, new: NewDocument) -> ServiceResult<StockDocument> {
        let product_keys: Vec<LockKey> = new
            .lines
            .iter()
            .map(|l| LockKey::Product(l.product_id))
            .collect();
        let _guard = self.lock(&product_keys)?;
        for line in &new.lines {
            self.ensure_product_exists(line.product_id)?;
        }

        let id = DocumentId::new(AggregateId::new());
        let mut command = CreateDocument {
            document_id: id,
            number: DocumentNumber::new(new.document_type, 0),
            counterparty: new.counterparty,
            contact: new.contact,
            date: new.date,
            schedule_date: new.schedule_date,
            lines: new.lines,
            occurred_at: Utc::now(),
        };

        // Decide once before taking a number so rejected requests leave no gap.
        let mut document = StockDocument::empty(id);
        document.handle(&DocumentCommand::CreateDocument(command.clone()))?;

        let sequence = self.repository.next_document_number(new.document_type)?;
        command.number = DocumentNumber::new(new.document_type, sequence);
        document.execute(&DocumentCommand::CreateDocument(command))?;

        self.repository.insert_document(document.clone())?;
        info!(
            document = %code(&document),
            reference = %reference(&document),
            lines = document.lines().len(),
            "document created"
        );
        Ok(document)
    }

    pub fn add_line(&self, id: DocumentId, line: LineInput) -> ServiceResult<StockDocument> {
        let _guard = self.lock(&[LockKey::Document(id), LockKey::Product(line.product_id)])?;
        self.ensure_product_exists(line.product_id)?;

        let mut document = self.load_document(id)?;
        let expected = ExpectedVersion::Exact(document.version());
        document.execute(&DocumentCommand::AddLine(AddLine {
            document_id: id,
            line,
            occurred_at: Utc::now(),
        }))?;

        self.repository.save_document(document.clone(), expected)?;
        debug!(
            document = %code(&document),
            product = %line.product_id,
            quantity = line.quantity,
            "line added"
        );
        Ok(document)
    }

    pub fn remove_line(&self, id: DocumentId, line_no: u32) -> ServiceResult<StockDocument> {
        let _guard = self.lock(&[LockKey::Document(id)])?;

        let mut document = self.load_document(id)?;
        let expected = ExpectedVersion::Exact(document.version());
        document.execute(&DocumentCommand::RemoveLine(RemoveLine {
            document_id: id,
            line_no,
            occurred_at: Utc::now(),
        }))?;

        self.repository.save_document(document.clone(), expected)?;
        debug!(document = %code(&document), line_no, "line removed");
        Ok(document)
    }

    pub fn document(&self, id: DocumentId) -> ServiceResult<StockDocument> {
        self.load_document(id)
    }

    pub fn list_documents(
        &self,
        document_type: Option<DocumentType>,
    ) -> ServiceResult<Vec<StockDocument>> {
        Ok(self.repository.documents(document_type)?)
    }

    /// Move a document to `target`; requesting the current status is an error.
    pub fn set_status(
        &self,
        id: DocumentId,
        target: DocumentStatus,
    ) -> ServiceResult<StockDocument> {
        self.transition(id, target, SameStatus::Reject)
    }

    /// Move to `ready`. Deliveries reserve every line.
    pub fn validate(&self, id: DocumentId) -> ServiceResult<StockDocument> {
        self.transition(id, DocumentStatus::Ready, SameStatus::Accept)
    }

    /// Move to `done`, booking the physical stock movement.
    pub fn process(&self, id: DocumentId) -> ServiceResult<StockDocument> {
        self.transition(id, DocumentStatus::Done, SameStatus::Accept)
    }

    pub fn cancel(&self, id: DocumentId) -> ServiceResult<StockDocument> {
        self.transition(id, DocumentStatus::Canceled, SameStatus::Reject)
    }

    /// Delete a draft document.
    pub fn delete_document(&self, id: DocumentId) -> ServiceResult<()> {
        let _guard = self.lock(&[LockKey::Document(id)])?;

        let mut document = self.load_document(id)?;
        let expected = ExpectedVersion::Exact(document.version());
        document.execute(&DocumentCommand::DeleteDocument(DeleteDocument {
            document_id: id,
            occurred_at: Utc::now(),
        }))?;

        self.repository.delete_document(id, expected)?;
        info!(document = %code(&document), "document deleted");
        Ok(())
    }

    // ---- reporting ----

    pub fn dashboard(&self) -> ServiceResult<Dashboard> {
        let products = self.repository.products()?;
        let documents = self.repository.documents(None)?;
        Ok(Dashboard::compute(&products, &documents))
    }

    /// Stock moves in commit order, optionally for one product.
    pub fn move_history(&self, product: Option<ProductId>) -> ServiceResult<Vec<StockMove>> {
        let moves = self.repository.stock_moves()?;
        Ok(match product {
            Some(id) => moves.into_iter().filter(|m| m.product_id == id).collect(),
            None => moves,
        })
    }

    // ---- internals ----

    fn transition(
        &self,
        id: DocumentId,
        target: DocumentStatus,
        same_status: SameStatus,
    ) -> ServiceResult<StockDocument> {
        let mut product_ids = self.load_document(id)?.product_ids();

        for _ in 0..MAX_LOCK_ATTEMPTS {
            let mut keys = vec![LockKey::Document(id)];
            keys.extend(product_ids.iter().copied().map(LockKey::Product));
            let guard = self.lock(&keys)?;

            // Lines only change under the document key, so this read is stable.
            let document = self.load_document(id)?;
            let current = document.product_ids();
            if current
                .iter()
                .all(|p| guard.covers(&LockKey::Product(*p)))
            {
                return self.transition_locked(document, target, same_status, &guard);
            }

            drop(guard);
            product_ids = current;
        }

        warn!(document = %id, to = %target, "document lines kept changing while locking");
        Err(DomainError::contention(format!("document {id} changed while acquiring locks")).into())
    }

    fn transition_locked(
        &self,
        mut document: StockDocument,
        target: DocumentStatus,
        same_status: SameStatus,
        _guard: &LockGuard<'_>,
    ) -> ServiceResult<StockDocument> {
        let code = code(&document);
        let from = document.status();
        let expected_document = ExpectedVersion::Exact(document.version());
        let occurred_at = Utc::now();

        let events = document
            .handle(&DocumentCommand::ChangeStatus(ChangeStatus {
                document_id: document.id_typed(),
                target,
                same_status,
                occurred_at,
            }))
            .inspect_err(|e| {
                warn!(
                    document = %code,
                    from = %from,
                    to = %target,
                    error = %e,
                    "document transition rejected"
                );
            })?;

        let Some(plan) = events.iter().find_map(|event| match event {
            DocumentEvent::StatusChanged(e) => Some(e.plan.clone()),
            _ => None,
        }) else {
            debug!(document = %code, status = %from, "status unchanged");
            return Ok(document);
        };

        let products = self
            .dry_run(&code, &plan)
            .inspect_err(|e| {
                warn!(
                    document = %code,
                    from = %from,
                    to = %target,
                    error = %e,
                    "document transition rejected"
                );
            })?;

        for event in &events {
            document.apply(event);
        }

        let number = document
            .number()
            .ok_or_else(|| DomainError::invariant(format!("document {code} has no number")))?;
        let moves = StockMove::from_plan(
            CorrelationId::new(),
            document.id_typed(),
            number,
            &plan,
            occurred_at,
        );
        let moved = moves.len();

        self.repository
            .commit(Commit {
                products,
                document: Some(Versioned::new(document.clone(), expected_document)),
                moves,
            })
            .map_err(|e| {
                if matches!(e, RepositoryError::Concurrency(_)) {
                    warn!(document = %code, error = %e, "version conflict on commit");
                }
                ServiceError::from(e)
            })?;

        info!(
            document = %code,
            from = %plan.from,
            to = %plan.to,
            effects = plan.effects.len(),
            moves = moved,
            "document transition applied"
        );
        Ok(document)
    }

    /// Apply every effect to working copies, cumulatively per product.
    fn dry_run(&self, code: &str, plan: &TransitionPlan) -> ServiceResult<Vec<Versioned<Product>>> {
        let mut working: BTreeMap<ProductId, Versioned<Product>> = BTreeMap::new();
        for product_id in plan.product_ids() {
            let product = self.repository.product(product_id)?.ok_or_else(|| {
                DomainError::invariant(format!(
                    "document {code} refers to missing product {product_id}"
                ))
            })?;
            let expected = ExpectedVersion::Exact(product.version());
            working.insert(product_id, Versioned::new(product, expected));
        }

        for effect in &plan.effects {
            let entry = working.get_mut(&effect.product_id).ok_or_else(|| {
                DomainError::invariant(format!("product {} was not loaded", effect.product_id))
            })?;
            entry.value.apply_ledger(effect.op, effect.quantity)?;
        }

        Ok(working.into_values().collect())
    }

    fn lock(&self, keys: &[LockKey]) -> ServiceResult<LockGuard<'_>> {
        self.locks
            .acquire(keys, self.config.lock_timeout)
            .inspect_err(|e| warn!(keys = keys.len(), error = %e, "lock contention"))
            .map_err(ServiceError::from)
    }

    fn load_product(&self, id: ProductId) -> ServiceResult<Product> {
        self.repository
            .product(id)?
            .ok_or_else(|| DomainError::not_found().into())
    }

    fn ensure_product_exists(&self, id: ProductId) -> ServiceResult<()> {
        match self.repository.product(id)? {
            Some(_) => Ok(()),
            None => Err(DomainError::validation(format!("unknown product {id}")).into()),
        }
    }

    fn load_document(&self, id: DocumentId) -> ServiceResult<StockDocument> {
        self.repository
            .document(id)?
            .ok_or_else(|| DomainError::not_found().into())
    }
}

fn code(document: &StockDocument) -> String {
    match document.number() {
        Some(number) => number.code(),
        None => document.id_typed().to_string(),
    }
}

fn reference(document: &StockDocument) -> String {
    document
        .number()
        .map(|n| n.reference())
        .unwrap_or_default()
}
