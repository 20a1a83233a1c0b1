use std::sync::Arc;

use thiserror::Error;

use stockmaster_core::ExpectedVersion;
use stockmaster_operations::{DocumentId, DocumentType, StockDocument, StockMove};
use stockmaster_products::{Product, ProductId};

/// Repository operation error.
///
/// These are **storage errors** as opposed to domain errors. The service maps
/// the ones with a domain meaning (stale version, duplicate SKU, missing row)
/// onto `DomainError`; the rest surface as infrastructure failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// Optimistic concurrency check failed (version mismatch).
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("SKU '{0}' is already in use")]
    DuplicateSku(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    /// The backing store is unusable (poisoned lock, lost connection).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A value paired with the version it must still have in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub expected: ExpectedVersion,
}

impl<T> Versioned<T> {
    pub fn new(value: T, expected: ExpectedVersion) -> Self {
        Self { value, expected }
    }
}

/// Everything one status transition or stock adjustment writes.
///
/// Applied all-or-nothing: every version is checked before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub products: Vec<Versioned<Product>>,
    /// `None` for adjustments made directly on products.
    pub document: Option<Versioned<StockDocument>>,
    pub moves: Vec<StockMove>,
}

/// Storage for the stock service.
///
/// Implementations must:
/// - enforce SKU uniqueness on product insert and save
/// - check `ExpectedVersion` against the stored version on every save/delete
/// - assign document numbers per document type, starting at 1, never reused
/// - apply a [`Commit`] atomically
pub trait Repository: Send + Sync {
    fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// All products, ordered by SKU.
    fn products(&self) -> Result<Vec<Product>, RepositoryError>;

    fn insert_product(&self, product: Product) -> Result<(), RepositoryError>;

    fn save_product(
        &self,
        product: Product,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError>;

    fn delete_product(
        &self,
        id: ProductId,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError>;

    fn document(&self, id: DocumentId) -> Result<Option<StockDocument>, RepositoryError>;

    /// Documents ordered by type then number, optionally filtered by type.
    fn documents(
        &self,
        document_type: Option<DocumentType>,
    ) -> Result<Vec<StockDocument>, RepositoryError>;

    fn insert_document(&self, document: StockDocument) -> Result<(), RepositoryError>;

    fn save_document(
        &self,
        document: StockDocument,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError>;

    fn delete_document(
        &self,
        id: DocumentId,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError>;

    /// Reserve the next sequence number for a document type.
    fn next_document_number(&self, document_type: DocumentType) -> Result<u32, RepositoryError>;

    /// Persist products, document and stock moves of one transition atomically.
    fn commit(&self, commit: Commit) -> Result<(), RepositoryError>;

    /// Stock move history in commit order.
    fn stock_moves(&self) -> Result<Vec<StockMove>, RepositoryError>;
}

impl<R> Repository for Arc<R>
where
    R: Repository + ?Sized,
{
    fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        (**self).product(id)
    }

    fn products(&self) -> Result<Vec<Product>, RepositoryError> {
        (**self).products()
    }

    fn insert_product(&self, product: Product) -> Result<(), RepositoryError> {
        (**self).insert_product(product)
    }

    fn save_product(
        &self,
        product: Product,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError> {
        (**self).save_product(product, expected)
    }

    fn delete_product(
        &self,
        id: ProductId,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError> {
        (**self).delete_product(id, expected)
    }

    fn document(&self, id: DocumentId) -> Result<Option<StockDocument>, RepositoryError> {
        (**self).document(id)
    }

    fn documents(
        &self,
        document_type: Option<DocumentType>,
    ) -> Result<Vec<StockDocument>, RepositoryError> {
        (**self).documents(document_type)
    }

    fn insert_document(&self, document: StockDocument) -> Result<(), RepositoryError> {
        (**self).insert_document(document)
    }

    fn save_document(
        &self,
        document: StockDocument,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError> {
        (**self).save_document(document, expected)
    }

    fn delete_document(
        &self,
        id: DocumentId,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError> {
        (**self).delete_document(id, expected)
    }

    fn next_document_number(&self, document_type: DocumentType) -> Result<u32, RepositoryError> {
        (**self).next_document_number(document_type)
    }

    fn commit(&self, commit: Commit) -> Result<(), RepositoryError> {
        (**self).commit(commit)
    }

    fn stock_moves(&self) -> Result<Vec<StockMove>, RepositoryError> {
        (**self).stock_moves()
    }
}
