use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use stockmaster_core::{AggregateRoot, ExpectedVersion};
use stockmaster_operations::{DocumentId, DocumentType, StockDocument, StockMove};
use stockmaster_products::{Product, ProductId};

use super::r#trait::{Commit, Repository, RepositoryError};

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    documents: HashMap<DocumentId, StockDocument>,
    sequences: HashMap<DocumentType, u32>,
    moves: Vec<StockMove>,
}

impl State {
    fn sku_taken(&self, sku: &str, except: ProductId) -> bool {
        self.products
            .values()
            .any(|p| p.id_typed() != except && p.sku() == sku)
    }

    fn check_product(
        &self,
        product: &Product,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError> {
        let id = product.id_typed();
        let stored = self
            .products
            .get(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("product {id}")))?;
        check_version("product", id, expected, stored.version())?;
        if self.sku_taken(product.sku(), id) {
            return Err(RepositoryError::DuplicateSku(product.sku().to_string()));
        }
        Ok(())
    }

    fn check_document(
        &self,
        document: &StockDocument,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError> {
        let id = document.id_typed();
        let stored = self
            .documents
            .get(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("document {id}")))?;
        check_version("document", id, expected, stored.version())
    }
}

fn check_version(
    kind: &str,
    id: impl core::fmt::Display,
    expected: ExpectedVersion,
    actual: u64,
) -> Result<(), RepositoryError> {
    expected
        .check(actual)
        .map_err(|e| RepositoryError::Concurrency(format!("{kind} {id}: {e}")))
}

/// In-memory repository.
///
/// Intended for tests/dev. One lock guards all tables so a [`Commit`] is
/// observed either entirely or not at all.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: RwLock<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, RepositoryError> {
        self.state
            .read()
            .map_err(|_| RepositoryError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, RepositoryError> {
        self.state
            .write()
            .map_err(|_| RepositoryError::Unavailable("lock poisoned".to_string()))
    }
}

impl Repository for InMemoryRepository {
    fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    fn products(&self) -> Result<Vec<Product>, RepositoryError> {
        let mut products: Vec<Product> = self.read()?.products.values().cloned().collect();
        products.sort_by(|a, b| a.sku().cmp(b.sku()));
        Ok(products)
    }

    fn insert_product(&self, product: Product) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        let id = product.id_typed();
        if state.products.contains_key(&id) {
            return Err(RepositoryError::AlreadyExists(format!("product {id}")));
        }
        if state.sku_taken(product.sku(), id) {
            return Err(RepositoryError::DuplicateSku(product.sku().to_string()));
        }
        state.products.insert(id, product);
        Ok(())
    }

    fn save_product(
        &self,
        product: Product,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        state.check_product(&product, expected)?;
        state.products.insert(product.id_typed(), product);
        Ok(())
    }

    fn delete_product(
        &self,
        id: ProductId,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        let stored = state
            .products
            .get(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("product {id}")))?;
        check_version("product", id, expected, stored.version())?;
        state.products.remove(&id);
        Ok(())
    }

    fn document(&self, id: DocumentId) -> Result<Option<StockDocument>, RepositoryError> {
        Ok(self.read()?.documents.get(&id).cloned())
    }

    fn documents(
        &self,
        document_type: Option<DocumentType>,
    ) -> Result<Vec<StockDocument>, RepositoryError> {
        let mut documents: Vec<StockDocument> = self
            .read()?
            .documents
            .values()
            .filter(|d| document_type.is_none() || d.document_type() == document_type)
            .cloned()
            .collect();
        documents.sort_by_key(|d| d.number());
        Ok(documents)
    }

    fn insert_document(&self, document: StockDocument) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        let id = document.id_typed();
        if state.documents.contains_key(&id) {
            return Err(RepositoryError::AlreadyExists(format!("document {id}")));
        }
        state.documents.insert(id, document);
        Ok(())
    }

    fn save_document(
        &self,
        document: StockDocument,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        state.check_document(&document, expected)?;
        state.documents.insert(document.id_typed(), document);
        Ok(())
    }

    fn delete_document(
        &self,
        id: DocumentId,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        let stored = state
            .documents
            .get(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("document {id}")))?;
        check_version("document", id, expected, stored.version())?;
        state.documents.remove(&id);
        Ok(())
    }

    fn next_document_number(&self, document_type: DocumentType) -> Result<u32, RepositoryError> {
        let mut state = self.write()?;
        let sequence = state.sequences.entry(document_type).or_insert(0);
        *sequence += 1;
        Ok(*sequence)
    }

    fn commit(&self, commit: Commit) -> Result<(), RepositoryError> {
        let mut state = self.write()?;

        // Validate everything before the first write.
        for product in &commit.products {
            state.check_product(&product.value, product.expected)?;
        }
        if let Some(document) = &commit.document {
            state.check_document(&document.value, document.expected)?;
        }

        for product in commit.products {
            state.products.insert(product.value.id_typed(), product.value);
        }
        if let Some(document) = commit.document {
            let document = document.value;
            state.documents.insert(document.id_typed(), document);
        }
        state.moves.extend(commit.moves);
        Ok(())
    }

    fn stock_moves(&self) -> Result<Vec<StockMove>, RepositoryError> {
        Ok(self.read()?.moves.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Versioned;
    use chrono::Utc;
    use stockmaster_core::{AggregateId, CorrelationId};
    use stockmaster_products::NewProduct;

    fn test_product(sku: &str) -> Product {
        Product::create(
            ProductId::new(AggregateId::new()),
            NewProduct {
                sku: sku.to_string(),
                name: format!("Product {sku}"),
                category: "Furniture".to_string(),
                unit_of_measure: "Units".to_string(),
                reorder_level: 5,
                initial_stock: 20,
            },
        )
        .unwrap()
    }

    #[test]
    fn duplicate_skus_are_rejected_on_insert_and_save() {
        let repo = InMemoryRepository::new();
        let desk = test_product("DESK-001");
        let chair = test_product("CHAIR-001");
        repo.insert_product(desk.clone()).unwrap();
        repo.insert_product(chair.clone()).unwrap();

        let err = repo.insert_product(test_product("DESK-001")).unwrap_err();
        assert_eq!(err, RepositoryError::DuplicateSku("DESK-001".to_string()));

        let mut renamed = chair.clone();
        renamed
            .update_details(stockmaster_products::ProductDetails {
                sku: Some("DESK-001".to_string()),
                ..Default::default()
            })
            .unwrap();
        let err = repo
            .save_product(renamed, ExpectedVersion::Exact(chair.version()))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateSku(_)));
    }

    #[test]
    fn stale_product_save_is_a_concurrency_error() {
        let repo = InMemoryRepository::new();
        let product = test_product("DESK-001");
        let stale_version = product.version();
        let product_id = product.id_typed();
        repo.insert_product(product.clone()).unwrap();

        let mut first = product.clone();
        first.reserve(1).unwrap();
        repo.save_product(first, ExpectedVersion::Exact(stale_version)).unwrap();

        let mut second = product;
        second.reserve(2).unwrap();
        let err = repo
            .save_product(second, ExpectedVersion::Exact(stale_version))
            .unwrap_err();
        let RepositoryError::Concurrency(msg) = err else {
            panic!("expected a concurrency error, got {err:?}");
        };
        assert!(msg.contains(&format!("expected: {stale_version}")));
        assert_eq!(repo.product(product_id).unwrap().unwrap().reserved(), 1);
    }

    #[test]
    fn products_are_listed_by_sku() {
        let repo = InMemoryRepository::new();
        for sku in ["TABLE-001", "CHAIR-001", "DESK-001"] {
            repo.insert_product(test_product(sku)).unwrap();
        }
        let skus: Vec<String> = repo
            .products()
            .unwrap()
            .iter()
            .map(|p| p.sku().to_string())
            .collect();
        assert_eq!(skus, vec!["CHAIR-001", "DESK-001", "TABLE-001"]);
    }

    #[test]
    fn document_numbers_are_sequential_per_type() {
        let repo = InMemoryRepository::new();
        assert_eq!(repo.next_document_number(DocumentType::Receipt).unwrap(), 1);
        assert_eq!(repo.next_document_number(DocumentType::Receipt).unwrap(), 2);
        assert_eq!(repo.next_document_number(DocumentType::Delivery).unwrap(), 1);
    }

    #[test]
    fn failed_commit_writes_nothing() {
        let repo = InMemoryRepository::new();
        let product = test_product("DESK-001");
        repo.insert_product(product.clone()).unwrap();

        let mut updated = product.clone();
        updated.reserve(5).unwrap();

        // The document was never inserted, so the commit must fail as a whole.
        let document = StockDocument::empty(DocumentId::new(AggregateId::new()));
        let err = repo
            .commit(Commit {
                products: vec![Versioned::new(updated, ExpectedVersion::Exact(product.version()))],
                document: Some(Versioned::new(document, ExpectedVersion::Exact(0))),
                moves: vec![],
            })
            .unwrap_err();

        assert!(matches!(err, RepositoryError::NotFound(_)));
        assert_eq!(repo.product(product.id_typed()).unwrap(), Some(product));
    }

    #[test]
    fn commit_without_document_updates_products_and_moves() {
        let repo = InMemoryRepository::new();
        let product = test_product("DESK-001");
        repo.insert_product(product.clone()).unwrap();

        let mut received = product.clone();
        received.receive(5).unwrap();
        let adjustment =
            StockMove::adjustment(CorrelationId::new(), product.id_typed(), 5, Utc::now());
        repo.commit(Commit {
            products: vec![Versioned::new(received, ExpectedVersion::Exact(product.version()))],
            document: None,
            moves: vec![adjustment.clone()],
        })
        .unwrap();

        let stored = repo.product(product.id_typed()).unwrap().unwrap();
        assert_eq!(stored.on_hand(), 25);
        assert_eq!(repo.stock_moves().unwrap(), vec![adjustment]);
        assert!(repo.documents(None).unwrap().is_empty());
    }
}
