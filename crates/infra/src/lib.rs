//! Infrastructure layer: storage, locking, configuration and the stock service.

pub mod config;
pub mod dashboard;
pub mod locks;
pub mod repository;
pub mod service;


pub use config::{ConfigError, StockConfig};
pub use dashboard::Dashboard;
pub use locks::{LockGuard, LockKey, ProductLockTable};
pub use repository::{Commit, InMemoryRepository, Repository, RepositoryError, Versioned};
pub use service::{NewDocument, ServiceError, ServiceResult, StockService};
