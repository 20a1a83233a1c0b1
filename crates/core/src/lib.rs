//! `stockmaster-core`: ids, errors and aggregate traits shared by every domain crate.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod event;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use event::Event;
pub use id::{AggregateId, CorrelationId};
pub use value_object::ValueObject;
