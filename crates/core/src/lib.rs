//! `stockbook-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use aggregate::AggregateRoot;
pub use error::{DomainError, DomainResult};
pub use id::{CategoryId, EntryId, ProductId, UserId};
pub use money::{Money, MoneyParseError};
pub use value_object::ValueObject;
