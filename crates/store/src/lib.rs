//! Relational store for the order-processing backend.
//!
//! The [`Store`] trait is the storage handle threaded through every
//! operation; [`Transaction`] is the unit-of-work the inventory ledger,
//! checkout and settlement run inside. Two implementations are provided:
//! [`PostgresStore`] for production and [`InMemoryStore`] for tests and
//! single-process runs.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use common::{LineId, Money, OrderId, OrderStatus, ProductId, UserId};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use record::{CartItem, CartLine, OrderLine, OrderRecord, Product, StockLevel};
pub use store::{Store, Transaction};
