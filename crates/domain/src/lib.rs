//! Domain layer for the order-processing backend.
//!
//! This crate provides:
//! - the order state machine (`pending → completed | canceled`) and the
//!   payment outcomes that drive it
//! - order pricing from price snapshots
//! - the inventory ledger, the only code allowed to mutate stock counters

pub mod error;
pub mod inventory;
pub mod order;

pub use error::{InventoryError, PricingError};
pub use inventory::InventoryLedger;
pub use order::{ParseOutcomeError, PaymentOutcome, Transition, total_price, transition};
