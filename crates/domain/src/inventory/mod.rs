//! Inventory ledger: reservation, deduction and release of stock.
//!
//! Reservation is separate from deduction so stock is soft-held while an
//! order waits for payment. A successful payment deducts the held units; a
//! failed one releases them.

mod ledger;

pub use ledger::InventoryLedger;
