//! Order placement and payment settlement.
//!
//! This crate provides the services the transport layer calls into:
//! - [`CartService`] to fill a user's cart
//! - [`CheckoutOrchestrator`] to turn a cart into a pending order in one
//!   transaction, reserving stock for every line
//! - [`SettlementProcessor`] to apply a payment outcome to a pending order
//!   exactly once and announce the new status on the bus
//! - [`OrderQueries`] to read orders back
//!
//! Every service takes its storage handle explicitly; none of them touches
//! stock counters except through the inventory ledger.

pub mod cart;
pub mod checkout;
pub mod error;
pub mod orders;
pub mod settlement;

pub use cart::{Cart, CartService};
pub use checkout::{CheckoutOrchestrator, PlacedOrder};
pub use error::{CartError, CheckoutError, SettlementError};
pub use orders::{OrderDetails, OrderQueries};
pub use settlement::{Settlement, SettlementProcessor};
