//! Shared types for the order-processing backend.
//!
//! Everything here is plain data: identifiers, money and the persisted
//! order status. Behaviour lives in the `domain` and `workflow` crates.

pub mod money;
pub mod status;
pub mod types;

pub use money::Money;
pub use status::{OrderStatus, ParseStatusError};
pub use types::{LineId, OrderId, ProductId, UserId};
