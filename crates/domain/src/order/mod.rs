//! Order lifecycle and pricing.

mod pricing;
mod state;

pub use pricing::total_price;
pub use state::{ParseOutcomeError, PaymentOutcome, Transition, transition};
