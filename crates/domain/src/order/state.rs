//! Order state machine.

use common::OrderStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The external payment result that settles a pending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    /// Payment captured: deduct the reserved stock and complete the order.
    Success,

    /// Payment failed: release the reservation and cancel the order.
    Failure,
}

impl PaymentOutcome {
    /// Returns the status a pending order moves to for this outcome.
    pub fn target_status(&self) -> OrderStatus {
        match self {
            PaymentOutcome::Success => OrderStatus::Completed,
            PaymentOutcome::Failure => OrderStatus::Canceled,
        }
    }

    /// Returns the outcome name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOutcome::Success => "success",
            PaymentOutcome::Failure => "failure",
        }
    }
}

impl std::fmt::Display for PaymentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a payment status string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown payment outcome: {0}")]
pub struct ParseOutcomeError(pub String);

impl std::str::FromStr for PaymentOutcome {
    type Err = ParseOutcomeError;

    /// Accepts the gateway vocabulary: `success`, and `failed` or `failure`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(PaymentOutcome::Success),
            "failed" | "failure" => Ok(PaymentOutcome::Failure),
            other => Err(ParseOutcomeError(other.to_string())),
        }
    }
}

/// What settling an order in its current status amounts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The order is pending and moves to `to`.
    Apply { from: OrderStatus, to: OrderStatus },

    /// The order is already terminal; settling again is a no-op.
    AlreadySettled(OrderStatus),
}

/// Resolves the transition for a payment outcome.
///
/// | from | outcome | to |
/// |---|---|---|
/// | pending | success | completed |
/// | pending | failure | canceled |
///
/// Every other combination is [`Transition::AlreadySettled`], which guards
/// against duplicate delivery of the payment signal.
pub fn transition(current: OrderStatus, outcome: PaymentOutcome) -> Transition {
    match current {
        OrderStatus::Pending => Transition::Apply {
            from: current,
            to: outcome.target_status(),
        },
        OrderStatus::Completed | OrderStatus::Canceled => Transition::AlreadySettled(current),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_success_completes() {
        assert_eq!(
            transition(OrderStatus::Pending, PaymentOutcome::Success),
            Transition::Apply {
                from: OrderStatus::Pending,
                to: OrderStatus::Completed
            }
        );
    }

    #[test]
    fn pending_failure_cancels() {
        assert_eq!(
            transition(OrderStatus::Pending, PaymentOutcome::Failure),
            Transition::Apply {
                from: OrderStatus::Pending,
                to: OrderStatus::Canceled
            }
        );
    }

    #[test]
    fn terminal_states_never_transition() {
        for status in [OrderStatus::Completed, OrderStatus::Canceled] {
            for outcome in [PaymentOutcome::Success, PaymentOutcome::Failure] {
                assert_eq!(
                    transition(status, outcome),
                    Transition::AlreadySettled(status)
                );
            }
        }
    }

    #[test]
    fn parses_gateway_vocabulary() {
        assert_eq!("success".parse::<PaymentOutcome>(), Ok(PaymentOutcome::Success));
        assert_eq!("failed".parse::<PaymentOutcome>(), Ok(PaymentOutcome::Failure));
        assert_eq!("failure".parse::<PaymentOutcome>(), Ok(PaymentOutcome::Failure));
        assert_eq!(
            "refunded".parse::<PaymentOutcome>(),
            Err(ParseOutcomeError("refunded".to_string()))
        );
    }

    #[test]
    fn serialization() {
        let json = serde_json::to_string(&PaymentOutcome::Failure).unwrap();
        assert_eq!(json, "\"failure\"");
        let outcome: PaymentOutcome = serde_json::from_str("\"success\"").unwrap();
        assert_eq!(outcome, PaymentOutcome::Success);
    }
}
