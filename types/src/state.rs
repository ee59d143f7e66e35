//! Lifecycle status of a service record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The status of one payment attempt.
///
/// Transitions are monotone: `Waiting` moves to exactly one of the terminal
/// states and nothing leaves a terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceStatus {
    /// Address leased, watcher polling for funds.
    Waiting,
    /// Received delta reached the requested amount.
    Paid,
    /// Deadline passed before the funds arrived.
    Expired,
    /// Buyer withdrew the request.
    Cancelled,
}

impl ServiceStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Waiting)
    }

    /// Whether `self -> next` is an allowed transition.
    pub fn can_transition_to(&self, next: ServiceStatus) -> bool {
        matches!(self, Self::Waiting) && next.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Paid => "paid",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
