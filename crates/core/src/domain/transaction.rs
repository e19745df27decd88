// Transaction State Machine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction ID (UUID v4)
pub type TransactionId = String;

/// Lifecycle of a transaction.
///
/// ```text
/// Active --phase1 ok--> Committing --phase2--> Committed
/// Active --phase1 failed / failure recorded--> RollingBack --> RolledBack
/// any --release--> Released (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionState {
    Active,
    Committing,
    Committed,
    RollingBack,
    RolledBack,
    Released,
}

impl TransactionState {
    pub fn can_transition_to(self, to: TransactionState) -> bool {
        use TransactionState::*;
        match (self, to) {
            (Released, _) => false,
            (_, Released) => true,
            (Active, Committing) | (Active, RollingBack) => true,
            (Committing, Committed) | (Committing, RollingBack) => true,
            (RollingBack, RolledBack) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::Active => write!(f, "ACTIVE"),
            TransactionState::Committing => write!(f, "COMMITTING"),
            TransactionState::Committed => write!(f, "COMMITTED"),
            TransactionState::RollingBack => write!(f, "ROLLING_BACK"),
            TransactionState::RolledBack => write!(f, "ROLLED_BACK"),
            TransactionState::Released => write!(f, "RELEASED"),
        }
    }
}
