//! Fine status values and the transition rules between them.
//!
//! Pure decision logic. Nothing here touches the ledger; callers consult the
//! state machine before submitting a status update so a doomed transaction is
//! never paid for.

use crate::errors::{MultaError, Result};
use crate::fine::Fine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds a fine may stay pending before it is overdue.
pub const PAYMENT_WINDOW_SECS: u64 = 30 * 24 * 60 * 60;

/// Late fee applied to overdue fines, in percent.
pub const LATE_FEE_PERCENT: u64 = 10;

/// Status of a fine as stored on the ledger (`uint8` on the wire).
///
/// Serializes as its numeric code, the same value the contract stores and
/// emits. Names are for display and command-line parsing only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum FineState {
    /// Registered, awaiting payment
    Pending = 0,
    /// Paid
    Paid = 1,
    /// Under appeal
    Appealed = 2,
    /// Appeal decided
    ResolvedAppeal = 3,
    /// Cancelled (terminal)
    Cancelled = 4,
}

impl FineState {
    /// Every state, in ledger code order.
    pub const ALL: [FineState; 5] = [
        FineState::Pending,
        FineState::Paid,
        FineState::Appealed,
        FineState::ResolvedAppeal,
        FineState::Cancelled,
    ];

    /// Status every fine starts in.
    pub const INITIAL: FineState = FineState::Pending;

    /// Ledger code of this state.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Parse a ledger status code.
    pub fn from_code(code: u8) -> Result<Self> {
        Self::ALL
            .get(usize::from(code))
            .copied()
            .ok_or_else(|| MultaError::validation(format!("Invalid fine state: {code}. Must be one of: 0, 1, 2, 3, 4")))
    }

    /// Short human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            Self::Pending => "Pending payment",
            Self::Paid => "Paid",
            Self::Appealed => "Appeal in progress",
            Self::ResolvedAppeal => "Appeal resolved",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl From<FineState> for u8 {
    fn from(state: FineState) -> Self {
        state.code()
    }
}

impl TryFrom<u8> for FineState {
    type Error = MultaError;

    fn try_from(code: u8) -> Result<Self> {
        Self::from_code(code)
    }
}

impl fmt::Display for FineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Appealed => "APPEALED",
            Self::ResolvedAppeal => "RESOLVED_APPEAL",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for FineState {
    type Err = MultaError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "APPEALED" => Ok(Self::Appealed),
            "RESOLVED_APPEAL" => Ok(Self::ResolvedAppeal),
            "CANCELLED" => Ok(Self::Cancelled),
            other => match other.parse::<u8>() {
                Ok(code) => Self::from_code(code),
                Err(_) => Err(MultaError::validation(format!("Unknown fine state: {s}"))),
            },
        }
    }
}

/// Transition rules and payment-window arithmetic.
#[derive(Debug, Clone, Copy, Default)]
pub struct FineStateMachine;

impl FineStateMachine {
    /// Directed edges out of `from`. No implicit reverse edges.
    pub fn successors(from: FineState) -> &'static [FineState] {
        use FineState::*;
        match from {
            Pending => &[Paid, Appealed, Cancelled],
            Paid => &[Appealed],
            Appealed => &[ResolvedAppeal, Cancelled],
            ResolvedAppeal => &[Paid, Cancelled],
            Cancelled => &[],
        }
    }

    /// Whether `from -> to` is an edge of the transition table.
    pub fn can_transition(from: FineState, to: FineState) -> bool {
        Self::successors(from).contains(&to)
    }

    /// Check a transition, describing the rejection.
    pub fn validate_transition(from: FineState, to: FineState) -> Result<()> {
        if Self::can_transition(from, to) {
            Ok(())
        } else {
            Err(MultaError::validation(format!(
                "Invalid state transition from {from} to {to}"
            )))
        }
    }

    /// Only pending or paid fines can be appealed.
    pub fn can_be_appealed(status: FineState) -> bool {
        matches!(status, FineState::Pending | FineState::Paid)
    }

    /// A final state has no outgoing edges. `PAID` keeps its edge to
    /// `APPEALED`, so only `CANCELLED` is final.
    pub fn is_final_state(status: FineState) -> bool {
        Self::successors(status).is_empty()
    }

    /// Pending for longer than the payment window at `now` (unix seconds).
    pub fn is_overdue(fine: &Fine, now: u64) -> bool {
        fine.current_state == FineState::Pending
            && now > fine.registered_at.saturating_add(PAYMENT_WINDOW_SECS)
    }

    /// Cost including the late fee when overdue, rounded half-up to whole units.
    pub fn cost_with_late_fee(fine: &Fine, now: u64) -> u64 {
        if !Self::is_overdue(fine, now) {
            return fine.cost;
        }
        let scaled = u128::from(fine.cost) * u128::from(100 + LATE_FEE_PERCENT);
        let rounded = (scaled + 50) / 100;
        u64::try_from(rounded).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fine::{FineId, LedgerAddress};

    fn fine_at(state: FineState, registered_at: u64, cost: u64) -> Fine {
        Fine {
            id: FineId::new(1).unwrap(),
            plate_number: "ABC123".into(),
            evidence_cid: "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG".into(),
            location: "Av. Siempre Viva 123".into(),
            infraction_type: "EXCESO_VELOCIDAD".into(),
            cost,
            owner_identifier: "CC1020304050".into(),
            current_state: state,
            registered_by: LedgerAddress::ZERO,
            registered_at,
            external_system_id: None,
        }
    }

    #[test]
    fn cancelled_is_terminal() {
        for to in FineState::ALL {
            assert!(!FineStateMachine::can_transition(FineState::Cancelled, to));
        }
        assert!(FineStateMachine::validate_transition(FineState::Cancelled, FineState::Paid).is_err());
    }

    #[test]
    fn paid_is_not_final_because_it_can_be_appealed() {
        // PAID keeps the PAID -> APPEALED edge; finality is derived from the table.
        assert!(FineStateMachine::can_transition(FineState::Paid, FineState::Appealed));
        assert!(FineStateMachine::can_be_appealed(FineState::Paid));
        assert!(!FineStateMachine::is_final_state(FineState::Paid));
        assert!(FineStateMachine::is_final_state(FineState::Cancelled));
    }

    #[test]
    fn appeal_only_from_pending_or_paid() {
        let appealable: Vec<_> = FineState::ALL
            .into_iter()
            .filter(|s| FineStateMachine::can_be_appealed(*s))
            .collect();
        assert_eq!(appealable, vec![FineState::Pending, FineState::Paid]);
    }

    #[test]
    fn codes_round_trip_and_reject_unknown() {
        for state in FineState::ALL {
            assert_eq!(FineState::from_code(state.code()).unwrap(), state);
        }
        assert!(FineState::from_code(5).is_err());
        assert_eq!("resolved appeal".parse::<FineState>().unwrap(), FineState::ResolvedAppeal);
        assert_eq!("1".parse::<FineState>().unwrap(), FineState::Paid);
    }

    #[test]
    fn serializes_as_the_ledger_code() {
        assert_eq!(serde_json::to_value(FineState::Pending).unwrap(), serde_json::json!(0));
        assert_eq!(serde_json::to_value(FineState::Cancelled).unwrap(), serde_json::json!(4));
        let paid: FineState = serde_json::from_value(serde_json::json!(1)).unwrap();
        assert_eq!(paid, FineState::Paid);
        assert!(serde_json::from_value::<FineState>(serde_json::json!(5)).is_err());
        assert!(serde_json::from_value::<FineState>(serde_json::json!("PAID")).is_err());
    }

    #[test]
    fn overdue_after_thirty_days_only_when_pending() {
        let registered = 1_700_000_000;
        let pending = fine_at(FineState::Pending, registered, 500_000);
        assert!(!FineStateMachine::is_overdue(&pending, registered + PAYMENT_WINDOW_SECS));
        assert!(FineStateMachine::is_overdue(&pending, registered + PAYMENT_WINDOW_SECS + 1));

        let paid = fine_at(FineState::Paid, registered, 500_000);
        assert!(!FineStateMachine::is_overdue(&paid, registered + 10 * PAYMENT_WINDOW_SECS));
    }

    #[test]
    fn late_fee_is_ten_percent_rounded() {
        let registered = 1_700_000_000;
        let late = registered + PAYMENT_WINDOW_SECS + 1;

        let fine = fine_at(FineState::Pending, registered, 500_000);
        assert_eq!(FineStateMachine::cost_with_late_fee(&fine, late), 550_000);
        assert_eq!(FineStateMachine::cost_with_late_fee(&fine, registered), 500_000);

        let odd = fine_at(FineState::Pending, registered, 15);
        // 16.5 rounds half-up
        assert_eq!(FineStateMachine::cost_with_late_fee(&odd, late), 17);
    }
}
