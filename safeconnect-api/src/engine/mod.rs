//! Journey deadline tracking and overdue escalation.

pub mod escalation;
pub mod overdue;

pub use escalation::{
    ClaimOutcome, CompletionOutcome, EngineConfig, EscalationEngine, FireHandler, FireSource,
    FiredJourney, RecoverySummary, TimerState,
};
pub use overdue::OverdueEscalation;
