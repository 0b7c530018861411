//! Failure taxonomy shared by every command-handling operation.
//!
//! Nothing in the simulation panics out of the tick loop: a command that
//! cannot be honored produces one of these kinds plus a human-readable
//! reason, and the tick continues. The network layer translates the kind
//! into a protocol-level response.

use thiserror::Error;

/// Uniform error kind for all gameplay commands.
///
/// Preconditions are checked before any mutation, so a returned error
/// guarantees no cooldown was started, no resource was spent and no
/// effect was applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombatError {
    /// Id unknown in the registry or a definition table.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation not allowed in the current state (already casting,
    /// already in a match, not queued, ...).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Resource cost cannot be paid.
    #[error("insufficient resource: {0}")]
    InsufficientResource(String),

    /// Cooldown or global cooldown still active.
    #[error("on cooldown: {0}")]
    OnCooldown(String),

    /// Target is immune to the effect or damage.
    #[error("immune: {0}")]
    Immune(String),

    /// Target requirement not satisfied (wrong relationship, dead,
    /// untargetable, out of range).
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// Cast cancelled by an explicit interrupt.
    #[error("interrupted: {0}")]
    Interrupted(String),

    /// Policy gate denied (safe zone, PvP disabled, banned pair).
    #[error("rejected: {0}")]
    Rejected(String),
}

pub type CombatResult<T> = Result<T, CombatError>;
