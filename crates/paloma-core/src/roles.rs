//! Role assignment rules
//!
//! Pure decisions about how adding or removing a role changes a user's
//! assignments. Repositories call these while holding their transaction (or
//! lock) over the user's current assignments, so the check and the write
//! happen as one unit.

use crate::{RoleAssignment, RoleType};
use thiserror::Error;

/// Rule violations for role changes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleRuleError {
    #[error("User already has role: {0}")]
    DuplicateRole(RoleType),

    #[error("User does not have role: {0}")]
    RoleNotFound(RoleType),

    #[error("Cannot remove role - user must have at least one role")]
    LastRole,

    #[error("No remaining role assignment can be made primary")]
    NoPromotionCandidate,
}

/// How a new assignment is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdditionPlan {
    /// Primary flag of the new assignment
    pub is_primary: bool,
    /// Clear the primary flag on the existing assignments first
    pub demote_existing: bool,
}

/// How a removal is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovalPlan {
    /// Remaining role that becomes primary after the delete
    pub promote: Option<RoleType>,
}

/// Decide how `role` is added to a user currently holding `existing`
///
/// The first assignment a user receives is always primary, whatever was
/// requested, so that a user with roles always has exactly one primary.
pub fn plan_addition(
    existing: &[RoleAssignment],
    role: RoleType,
    requested_primary: bool,
) -> Result<AdditionPlan, RoleRuleError> {
    if existing.iter().any(|a| a.role_type == role) {
        return Err(RoleRuleError::DuplicateRole(role));
    }

    let has_primary = existing.iter().any(|a| a.is_primary);
    let is_primary = requested_primary || !has_primary;

    Ok(AdditionPlan {
        is_primary,
        demote_existing: is_primary && has_primary,
    })
}

/// Decide how `role` is removed from a user currently holding `existing`
///
/// When the primary assignment goes away, the remaining assignment with the
/// lowest `seq` (the oldest) is promoted.
pub fn plan_removal(
    existing: &[RoleAssignment],
    role: RoleType,
) -> Result<RemovalPlan, RoleRuleError> {
    let target = existing
        .iter()
        .find(|a| a.role_type == role)
        .ok_or(RoleRuleError::RoleNotFound(role))?;

    if existing.len() <= 1 {
        return Err(RoleRuleError::LastRole);
    }

    if !target.is_primary {
        return Ok(RemovalPlan { promote: None });
    }

    let candidate = existing
        .iter()
        .filter(|a| a.role_type != role)
        .min_by_key(|a| a.seq)
        .ok_or(RoleRuleError::NoPromotionCandidate)?;

    Ok(RemovalPlan {
        promote: Some(candidate.role_type),
    })
}

/// True when the assignments satisfy the role invariants: no repeated role
/// type, and exactly one primary whenever any assignment exists
pub fn satisfies_invariants(assignments: &[RoleAssignment]) -> bool {
    let mut seen = Vec::with_capacity(assignments.len());
    for a in assignments {
        if seen.contains(&a.role_type) {
            return false;
        }
        seen.push(a.role_type);
    }

    let primaries = assignments.iter().filter(|a| a.is_primary).count();
    if assignments.is_empty() {
        primaries == 0
    } else {
        primaries == 1
    }
}
