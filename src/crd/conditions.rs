//! Condition set maintenance
//!
//! `set_condition` is the only write path for conditions. It keeps at most one
//! entry per type and only moves `lastTransitionTime` when the status flips.

use super::types::Condition;

/// Find the condition of the given type
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// True if a condition of the given type exists with status `True`
pub fn is_condition_true(conditions: &[Condition], type_: &str) -> bool {
    find_condition(conditions, type_).is_some_and(Condition::is_true)
}

/// Merge `new` into `conditions`, keyed by type.
///
/// An existing entry of the same type has its reason and message replaced;
/// its transition time is only taken from `new` when the status changes.
/// Entries of other types are left untouched. Absent types are appended.
pub fn set_condition(conditions: &mut Vec<Condition>, new: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == new.type_) {
        Some(existing) => {
            if existing.status != new.status {
                existing.status = new.status;
                existing.last_transition_time = new.last_transition_time;
            }
            existing.reason = new.reason;
            existing.message = new.message;
        }
        None => conditions.push(new),
    }
}
