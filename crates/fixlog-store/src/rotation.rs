use fixlog_core::ErrorRecord;

/// Records that rotation can partition into resolved and unresolved.
pub trait Resolvable {
    fn is_resolved(&self) -> bool;
}

impl Resolvable for ErrorRecord {
    fn is_resolved(&self) -> bool {
        self.resolved
    }
}

/// Bound `records` (oldest first) to `ceiling` entries.
///
/// Every unresolved record is kept; resolved records fill whatever budget
/// remains, newest first. If unresolved records alone exceed the ceiling,
/// the result is truncated to the newest `ceiling` records.
pub fn plan_rotation<T: Resolvable>(records: Vec<T>, ceiling: usize) -> Vec<T> {
    if records.len() <= ceiling {
        return records;
    }

    let unresolved = records.iter().filter(|record| !record.is_resolved()).count();
    let resolved = records.len() - unresolved;
    let resolved_budget = ceiling.saturating_sub(unresolved);
    let mut resolved_to_drop = resolved.saturating_sub(resolved_budget);

    let mut kept: Vec<T> = records
        .into_iter()
        .filter(|record| {
            if record.is_resolved() && resolved_to_drop > 0 {
                resolved_to_drop -= 1;
                false
            } else {
                true
            }
        })
        .collect();

    if kept.len() > ceiling {
        let excess = kept.len() - ceiling;
        kept.drain(..excess);
    }
    kept
}
