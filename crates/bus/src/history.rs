//! Bounded undo/redo history of executed commands.
//!
//! Two stacks behind one lock:
//!
//! ```text
//!   add ──► undo stack [oldest … newest] ──move_to_redo_stack──► redo stack [… top]
//!                 ▲                                                   │
//!                 └────────────────── move_to_undo_stack ─────────────┘
//! ```
//!
//! - The undo stack never holds more than `max_size` entries; `add` evicts the
//!   oldest entry permanently.
//! - `add` clears the redo stack (a new forward action invalidates redo).
//! - An entry lives on exactly one stack, or on none once evicted or cleared.
//!
//! Every operation takes the stacks lock. Mutations also take a writer lock,
//! which [`CommandHistory::undo_with`] and [`CommandHistory::redo_with`] hold
//! across a whole reversal: choosing the entry, reversing its effect and moving
//! it happen with no `add`, move or other reversal in between.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use keel_core::{CommandId, ExecutedCommand, UserId};

use crate::error::{HistoryError, Stack};

/// Point-in-time counts of the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    pub undo_size: usize,
    pub redo_size: usize,
    pub total: usize,
    pub undoable: usize,
    pub max_size: usize,
}

#[derive(Debug, Default)]
struct Stacks {
    undo: VecDeque<ExecutedCommand>,
    redo: Vec<ExecutedCommand>,
}

/// Shared undo/redo history.
///
/// Reads return owned snapshots; the stacks themselves are never exposed.
#[derive(Debug)]
pub struct CommandHistory {
    max_size: usize,
    stacks: Mutex<Stacks>,
    /// Serializes mutations. Always taken before `stacks`.
    writer: Mutex<()>,
}

impl CommandHistory {
    pub fn new(max_size: usize) -> Result<Self, HistoryError> {
        if max_size == 0 {
            return Err(HistoryError::ZeroCapacity);
        }
        Ok(Self {
            max_size,
            stacks: Mutex::new(Stacks::default()),
            writer: Mutex::new(()),
        })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    // Every mutation is a single step under the lock, so a poisoned guard still
    // protects consistent stacks.
    fn stacks(&self) -> MutexGuard<'_, Stacks> {
        self.stacks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Guards no data, so poisoning (a panicking reversal) is irrelevant.
    fn writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a completed command.
    ///
    /// Waits for a reversal in progress to finish.
    pub fn add(&self, command: ExecutedCommand) {
        let _writer = self.writer();
        let mut stacks = self.stacks();
        stacks.redo.clear();
        stacks.undo.push_back(command);
        Self::enforce_capacity(&mut stacks.undo, self.max_size);
    }

    fn enforce_capacity(undo: &mut VecDeque<ExecutedCommand>, max_size: usize) {
        while undo.len() > max_size {
            if let Some(evicted) = undo.pop_front() {
                tracing::debug!(
                    command = %evicted.command_name(),
                    command_id = %evicted.command_id(),
                    max_size,
                    "history entry evicted"
                );
            }
        }
    }

    /// Most recent entry on the undo stack that can be undone.
    pub fn last_undoable(&self) -> Option<ExecutedCommand> {
        self.stacks()
            .undo
            .iter()
            .rev()
            .find(|c| c.is_undoable())
            .cloned()
    }

    /// Most recently undone entry.
    pub fn last_redoable(&self) -> Option<ExecutedCommand> {
        self.stacks().redo.last().cloned()
    }

    /// Reverse the newest undoable entry, then move it to the redo stack.
    ///
    /// `reverse` runs under the writer lock, so two concurrent undos never pick
    /// the same entry and no new command is recorded halfway through. The entry
    /// only moves when `reverse` succeeds. `Ok(None)` means nothing to undo.
    ///
    /// `reverse` must not record into this history; that would deadlock.
    pub fn undo_with<E>(
        &self,
        reverse: impl FnOnce(&ExecutedCommand) -> Result<(), E>,
    ) -> Result<Option<ExecutedCommand>, E>
    where
        E: From<HistoryError>,
    {
        let _writer = self.writer();
        let Some(entry) = self.last_undoable() else {
            return Ok(None);
        };
        reverse(&entry)?;
        self.shift_to_redo(&entry)?;
        Ok(Some(entry))
    }

    /// Redo counterpart of [`CommandHistory::undo_with`].
    pub fn redo_with<E>(
        &self,
        reapply: impl FnOnce(&ExecutedCommand) -> Result<(), E>,
    ) -> Result<Option<ExecutedCommand>, E>
    where
        E: From<HistoryError>,
    {
        let _writer = self.writer();
        let Some(entry) = self.last_redoable() else {
            return Ok(None);
        };
        reapply(&entry)?;
        self.shift_to_undo(&entry)?;
        Ok(Some(entry))
    }

    /// Move `command` (matched by command id) from the undo stack to the redo stack.
    pub fn move_to_redo_stack(&self, command: &ExecutedCommand) -> Result<(), HistoryError> {
        let _writer = self.writer();
        self.shift_to_redo(command)
    }

    /// Move `command` (matched by command id) from the redo stack back to the undo stack.
    pub fn move_to_undo_stack(&self, command: &ExecutedCommand) -> Result<(), HistoryError> {
        let _writer = self.writer();
        self.shift_to_undo(command)
    }

    fn shift_to_redo(&self, command: &ExecutedCommand) -> Result<(), HistoryError> {
        let mut stacks = self.stacks();
        let id = command.command_id();
        let idx = position(stacks.undo.iter(), id).ok_or(HistoryError::Desync {
            command_id: id,
            expected: Stack::Undo,
        })?;
        if let Some(entry) = stacks.undo.remove(idx) {
            stacks.redo.push(entry);
        }
        Ok(())
    }

    fn shift_to_undo(&self, command: &ExecutedCommand) -> Result<(), HistoryError> {
        let mut stacks = self.stacks();
        let id = command.command_id();
        let idx = position(stacks.redo.iter(), id).ok_or(HistoryError::Desync {
            command_id: id,
            expected: Stack::Redo,
        })?;
        let entry = stacks.redo.remove(idx);
        stacks.undo.push_back(entry);
        Self::enforce_capacity(&mut stacks.undo, self.max_size);
        Ok(())
    }

    /// Undo-stack entries attributed to `user_id`, oldest first.
    pub fn by_user(&self, user_id: UserId) -> Vec<ExecutedCommand> {
        self.stacks()
            .undo
            .iter()
            .filter(|c| c.user_id() == Some(user_id))
            .cloned()
            .collect()
    }

    /// Undo-stack entries completed within `[start, end]`, oldest first.
    pub fn by_date_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<ExecutedCommand> {
        self.stacks()
            .undo
            .iter()
            .filter(|c| c.timestamp() >= start && c.timestamp() <= end)
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> HistoryStats {
        let stacks = self.stacks();
        HistoryStats {
            undo_size: stacks.undo.len(),
            redo_size: stacks.redo.len(),
            total: stacks.undo.len() + stacks.redo.len(),
            undoable: stacks.undo.iter().filter(|c| c.is_undoable()).count(),
            max_size: self.max_size,
        }
    }

    /// Snapshot of the undo stack, oldest first.
    pub fn undo_entries(&self) -> Vec<ExecutedCommand> {
        self.stacks().undo.iter().cloned().collect()
    }

    /// Snapshot of the redo stack, bottom first (last element is redone next).
    pub fn redo_entries(&self) -> Vec<ExecutedCommand> {
        self.stacks().redo.clone()
    }

    pub fn can_undo(&self) -> bool {
        self.stacks().undo.iter().any(|c| c.is_undoable())
    }

    pub fn can_redo(&self) -> bool {
        !self.stacks().redo.is_empty()
    }

    /// Drop everything on both stacks.
    pub fn clear(&self) {
        let _writer = self.writer();
        let mut stacks = self.stacks();
        stacks.undo.clear();
        stacks.redo.clear();
    }
}

fn position<'a>(
    mut entries: impl Iterator<Item = &'a ExecutedCommand>,
    id: CommandId,
) -> Option<usize> {
    entries.position(|c| c.command_id() == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use keel_core::{CommandMetadata, MetadataOverrides, UndoPayload};
    use proptest::prelude::*;

    fn entry(name: &str, undoable: bool) -> ExecutedCommand {
        entry_for(name, undoable, None, Utc::now())
    }

    fn entry_for(
        name: &str,
        undoable: bool,
        user: Option<UserId>,
        completed_at: DateTime<Utc>,
    ) -> ExecutedCommand {
        let mut overrides = MetadataOverrides::new();
        overrides.user_id = user;
        let meta = CommandMetadata::generate(overrides);
        let payload = undoable.then(|| UndoPayload::new(name, serde_json::json!({})));
        ExecutedCommand::new(name, meta, completed_at, payload)
    }

    fn names(entries: &[ExecutedCommand]) -> Vec<&str> {
        entries.iter().map(|c| c.command_name()).collect()
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(CommandHistory::new(0).unwrap_err(), HistoryError::ZeroCapacity);
    }

    #[test]
    fn capacity_two_scenario() {
        let history = CommandHistory::new(2).unwrap();
        let c1 = entry("C1", true);
        history.add(c1.clone());
        history.add(entry("C2", true));
        history.add(entry("C3", true));

        assert_eq!(names(&history.undo_entries()), ["C2", "C3"]);

        // C1 is gone for good.
        assert_eq!(
            history.move_to_redo_stack(&c1),
            Err(HistoryError::Desync {
                command_id: c1.command_id(),
                expected: Stack::Undo,
            })
        );

        let c3 = history.last_undoable().unwrap();
        assert_eq!(c3.command_name(), "C3");
        history.move_to_redo_stack(&c3).unwrap();
        assert_eq!(names(&history.undo_entries()), ["C2"]);
        assert_eq!(names(&history.redo_entries()), ["C3"]);

        history.add(entry("C4", true));
        assert_eq!(names(&history.undo_entries()), ["C2", "C4"]);
        assert!(history.redo_entries().is_empty());
        assert!(!history.can_redo());
    }

    #[test]
    fn last_undoable_skips_non_undoable_entries() {
        let history = CommandHistory::new(10).unwrap();
        history.add(entry("Register", true));
        history.add(entry("ChangePassword", false));
        history.add(entry("Login", false));

        assert_eq!(history.last_undoable().unwrap().command_name(), "Register");

        let only_irreversible = CommandHistory::new(10).unwrap();
        only_irreversible.add(entry("ChangePassword", false));
        assert!(only_irreversible.last_undoable().is_none());
        assert!(!only_irreversible.can_undo());
        assert_eq!(only_irreversible.stats().undo_size, 1);
    }

    #[test]
    fn undo_then_redo_moves_entry_back() {
        let history = CommandHistory::new(5).unwrap();
        history.add(entry("A", true));
        history.add(entry("B", true));

        let b = history.last_undoable().unwrap();
        history.move_to_redo_stack(&b).unwrap();
        assert_eq!(history.last_redoable().unwrap().command_id(), b.command_id());

        history.move_to_undo_stack(&b).unwrap();
        assert_eq!(names(&history.undo_entries()), ["A", "B"]);
        assert!(history.last_redoable().is_none());
    }

    #[test]
    fn failed_reversal_leaves_entry_in_place() {
        let history = CommandHistory::new(5).unwrap();
        history.add(entry("A", true));

        let result = history.undo_with(|_| Err(HistoryError::ZeroCapacity));

        assert!(result.is_err());
        assert_eq!(names(&history.undo_entries()), ["A"]);
        assert!(!history.can_redo());
    }

    #[test]
    fn reversals_report_empty_stacks_as_none() {
        let history = CommandHistory::new(5).unwrap();
        history.add(entry("Irreversible", false));

        let undone = history.undo_with(|_| Ok::<_, HistoryError>(())).unwrap();
        let redone = history.redo_with(|_| Ok::<_, HistoryError>(())).unwrap();

        assert!(undone.is_none());
        assert!(redone.is_none());
    }

    #[test]
    fn add_waits_for_a_running_reversal() {
        use std::sync::Arc;
        use std::sync::mpsc;

        let history = Arc::new(CommandHistory::new(5).unwrap());
        history.add(entry("A", true));

        let (entered, reversing) = mpsc::channel();
        let undoer = {
            let history = history.clone();
            std::thread::spawn(move || {
                history
                    .undo_with(|_| {
                        entered.send(()).unwrap();
                        std::thread::sleep(std::time::Duration::from_millis(50));
                        Ok::<_, HistoryError>(())
                    })
                    .unwrap()
            })
        };

        reversing.recv().unwrap();
        history.add(entry("B", false));
        assert_eq!(undoer.join().unwrap().unwrap().command_name(), "A");

        // B landed after the move, so it invalidated the redo entry.
        assert_eq!(names(&history.undo_entries()), ["B"]);
        assert!(!history.can_redo());
    }

    #[test]
    fn moving_twice_is_a_desync() {
        let history = CommandHistory::new(5).unwrap();
        let a = entry("A", true);
        history.add(a.clone());
        history.move_to_redo_stack(&a).unwrap();

        assert!(matches!(
            history.move_to_redo_stack(&a),
            Err(HistoryError::Desync { expected: Stack::Undo, .. })
        ));

        history.move_to_undo_stack(&a).unwrap();
        assert!(matches!(
            history.move_to_undo_stack(&a),
            Err(HistoryError::Desync { expected: Stack::Redo, .. })
        ));
    }

    #[test]
    fn filters_only_see_undo_stack() {
        let history = CommandHistory::new(10).unwrap();
        let alice = UserId::new();
        let bob = UserId::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        history.add(entry_for("A1", true, Some(alice), t0));
        history.add(entry_for("B1", true, Some(bob), t0 + Duration::hours(1)));
        history.add(entry_for("A2", true, Some(alice), t0 + Duration::hours(2)));
        history.add(entry_for("Anon", true, None, t0 + Duration::hours(3)));

        assert_eq!(names(&history.by_user(alice)), ["A1", "A2"]);

        // Inclusive bounds.
        let range = history.by_date_range(t0 + Duration::hours(1), t0 + Duration::hours(2));
        assert_eq!(names(&range), ["B1", "A2"]);

        let a2 = history.by_user(alice).pop().unwrap();
        history.add(entry_for("A3", true, Some(alice), t0 + Duration::hours(4)));
        let a3 = history.last_undoable().unwrap();
        history.move_to_redo_stack(&a3).unwrap();

        assert_eq!(names(&history.by_user(alice)), ["A1", "A2"]);
        assert!(history.by_user(alice).iter().any(|c| c.command_id() == a2.command_id()));
        assert!(
            history
                .by_date_range(t0 + Duration::hours(4), t0 + Duration::hours(5))
                .is_empty()
        );
    }

    #[test]
    fn stats_and_clear() {
        let history = CommandHistory::new(3).unwrap();
        history.add(entry("A", true));
        history.add(entry("B", false));
        history.add(entry("C", true));
        let c = history.last_undoable().unwrap();
        history.move_to_redo_stack(&c).unwrap();

        assert_eq!(
            history.stats(),
            HistoryStats {
                undo_size: 2,
                redo_size: 1,
                total: 3,
                undoable: 1,
                max_size: 3,
            }
        );

        history.clear();
        let stats = history.stats();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.max_size, 3);
        assert!(history.last_redoable().is_none());
    }

    proptest! {
        #[test]
        fn undo_stack_never_exceeds_capacity(max_size in 1usize..8, adds in 0usize..32) {
            let history = CommandHistory::new(max_size).unwrap();
            let mut added = Vec::new();
            for i in 0..adds {
                let e = entry(&format!("C{i}"), i % 3 != 0);
                added.push(e.command_id());
                history.add(e);
            }

            let kept: Vec<CommandId> = history.undo_entries().iter().map(|c| c.command_id()).collect();
            prop_assert_eq!(kept.len(), adds.min(max_size));
            // The survivors are exactly the newest entries, in order.
            prop_assert_eq!(&kept[..], &added[adds - kept.len()..]);
        }

        #[test]
        fn entry_lives_on_at_most_one_stack(ops in proptest::collection::vec(0u8..3, 1..40)) {
            let history = CommandHistory::new(4).unwrap();
            for (i, op) in ops.into_iter().enumerate() {
                match op {
                    0 => history.add(entry(&format!("C{i}"), true)),
                    1 => {
                        if let Some(c) = history.last_undoable() {
                            history.move_to_redo_stack(&c).unwrap();
                        }
                    }
                    _ => {
                        if let Some(c) = history.last_redoable() {
                            history.move_to_undo_stack(&c).unwrap();
                        }
                    }
                }

                let undo: Vec<CommandId> = history.undo_entries().iter().map(|c| c.command_id()).collect();
                let redo: Vec<CommandId> = history.redo_entries().iter().map(|c| c.command_id()).collect();
                prop_assert!(undo.len() <= 4);
                prop_assert!(undo.iter().all(|id| !redo.contains(id)));
            }
        }
    }
}
