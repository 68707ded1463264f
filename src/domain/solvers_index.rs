//! Task→Solvers inverted index.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::student::StudentId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solver {
    pub student_id: StudentId,
    pub completed_at: DateTime<Utc>,
}

/// Insertion-ordered by `completed_at` ascending; a repeated `(task, student)`
/// pair collapses to whichever insert saw the earliest `completed_at`.
#[derive(Debug, Clone, Default)]
pub struct SolversIndex {
    by_task: HashMap<String, Vec<Solver>>,
}

impl SolversIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this insert changed the stored entry for `(task, student)`.
    pub fn insert(
        &mut self,
        task_id: impl Into<String>,
        student_id: impl Into<String>,
        completed_at: DateTime<Utc>,
    ) -> bool {
        let task_id = task_id.into();
        let student_id = student_id.into();
        let entries = self.by_task.entry(task_id).or_default();

        if let Some(existing) = entries.iter_mut().find(|s| s.student_id == student_id) {
            if completed_at < existing.completed_at {
                existing.completed_at = completed_at;
                entries.sort_by_key(|s| s.completed_at);
                return true;
            }
            return false;
        }

        let pos = entries
            .iter()
            .position(|s| s.completed_at > completed_at)
            .unwrap_or(entries.len());
        entries.insert(pos, Solver { student_id, completed_at });
        true
    }

    pub fn solvers_of(&self, task_id: &str) -> &[Solver] {
        self.by_task.get(task_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, task_id: &str, student_id: &str) -> bool {
        self.by_task
            .get(task_id)
            .map(|v| v.iter().any(|s| s.student_id == student_id))
            .unwrap_or(false)
    }
}
