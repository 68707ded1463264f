use crate::domain::DomainError;

/// Outcome of running a reaction pipeline to completion. Every step runs
/// regardless of earlier non-fatal failures; `failed_steps` collects what
/// went wrong so the caller can log or selectively retry without losing the
/// steps that did succeed.
#[derive(Debug, Default)]
pub struct ReactionReport {
    pub failed_steps: Vec<(&'static str, DomainError)>,
}

impl ReactionReport {
    pub fn is_clean(&self) -> bool {
        self.failed_steps.is_empty()
    }

    pub fn record(&mut self, step: &'static str, result: Result<(), DomainError>) {
        if let Err(err) = result {
            self.failed_steps.push((step, err));
        }
    }
}
