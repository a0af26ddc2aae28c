//! Step identity inside audit notes.
//!
//! Step rows carry the step name and a literal `Step ID: N` marker. Readers
//! require both, and the marker must match the id exactly: `Step ID: 1`
//! does not match inside `Step ID: 12`.

use procura_shared::types::StepId;

use crate::model::WorkflowStep;

/// Returns the literal marker for a step id.
#[must_use]
pub fn step_marker(step_id: StepId) -> String {
    format!("Step ID: {step_id}")
}

/// Formats notes for a step event: `<name>: <detail> (Step ID: N)`.
#[must_use]
pub fn step_notes(step: &WorkflowStep, detail: &str) -> String {
    format!("{}: {} ({})", step.name, detail, step_marker(step.id))
}

/// Returns true if `notes` contains the exact marker for `step_id`.
#[must_use]
pub fn contains_marker(notes: &str, step_id: StepId) -> bool {
    let marker = step_marker(step_id);
    notes.match_indices(&marker).any(|(at, _)| {
        notes[at + marker.len()..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_ascii_digit())
    })
}

/// Returns true if `notes` names the step and carries its exact marker.
#[must_use]
pub fn references_step(notes: &str, step: &WorkflowStep) -> bool {
    notes.contains(&step.name) && contains_marker(notes, step.id)
}

/// Returns true if `notes` mentions the step by name.
#[must_use]
pub fn mentions_step_name(notes: &str, step: &WorkflowStep) -> bool {
    notes.contains(&step.name)
}
