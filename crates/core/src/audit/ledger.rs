//! Per-step state folded from executions and audit history.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use procura_shared::types::{DelegationId, StepId, UserId};

use super::notes::{mentions_step_name, references_step};
use super::types::{Actor, AuditAction, AuditLogEntry, ExecutionStatus, StepExecution};
use crate::model::WorkflowStep;

/// An approval given on a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedApproval {
    /// Who clicked approve.
    pub approver: UserId,
    /// Delegators the approver stood in for.
    pub on_behalf_of: Vec<UserId>,
}

impl RecordedApproval {
    /// The approver and everyone they acted for.
    pub fn principals(&self) -> impl Iterator<Item = UserId> + '_ {
        std::iter::once(self.approver).chain(self.on_behalf_of.iter().copied())
    }
}

/// Folded state of one step for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepState {
    /// Users the step was routed to, with the delegation that routed them.
    pub forwarded: BTreeMap<UserId, Option<DelegationId>>,
    /// Any event was recorded for the step.
    pub started: bool,
    /// Time of the first recorded event.
    pub started_at: Option<DateTime<Utc>>,
    /// Approvals in arrival order.
    pub approvals: Vec<RecordedApproval>,
    /// Step satisfied.
    pub completed: bool,
    /// Step rejected.
    pub rejected: bool,
    /// Step abandoned.
    pub cancelled: bool,
    /// Timeout recorded.
    pub delayed: bool,
}

static EMPTY_STATE: StepState = StepState {
    forwarded: BTreeMap::new(),
    started: false,
    started_at: None,
    approvals: Vec::new(),
    completed: false,
    rejected: false,
    cancelled: false,
    delayed: false,
};

impl StepState {
    /// Returns true if `user` already approved this step themselves.
    #[must_use]
    pub fn has_approved(&self, user: UserId) -> bool {
        self.approvals.iter().any(|a| a.approver == user)
    }

    /// Every principal covered by an approval.
    #[must_use]
    pub fn approving_principals(&self) -> BTreeSet<UserId> {
        self.approvals
            .iter()
            .flat_map(RecordedApproval::principals)
            .collect()
    }

    /// Number of `eligible` users whose slot is filled by an approval.
    ///
    /// Each approver fills at most one slot: their own, or that of a
    /// delegator they acted for. Slots are matched so the count is as large
    /// as possible, which keeps the result independent of approval order.
    #[must_use]
    pub fn filled_slots(&self, eligible: &BTreeSet<UserId>) -> usize {
        let options: Vec<Vec<UserId>> = self
            .approvals
            .iter()
            .map(|a| a.principals().filter(|p| eligible.contains(p)).collect())
            .collect();

        let mut holders: BTreeMap<UserId, usize> = BTreeMap::new();
        let mut filled = 0;
        for approver in 0..options.len() {
            let mut tried = BTreeSet::new();
            if claim_slot(approver, &options, &mut holders, &mut tried) {
                filled += 1;
            }
        }
        filled
    }

    /// Returns true once the step left the not-started state and is still open.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.started && !self.completed && !self.rejected && !self.cancelled
    }

    fn mark_started(&mut self, at: DateTime<Utc>) {
        self.started = true;
        if self.started_at.is_none_or(|first| at < first) {
            self.started_at = Some(at);
        }
    }

    fn record_approval(&mut self, approver: UserId, on_behalf_of: &[UserId]) {
        if let Some(existing) = self.approvals.iter_mut().find(|a| a.approver == approver) {
            for delegator in on_behalf_of {
                if !existing.on_behalf_of.contains(delegator) {
                    existing.on_behalf_of.push(*delegator);
                }
            }
        } else {
            self.approvals.push(RecordedApproval {
                approver,
                on_behalf_of: on_behalf_of.to_vec(),
            });
        }
    }

    fn apply(&mut self, execution: &StepExecution) {
        self.mark_started(execution.at);
        match execution.status {
            ExecutionStatus::Forwarded => {
                if let Some(target) = execution.target {
                    self.forwarded.insert(target, execution.delegation_id);
                }
            }
            ExecutionStatus::Approved => {
                if let Actor::Human(approver) = execution.actor {
                    self.record_approval(approver, &execution.on_behalf_of);
                }
            }
            ExecutionStatus::Completed => self.completed = true,
            ExecutionStatus::Rejected => self.rejected = true,
            ExecutionStatus::Cancelled => self.cancelled = true,
            ExecutionStatus::Delayed => self.delayed = true,
        }
    }
}

/// Finds a slot for `approver`, moving earlier holders to other slots they
/// can take when needed.
fn claim_slot(
    approver: usize,
    options: &[Vec<UserId>],
    holders: &mut BTreeMap<UserId, usize>,
    tried: &mut BTreeSet<UserId>,
) -> bool {
    for &slot in &options[approver] {
        if !tried.insert(slot) {
            continue;
        }
        let free = match holders.get(&slot).copied() {
            None => true,
            Some(holder) => claim_slot(holder, options, holders, tried),
        };
        if free {
            holders.insert(slot, approver);
            return true;
        }
    }
    false
}

/// Step states of one request.
#[derive(Debug, Clone, Default)]
pub struct StepLedger {
    steps: HashMap<StepId, StepState>,
    legacy: StepState,
}

impl StepLedger {
    /// Folds executions, then honours audit rows for `steps`.
    #[must_use]
    pub fn build(
        executions: &[StepExecution],
        audit_log: &[AuditLogEntry],
        steps: &[WorkflowStep],
    ) -> Self {
        let mut ledger = Self::from_executions(executions);
        ledger.absorb_audit_log(audit_log, steps);
        ledger
    }

    /// Folds execution records in order.
    #[must_use]
    pub fn from_executions(executions: &[StepExecution]) -> Self {
        let mut ledger = Self::default();
        for execution in executions {
            match execution.step_id {
                Some(step_id) => ledger.steps.entry(step_id).or_default().apply(execution),
                None => ledger.legacy.apply(execution),
            }
        }
        ledger
    }

    /// Applies step evidence found in audit notes.
    ///
    /// Completion needs a `Step completed` row naming the step with its exact
    /// marker; an approval needs a `Workflow Step Completed` row that says
    /// "approved" and references the step; rejection only needs the name.
    pub fn absorb_audit_log(&mut self, audit_log: &[AuditLogEntry], steps: &[WorkflowStep]) {
        for entry in audit_log {
            if entry.action == AuditAction::Approved
                && let Actor::Human(approver) = entry.actor
            {
                self.legacy.record_approval(approver, &[]);
            }
            for step in steps {
                let state = self.steps.entry(step.id).or_default();
                match entry.action {
                    AuditAction::StepCompleted if references_step(&entry.notes, step) => {
                        state.mark_started(entry.created_at);
                        state.completed = true;
                    }
                    AuditAction::WorkflowStepRejected if mentions_step_name(&entry.notes, step) => {
                        state.mark_started(entry.created_at);
                        state.rejected = true;
                    }
                    AuditAction::WorkflowStepCompleted
                        if references_step(&entry.notes, step)
                            && entry.notes.to_lowercase().contains("approved") =>
                    {
                        state.mark_started(entry.created_at);
                        if let Actor::Human(approver) = entry.actor {
                            state.record_approval(approver, &[]);
                        }
                    }
                    AuditAction::StepForwarded if references_step(&entry.notes, step) => {
                        state.mark_started(entry.created_at);
                    }
                    AuditAction::WorkflowStepCancelled if references_step(&entry.notes, step) => {
                        state.mark_started(entry.created_at);
                        state.cancelled = true;
                    }
                    _ => {}
                }
            }
        }
    }

    /// State of a configured step.
    #[must_use]
    pub fn step(&self, step_id: StepId) -> &StepState {
        self.steps.get(&step_id).unwrap_or(&EMPTY_STATE)
    }

    /// State of the legacy threshold route.
    #[must_use]
    pub fn legacy(&self) -> &StepState {
        &self.legacy
    }
}
