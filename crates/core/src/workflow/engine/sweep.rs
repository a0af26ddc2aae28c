//! Timeout sweep over in-flight requests.

use chrono::{DateTime, Duration, Utc};

use procura_shared::types::{RequestId, StepId};

use crate::audit::notes::step_notes;
use crate::audit::{Actor, AuditAction, ExecutionStatus};
use crate::model::StepType;
use crate::notify::Notifier;
use crate::store::WorkflowStore;
use crate::workflow::error::WorkflowError;
use crate::workflow::tokens::TokenPurpose;
use crate::workflow::types::RequestStatus;

use super::{UnitOfWork, WorkflowEngine};

/// A step the sweep marked as delayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverdueStep {
    /// The request.
    pub request_id: RequestId,
    /// The step that ran past its timeout.
    pub step_id: StepId,
}

impl<S, N> WorkflowEngine<S, N>
where
    S: WorkflowStore,
    N: Notifier,
{
    /// Marks in-flight steps past their `timeout_hours` as delayed and
    /// reminds the approvers who have not acted.
    ///
    /// A step is reported once; later sweeps skip it.
    pub fn sweep_overdue(&self, now: DateTime<Utc>) -> Result<Vec<OverdueStep>, WorkflowError> {
        let mut overdue = Vec::new();
        for request in self.store.in_flight_requests()? {
            let found = self.with_request_at(request.id, now, |uow| self.sweep_request(uow))?;
            overdue.extend(found);
        }
        if !overdue.is_empty() {
            tracing::info!(count = overdue.len(), "Overdue steps delayed");
        }
        Ok(overdue)
    }

    fn sweep_request(&self, uow: &mut UnitOfWork) -> Result<Vec<OverdueStep>, WorkflowError> {
        if uow.request.status != RequestStatus::PendingApproval {
            return Ok(Vec::new());
        }
        let ctx = self.context(uow)?;
        let mut overdue = Vec::new();

        for step in &ctx.steps {
            let state = ctx.state(step);
            let (Some(hours), Some(started_at)) = (step.timeout_hours, state.started_at) else {
                continue;
            };
            if !state.is_in_flight() || state.delayed {
                continue;
            }
            if uow.now < started_at + Duration::hours(i64::from(hours)) {
                continue;
            }

            let delayed = uow.execution(Some(step.id), ExecutionStatus::Delayed, Actor::System);
            uow.record(delayed);
            uow.log(
                Actor::System,
                AuditAction::WorkflowStepDelayed,
                step_notes(step, &format!("overdue after {hours}h")),
            );

            let purpose = match step.step_type {
                StepType::Verification => TokenPurpose::Verification,
                StepType::Approval | StepType::Notification => TokenPurpose::Approval,
            };
            let principals = state.approving_principals();
            for user_id in state.forwarded.keys().filter(|u| !principals.contains(u)) {
                uow.request_action(*user_id, Some(step.id), step.label(), purpose);
            }
            tracing::warn!(request_id = %uow.request.id, step_id = %step.id, hours, "Step overdue");
            overdue.push(OverdueStep {
                request_id: uow.request.id,
                step_id: step.id,
            });
        }
        Ok(overdue)
    }
}
