//! Workflow orchestration.
//!
//! [`WorkflowEngine`] drives requests through submission, procurement
//! verification, dynamic or legacy approval, and procurement fulfilment.
//! Every mutating operation holds its request's lock from loading the
//! snapshot to committing it, and commits all of its writes at once.
//! Notifications go out after the commit.

mod approvals;
mod delegations;
mod dynamic;
mod legacy_flow;
mod lifecycle;
mod sweep;
mod unit;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

use procura_shared::types::{RequestId, UserId};
use procura_shared::{MissingFieldPolicy, WorkflowConfig};

use crate::audit::{AuditLogEntry, StepExecution};
use crate::model::{Request, Role, User, WorkflowStep};
use crate::notify::{self, Notifier};
use crate::store::{Changeset, WorkflowStore};
use crate::workflow::error::WorkflowError;
use crate::workflow::evaluator::{RequestContext, StepEvaluator};
use crate::workflow::legacy::LegacyThresholds;
use crate::workflow::types::RequestStatus;

pub use sweep::OverdueStep;
pub(crate) use unit::UnitOfWork;

/// Engine tunables, usually taken from [`WorkflowConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Legacy routing thresholds.
    pub thresholds: LegacyThresholds,
    /// Behaviour of conditions on absent fields.
    pub missing_field_policy: MissingFieldPolicy,
    /// Lifetime of approval tokens.
    pub approval_token_ttl_hours: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&WorkflowConfig::default())
    }
}

impl From<&WorkflowConfig> for EngineSettings {
    fn from(config: &WorkflowConfig) -> Self {
        Self {
            thresholds: LegacyThresholds::from(config),
            missing_field_policy: config.missing_field_policy,
            approval_token_ttl_hours: config.approval_token_ttl_hours,
        }
    }
}

/// The approval workflow engine.
pub struct WorkflowEngine<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    settings: EngineSettings,
    locks: DashMap<RequestId, Arc<Mutex<()>>>,
}

impl<S, N> WorkflowEngine<S, N>
where
    S: WorkflowStore,
    N: Notifier,
{
    /// Creates an engine over a store and a notification channel.
    pub fn new(store: Arc<S>, notifier: Arc<N>, settings: EngineSettings) -> Self {
        Self {
            store,
            notifier,
            settings,
            locks: DashMap::new(),
        }
    }

    /// The engine's settings.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn evaluator(&self) -> StepEvaluator<'_, S> {
        StepEvaluator::new(&*self.store, self.settings.missing_field_policy)
    }

    fn context(&self, uow: &UnitOfWork) -> Result<RequestContext, WorkflowError> {
        self.evaluator()
            .context(&uow.request, &uow.audit, &uow.executions, uow.now)
    }

    fn lock_for(&self, request_id: RequestId) -> Arc<Mutex<()>> {
        self.locks.entry(request_id).or_default().clone()
    }

    /// Runs `op` on a locked snapshot of the request at `now` and commits it.
    fn with_request_at<T>(
        &self,
        request_id: RequestId,
        now: DateTime<Utc>,
        op: impl FnOnce(&mut UnitOfWork) -> Result<T, WorkflowError>,
    ) -> Result<T, WorkflowError> {
        let lock = self.lock_for(request_id);
        let _guard = lock.lock();
        let mut uow = UnitOfWork::load(
            &*self.store,
            request_id,
            now,
            self.settings.approval_token_ttl_hours,
        )?;
        let value = op(&mut uow)?;
        self.commit(uow)?;
        Ok(value)
    }

    fn with_request<T>(
        &self,
        request_id: RequestId,
        op: impl FnOnce(&mut UnitOfWork) -> Result<T, WorkflowError>,
    ) -> Result<T, WorkflowError> {
        self.with_request_at(request_id, Utc::now(), op)
    }

    fn commit(&self, uow: UnitOfWork) -> Result<(), WorkflowError> {
        let request_id = uow.request.id;
        let (changes, outbox) = uow.into_parts();
        self.commit_changes(changes)?;
        tracing::trace!(request_id = %request_id, notices = outbox.len(), "Dispatching notifications");
        notify::dispatch(&*self.notifier, outbox);
        Ok(())
    }

    fn commit_changes(&self, changes: Changeset) -> Result<(), WorkflowError> {
        if changes.is_empty() {
            return Ok(());
        }
        self.store.commit(changes).map_err(|e| {
            tracing::error!(error = %e, "Commit failed");
            WorkflowError::from(e)
        })
    }

    fn require_user(&self, user_id: UserId) -> Result<User, WorkflowError> {
        self.store
            .find_user(user_id)?
            .ok_or(WorkflowError::UserNotFound(user_id))
    }

    fn require_procurement(&self, user_id: UserId) -> Result<User, WorkflowError> {
        let user = self.require_user(user_id)?;
        if !user.is_active || !matches!(user.role, Role::Procurement | Role::Admin) {
            return Err(WorkflowError::InsufficientRole {
                user_id,
                required: "procurement or admin",
            });
        }
        Ok(user)
    }

    fn read_context(&self, request_id: RequestId) -> Result<RequestContext, WorkflowError> {
        let request = self.request(request_id)?;
        let audit = self.store.audit_log(request_id)?;
        let executions = self.store.step_executions(request_id)?;
        self.evaluator()
            .context(&request, &audit, &executions, Utc::now())
    }

    /// Loads a request.
    pub fn request(&self, request_id: RequestId) -> Result<Request, WorkflowError> {
        self.store
            .find_request(request_id)?
            .ok_or(WorkflowError::RequestNotFound(request_id))
    }

    /// Audit rows of a request, oldest first.
    pub fn audit_log(&self, request_id: RequestId) -> Result<Vec<AuditLogEntry>, WorkflowError> {
        self.request(request_id)?;
        Ok(self.store.audit_log(request_id)?)
    }

    /// Step executions of a request, oldest first.
    pub fn step_executions(&self, request_id: RequestId) -> Result<Vec<StepExecution>, WorkflowError> {
        self.request(request_id)?;
        Ok(self.store.step_executions(request_id)?)
    }

    /// Returns true if `user_id` may approve or reject the request now.
    pub fn can_approve(&self, request_id: RequestId, user_id: UserId) -> Result<bool, WorkflowError> {
        let ctx = self.read_context(request_id)?;
        if ctx.request.status != RequestStatus::PendingApproval {
            return Ok(false);
        }
        let Some(user) = self.store.find_user(user_id)? else {
            return Ok(false);
        };
        if ctx.is_legacy() {
            return self.legacy_can_approve(&ctx, &user);
        }
        Ok(user.is_active
            && self
                .evaluator()
                .current_step_for_approver(&ctx, user_id)?
                .is_some())
    }

    /// The dynamic step `user_id` may act on now, if any.
    pub fn current_step_for_approver(
        &self,
        request_id: RequestId,
        user_id: UserId,
    ) -> Result<Option<WorkflowStep>, WorkflowError> {
        let ctx = self.read_context(request_id)?;
        if ctx.request.status != RequestStatus::PendingApproval {
            return Ok(None);
        }
        self.evaluator().current_step_for_approver(&ctx, user_id)
    }

    /// Returns true if every approval the request needs has been given.
    pub fn all_approvals_complete(&self, request_id: RequestId) -> Result<bool, WorkflowError> {
        let ctx = self.read_context(request_id)?;
        if ctx.is_legacy() {
            return self.legacy_complete(&ctx);
        }
        self.evaluator().all_required_complete(&ctx)
    }
}
