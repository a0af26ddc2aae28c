//! Outbound notifications.
//!
//! The engine queues notices while an operation runs and hands them to a
//! [`Notifier`] only after the operation's changes are committed. Delivery
//! failures are logged and never undo the transition.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use procura_shared::types::{RequestId, UserId};

/// Errors raised by a notification channel.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The recipient could not be reached.
    #[error("Recipient {0} unreachable")]
    Unreachable(UserId),

    /// Transport failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Asks an approver or verifier to act on a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalNotice {
    /// Request awaiting action.
    pub request_id: RequestId,
    /// Recipient.
    pub approver_id: UserId,
    /// Human-readable label of the step.
    pub step_label: String,
    /// One-shot token for acting from the message.
    pub token: Uuid,
}

/// Tells the requester what happened to their request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeNotice {
    /// The request.
    pub request_id: RequestId,
    /// Recipient.
    pub employee_id: UserId,
    /// Short status tag, e.g. `approved` or `rejected`.
    pub status_tag: String,
    /// Rejection reason or procurement notes.
    pub reason: Option<String>,
}

/// A queued notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// To an approver.
    Approval(ApprovalNotice),
    /// To the requester.
    Employee(EmployeeNotice),
}

/// Delivery channel for notices.
pub trait Notifier: Send + Sync {
    /// Sends an approval request.
    fn send_approval_request(&self, notice: &ApprovalNotice) -> Result<(), NotifyError>;

    /// Sends a status update to the requester.
    fn send_employee_notification(&self, notice: &EmployeeNotice) -> Result<(), NotifyError>;
}

/// Delivers `notifications` in order. Failures are logged and skipped.
pub fn dispatch<N>(notifier: &N, notifications: Vec<Notification>)
where
    N: Notifier + ?Sized,
{
    for notification in notifications {
        let result = match &notification {
            Notification::Approval(notice) => notifier.send_approval_request(notice),
            Notification::Employee(notice) => notifier.send_employee_notification(notice),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, ?notification, "Notification delivery failed");
        }
    }
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn send_approval_request(&self, notice: &ApprovalNotice) -> Result<(), NotifyError> {
        tracing::info!(
            request_id = %notice.request_id,
            approver_id = %notice.approver_id,
            step = %notice.step_label,
            "Approval requested"
        );
        Ok(())
    }

    fn send_employee_notification(&self, notice: &EmployeeNotice) -> Result<(), NotifyError> {
        tracing::info!(
            request_id = %notice.request_id,
            employee_id = %notice.employee_id,
            status = %notice.status_tag,
            reason = notice.reason.as_deref().unwrap_or_default(),
            "Employee notified"
        );
        Ok(())
    }
}

/// Notifier that keeps every notice in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: Mutex<bool>,
}

impl RecordingNotifier {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following send fail without recording.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    /// Every notice recorded so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    /// Approval notices recorded so far.
    #[must_use]
    pub fn approval_notices(&self) -> Vec<ApprovalNotice> {
        self.sent
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::Approval(notice) => Some(notice.clone()),
                Notification::Employee(_) => None,
            })
            .collect()
    }

    /// Approval notices sent to `user`.
    #[must_use]
    pub fn approval_notices_for(&self, user: UserId) -> Vec<ApprovalNotice> {
        self.approval_notices()
            .into_iter()
            .filter(|n| n.approver_id == user)
            .collect()
    }

    /// Employee notices recorded so far.
    #[must_use]
    pub fn employee_notices(&self) -> Vec<EmployeeNotice> {
        self.sent
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::Employee(notice) => Some(notice.clone()),
                Notification::Approval(_) => None,
            })
            .collect()
    }

    /// Forgets everything recorded.
    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    fn record(&self, notification: Notification, recipient: UserId) -> Result<(), NotifyError> {
        if *self.failing.lock() {
            return Err(NotifyError::Unreachable(recipient));
        }
        self.sent.lock().push(notification);
        Ok(())
    }
}

impl Notifier for RecordingNotifier {
    fn send_approval_request(&self, notice: &ApprovalNotice) -> Result<(), NotifyError> {
        self.record(Notification::Approval(notice.clone()), notice.approver_id)
    }

    fn send_employee_notification(&self, notice: &EmployeeNotice) -> Result<(), NotifyError> {
        self.record(Notification::Employee(notice.clone()), notice.employee_id)
    }
}
