//! Job lifecycle status and its transition table.
//!
//! Discriminants match the seed data order (1-based) in the `job_statuses`
//! lookup table. The only legal transitions are listed in [`TRANSITIONS`];
//! every status change in the system goes through
//! [`JobStatus::check_transition`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

/// Lifecycle status of a job.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending = 1,
    InProgress = 2,
    Done = 3,
    Failed = 4,
}

/// Every permitted `(from, to)` pair.
///
/// `Pending -> Failed` covers a dispatch that never reached the worker.
pub const TRANSITIONS: [(JobStatus, JobStatus); 4] = [
    (JobStatus::Pending, JobStatus::InProgress),
    (JobStatus::Pending, JobStatus::Failed),
    (JobStatus::InProgress, JobStatus::Done),
    (JobStatus::InProgress, JobStatus::Failed),
];

impl JobStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::InProgress,
        JobStatus::Done,
        JobStatus::Failed,
    ];

    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Resolve a database status ID.
    pub fn from_id(id: StatusId) -> Option<Self> {
        JobStatus::ALL.into_iter().find(|s| s.id() == id)
    }

    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    /// `Done` and `Failed` accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    /// Whether `self -> to` appears in the transition table.
    pub fn can_transition_to(self, to: JobStatus) -> bool {
        TRANSITIONS.contains(&(self, to))
    }

    /// Validate `self -> to` against the transition table.
    pub fn check_transition(self, to: JobStatus) -> Result<(), CoreError> {
        if self.can_transition_to(to) {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!(
                "Job cannot move from {self} to {to}"
            )))
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<JobStatus> for StatusId {
    fn from(value: JobStatus) -> Self {
        value as StatusId
    }
}

impl TryFrom<StatusId> for JobStatus {
    type Error = CoreError;

    fn try_from(value: StatusId) -> Result<Self, Self::Error> {
        JobStatus::from_id(value)
            .ok_or_else(|| CoreError::Internal(format!("Unknown job status id {value}")))
    }
}
