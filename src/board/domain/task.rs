//! Task record and the fixed kanban status enumeration.

use super::{ParseTaskStatusError, ProjectId, TaskId};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Kanban status of a task. Every task holds exactly one.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started.
    #[default]
    Todo,
    /// Work is under way.
    InProgress,
    /// Awaiting inspection or sign-off.
    Review,
    /// Finished. Satisfies any dependency pointing at it.
    Completed,
    /// Held up by something outside the board.
    Blocked,
}

impl TaskStatus {
    /// All statuses in board column order.
    pub const ALL: [Self; 5] = [
        Self::Todo,
        Self::InProgress,
        Self::Review,
        Self::Completed,
        Self::Blocked,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Review => "review",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
        }
    }

    /// Returns true for [`TaskStatus::Completed`].
    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Parses a raw status value, falling back to [`TaskStatus::Todo`] when
    /// the value is missing or unrecognized.
    #[must_use]
    pub fn from_lenient(value: Option<&str>) -> Self {
        value
            .and_then(|raw| Self::try_from(raw).ok())
            .unwrap_or_default()
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "todo" => Ok(Self::Todo),
            "in_progress" => Ok(Self::InProgress),
            "review" => Ok(Self::Review),
            "completed" => Ok(Self::Completed),
            "blocked" => Ok(Self::Blocked),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn deserialize_lenient_status<'de, D>(deserializer: D) -> Result<TaskStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(TaskStatus::from_lenient(raw.as_deref()))
}

/// Task record as delivered by the project data service.
///
/// Only `id`, `project_id`, `status` and `dependency_id` carry invariants
/// on the board; the remaining fields are descriptive payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    project_id: ProjectId,
    title: String,
    #[serde(default, deserialize_with = "deserialize_lenient_status")]
    status: TaskStatus,
    #[serde(default)]
    dependency_id: Option<TaskId>,
    #[serde(default)]
    assignee: Option<String>,
    #[serde(default)]
    start_date: Option<NaiveDate>,
    #[serde(default)]
    due_date: Option<NaiveDate>,
    #[serde(default)]
    labels: Vec<String>,
}

impl Task {
    /// Creates a task in [`TaskStatus::Todo`] with no dependency.
    #[must_use]
    pub fn new(id: TaskId, project_id: ProjectId, title: impl Into<String>) -> Self {
        Self {
            id,
            project_id,
            title: title.into(),
            status: TaskStatus::Todo,
            dependency_id: None,
            assignee: None,
            start_date: None,
            due_date: None,
            labels: Vec::new(),
        }
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the predecessor task.
    #[must_use]
    pub fn with_dependency(mut self, dependency_id: TaskId) -> Self {
        self.dependency_id = Some(dependency_id);
        self
    }

    /// Sets the assignee.
    #[must_use]
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    /// Sets the planned start and due dates.
    #[must_use]
    pub fn with_schedule(mut self, start_date: NaiveDate, due_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self.due_date = Some(due_date);
        self
    }

    /// Sets the labels.
    #[must_use]
    pub fn with_labels(mut self, labels: impl IntoIterator<Item = String>) -> Self {
        self.labels = labels.into_iter().collect();
        self
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the owning project.
    #[must_use]
    pub const fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the current status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the predecessor task, if any.
    #[must_use]
    pub const fn dependency_id(&self) -> Option<TaskId> {
        self.dependency_id
    }

    /// Returns the assignee, if any.
    #[must_use]
    pub fn assignee(&self) -> Option<&str> {
        self.assignee.as_deref()
    }

    /// Returns the planned start date, if any.
    #[must_use]
    pub const fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    /// Returns the due date, if any.
    #[must_use]
    pub const fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    /// Returns the labels.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Replaces the status in place.
    pub const fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
    }

    /// Replaces or clears the predecessor task in place.
    pub const fn set_dependency(&mut self, dependency_id: Option<TaskId>) {
        self.dependency_id = dependency_id;
    }
}
