use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Lifecycle status of one upload attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Uploading,
    Completed,
    Failed,
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TaskStatus::Uploading => write!(f, "uploading"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploading" => Ok(TaskStatus::Uploading),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid task status: {}", s)),
        }
    }
}

/// Queue section holding a task. A task id lives in exactly one section at a time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskSection {
    Pending,
    Failed,
    Completed,
}

impl Display for TaskSection {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TaskSection::Pending => write!(f, "pending"),
            TaskSection::Failed => write!(f, "failed"),
            TaskSection::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for TaskSection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskSection::Pending),
            "failed" => Ok(TaskSection::Failed),
            "completed" => Ok(TaskSection::Completed),
            _ => Err(anyhow::anyhow!("Invalid task section: {}", s)),
        }
    }
}
