use crate::context::FieldMap;
use crate::definition::StepDefinition;
use crate::definition::StepKind;
use crate::definition::WorkflowDefinition;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    AwaitingInput,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::AwaitingInput => "awaiting_input",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExecutionStatus::Pending),
            "running" => Ok(ExecutionStatus::Running),
            "awaiting_input" => Ok(ExecutionStatus::AwaitingInput),
            "completed" => Ok(ExecutionStatus::Completed),
            "failed" => Ok(ExecutionStatus::Failed),
            other => anyhow::bail!("unknown execution status {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    AwaitingInput,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    /// Running and awaiting_input steps hold the execution; at most one step
    /// per execution may be active.
    pub fn is_active(self) -> bool {
        matches!(self, StepStatus::Running | StepStatus::AwaitingInput)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::AwaitingInput => "awaiting_input",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One running instance of a workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Execution {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub workflow_name: String,
    pub organization_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub requested_by: Option<Uuid>,
    pub status: ExecutionStatus,
    pub current_step_order: u32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Execution {
    pub fn new(definition: &WorkflowDefinition, requested_by: Option<Uuid>) -> Self {
        let current_step_order = definition
            .ordered_steps()
            .first()
            .map(|step| step.order)
            .unwrap_or(1);
        Self {
            id: Uuid::new_v4(),
            workflow_id: definition.id,
            workflow_name: definition.name.clone(),
            organization_id: None,
            user_id: None,
            requested_by,
            status: ExecutionStatus::Pending,
            current_step_order,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn mark_running(&mut self, step_order: u32) {
        self.status = ExecutionStatus::Running;
        self.current_step_order = step_order;
    }

    pub fn mark_awaiting_input(&mut self) {
        self.status = ExecutionStatus::AwaitingInput;
    }

    pub fn mark_completed(&mut self) {
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self) {
        self.status = ExecutionStatus::Failed;
    }

    /// Leaves the failed state after a step retry.
    pub fn reopen(&mut self) {
        self.status = ExecutionStatus::Running;
        self.completed_at = None;
    }
}

/// Per-execution progress record for one step definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepExecution {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub step_order: u32,
    pub step_name: String,
    pub step_label: String,
    pub step_kind: StepKind,
    pub status: StepStatus,
    pub manual_input: Option<FieldMap>,
    pub output: Option<FieldMap>,
    pub error: Option<String>,
    pub completed_by: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepExecution {
    pub fn pending(execution_id: Uuid, definition: &StepDefinition) -> Self {
        Self {
            id: Uuid::new_v4(),
            execution_id,
            step_order: definition.order,
            step_name: definition.name.clone(),
            step_label: definition.label.clone(),
            step_kind: definition.kind,
            status: StepStatus::Pending,
            manual_input: None,
            output: None,
            error: None,
            completed_by: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = StepStatus::Running;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    pub fn mark_awaiting_input(&mut self) {
        self.status = StepStatus::AwaitingInput;
    }

    pub fn complete_with_output(&mut self, output: FieldMap) {
        self.status = StepStatus::Completed;
        self.output = Some(output);
        self.error = None;
        self.completed_at = Some(Utc::now());
    }

    pub fn complete_with_input(&mut self, input: FieldMap, completed_by: Option<Uuid>) {
        self.status = StepStatus::Completed;
        self.manual_input = Some(input);
        self.completed_by = completed_by;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = StepStatus::Failed;
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
    }

    pub fn reset_for_retry(&mut self) {
        self.status = StepStatus::Pending;
        self.error = None;
        self.started_at = None;
        self.completed_at = None;
    }
}
