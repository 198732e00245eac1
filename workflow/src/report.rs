use crate::context::WorkflowContext;
use crate::error::WorkflowError;
use crate::error::WorkflowResult;
use crate::state::Execution;
use crate::state::StepExecution;
use crate::store::WorkflowStore;
use serde::Serialize;
use uuid::Uuid;

/// Read view of one execution: the record, its steps, and the names of the
/// entities it links.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub execution: Execution,
    pub workflow_description: String,
    pub organization_name: Option<String>,
    pub user_email: Option<String>,
    pub requested_by_email: Option<String>,
    pub steps: Vec<StepExecution>,
    pub context: WorkflowContext,
    /// Expected context keys of the workflow not yet present.
    pub missing_context_keys: Vec<String>,
}

impl ExecutionReport {
    pub async fn load(store: &dyn WorkflowStore, execution_id: Uuid) -> WorkflowResult<Self> {
        let execution = store
            .execution(execution_id)
            .await?
            .ok_or(WorkflowError::ExecutionNotFound(execution_id))?;
        let steps = store.steps(execution_id).await?;
        let context = WorkflowContext::from_steps(&steps);

        let (workflow_description, missing_context_keys) =
            match store.workflow(execution.workflow_id).await? {
                Some(definition) => (
                    definition.description.clone(),
                    definition.missing_context_keys(&context),
                ),
                None => (String::new(), Vec::new()),
            };
        let organization_name = match execution.organization_id {
            Some(id) => store.organization(id).await?.map(|org| org.name),
            None => None,
        };
        let user_email = match execution.user_id {
            Some(id) => store.user(id).await?.map(|user| user.email),
            None => None,
        };
        let requested_by_email = match execution.requested_by {
            Some(id) => store.user(id).await?.map(|user| user.email),
            None => None,
        };

        Ok(Self {
            execution,
            workflow_description,
            organization_name,
            user_email,
            requested_by_email,
            steps,
            context,
            missing_context_keys,
        })
    }

    /// The step currently holding the execution, if any.
    pub fn active_step(&self) -> Option<&StepExecution> {
        self.steps.iter().find(|step| step.status.is_active())
    }
}
