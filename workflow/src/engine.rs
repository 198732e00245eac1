//! The advance engine.
//!
//! Every public operation takes the execution's lock for its whole duration,
//! so at most one create/submit/retry/advance call drives a given execution
//! at a time. Awaiting the step executor is the only suspension point inside
//! the advance loop; a manual step ends the call.

use crate::config::EngineConfig;
use crate::context::FieldMap;
use crate::context::WorkflowContext;
use crate::definition::StepKind;
use crate::error::WorkflowError;
use crate::error::WorkflowResult;
use crate::executor::StepExecutor;
use crate::executor::StepOutcome;
use crate::executor::StepRegistry;
use crate::finalize::FinalizerRegistry;
use crate::handlers::HandlerRegistry;
use crate::output::OutputRegistry;
use crate::report::ExecutionReport;
use crate::state::Execution;
use crate::state::StepExecution;
use crate::state::StepStatus;
use crate::store::ExecutionFilter;
use crate::store::WorkflowStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

/// Identifies a step execution within an execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepRef {
    Id(Uuid),
    Name(String),
}

impl StepRef {
    fn matches(&self, step: &StepExecution) -> bool {
        match self {
            StepRef::Id(id) => step.id == *id,
            StepRef::Name(name) => step.step_name == *name,
        }
    }

    fn describe(&self) -> String {
        match self {
            StepRef::Id(id) => id.to_string(),
            StepRef::Name(name) => name.clone(),
        }
    }
}

impl From<Uuid> for StepRef {
    fn from(id: Uuid) -> Self {
        StepRef::Id(id)
    }
}

impl From<&str> for StepRef {
    fn from(name: &str) -> Self {
        StepRef::Name(name.to_string())
    }
}

impl From<String> for StepRef {
    fn from(name: String) -> Self {
        StepRef::Name(name)
    }
}

pub struct WorkflowEngine {
    store: Arc<dyn WorkflowStore>,
    executor: Arc<dyn StepExecutor>,
    handlers: HandlerRegistry,
    outputs: OutputRegistry,
    finalizers: FinalizerRegistry,
    step_timeout: Duration,
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl WorkflowEngine {
    /// Engine with the standard handlers, output appliers and finalizers.
    pub fn new(store: Arc<dyn WorkflowStore>, executor: Arc<dyn StepExecutor>) -> Self {
        Self {
            store,
            executor,
            handlers: HandlerRegistry::standard(),
            outputs: OutputRegistry::standard(),
            finalizers: FinalizerRegistry::standard(),
            step_timeout: EngineConfig::default().step_timeout(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Engine running the simulated automated steps with the configured
    /// latency and deadline.
    pub fn from_config(store: Arc<dyn WorkflowStore>, config: &EngineConfig) -> Self {
        let executor = Arc::new(StepRegistry::simulated(config.step_latency()));
        Self::new(store, executor).with_step_timeout(config.step_timeout())
    }

    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn with_outputs(mut self, outputs: OutputRegistry) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_finalizers(mut self, finalizers: FinalizerRegistry) -> Self {
        self.finalizers = finalizers;
        self
    }

    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn WorkflowStore> {
        &self.store
    }

    /// Creates the execution with one pending step per step definition and
    /// advances it until it suspends or terminates.
    pub async fn start_execution(
        &self,
        workflow_name: &str,
        requested_by: Option<Uuid>,
    ) -> WorkflowResult<Execution> {
        let definition = self
            .store
            .workflow_by_name(workflow_name)
            .await?
            .ok_or_else(|| WorkflowError::UnknownWorkflow(workflow_name.to_string()))?;
        let execution = Execution::new(&definition, requested_by);
        let execution_id = execution.id;
        let steps = definition
            .ordered_steps()
            .into_iter()
            .map(|step| StepExecution::pending(execution_id, step))
            .collect();

        let lock = self.execution_lock(execution_id);
        let _guard = lock.lock().await;
        self.store.create_execution(execution, steps).await?;
        tracing::info!(%execution_id, workflow = workflow_name, "execution created");
        self.advance_locked(execution_id).await?;
        self.load_execution(execution_id).await
    }

    pub async fn get_execution(&self, execution_id: Uuid) -> WorkflowResult<ExecutionReport> {
        ExecutionReport::load(self.store.as_ref(), execution_id).await
    }

    pub async fn list_executions(&self, filter: &ExecutionFilter) -> WorkflowResult<Vec<Execution>> {
        Ok(self.store.list_executions(filter).await?)
    }

    pub async fn context(&self, execution_id: Uuid) -> WorkflowResult<WorkflowContext> {
        self.load_execution(execution_id).await?;
        let steps = self.store.steps(execution_id).await?;
        Ok(WorkflowContext::from_steps(&steps))
    }

    /// Records human input on a step that is awaiting it, runs the step's
    /// handler, and advances.
    ///
    /// A handler whose identifying fields are missing makes no changes; the
    /// step still completes with the raw input stored. A handler that fails
    /// part-way leaves its writes and any execution link in place, the step
    /// awaiting input, and the error returned; resubmitting runs it again.
    pub async fn submit_input(
        &self,
        execution_id: Uuid,
        step: impl Into<StepRef>,
        input: FieldMap,
        completed_by: Option<Uuid>,
    ) -> WorkflowResult<Execution> {
        let step_ref = step.into();
        let lock = self.execution_lock(execution_id);
        let _guard = lock.lock().await;

        let mut execution = self.load_execution(execution_id).await?;
        let mut step = self.find_step(execution_id, &step_ref).await?;
        if step.status != StepStatus::AwaitingInput {
            return Err(WorkflowError::InvalidState {
                step: step.step_name,
                expected: StepStatus::AwaitingInput,
                actual: step.status,
            });
        }

        match self.handlers.get(&step.step_name) {
            Some(handler) if handler.validate(&input) => {
                let applied = handler
                    .apply(self.store.as_ref(), &mut execution, &input)
                    .await;
                // Links made before a failure are kept with the records they
                // point at. The step stays awaiting input.
                self.store.update_execution(&execution).await?;
                if let Err(err) = applied {
                    tracing::warn!(
                        %execution_id,
                        step = %step.step_name,
                        error = %err,
                        "input handler failed; step left awaiting input"
                    );
                    return Err(err.into());
                }
            }
            Some(handler) => {
                tracing::warn!(
                    %execution_id,
                    step = %step.step_name,
                    required = ?handler.required_fields(),
                    "required fields missing; recording input without changes"
                );
            }
            None => {}
        }

        step.complete_with_input(input, completed_by);
        self.store.update_step(&step).await?;
        tracing::info!(%execution_id, step = %step.step_name, "manual step completed");

        self.advance_locked(execution_id).await?;
        self.load_execution(execution_id).await
    }

    /// Resets a failed step to pending, reopens the execution and advances
    /// from that step. Earlier completed steps are not run again.
    pub async fn retry_step(
        &self,
        execution_id: Uuid,
        step: impl Into<StepRef>,
    ) -> WorkflowResult<Execution> {
        let step_ref = step.into();
        let lock = self.execution_lock(execution_id);
        let _guard = lock.lock().await;

        let mut execution = self.load_execution(execution_id).await?;
        let mut step = self.find_step(execution_id, &step_ref).await?;
        if step.status != StepStatus::Failed {
            return Err(WorkflowError::InvalidState {
                step: step.step_name,
                expected: StepStatus::Failed,
                actual: step.status,
            });
        }

        step.reset_for_retry();
        self.store.update_step(&step).await?;
        execution.reopen();
        self.store.update_execution(&execution).await?;
        tracing::info!(%execution_id, step = %step.step_name, "retrying step");

        self.advance_locked(execution_id).await?;
        self.load_execution(execution_id).await
    }

    /// Advances the execution. Safe to call on a terminal execution or one
    /// whose active step is still running or awaiting input.
    pub async fn advance(&self, execution_id: Uuid) -> WorkflowResult<Execution> {
        let lock = self.execution_lock(execution_id);
        let _guard = lock.lock().await;
        self.advance_locked(execution_id).await?;
        self.load_execution(execution_id).await
    }

    async fn advance_locked(&self, execution_id: Uuid) -> WorkflowResult<()> {
        loop {
            let mut execution = self.load_execution(execution_id).await?;
            if execution.status.is_terminal() {
                return Ok(());
            }
            let steps = self.store.steps(execution_id).await?;
            if let Some(active) = steps.iter().find(|step| step.status.is_active()) {
                tracing::debug!(%execution_id, step = %active.step_name, status = %active.status, "step already active");
                return Ok(());
            }

            let Some(mut step) = steps
                .iter()
                .find(|step| step.status == StepStatus::Pending)
                .cloned()
            else {
                execution.mark_completed();
                self.store.update_execution(&execution).await?;
                tracing::info!(%execution_id, workflow = %execution.workflow_name, "execution completed");
                self.finalize(&execution, &steps).await;
                return Ok(());
            };

            step.mark_running();
            self.store.update_step(&step).await?;
            execution.mark_running(step.step_order);
            self.store.update_execution(&execution).await?;

            if step.step_kind == StepKind::Manual {
                step.mark_awaiting_input();
                self.store.update_step(&step).await?;
                execution.mark_awaiting_input();
                self.store.update_execution(&execution).await?;
                tracing::info!(%execution_id, step = %step.step_name, "awaiting input");
                return Ok(());
            }

            let context = WorkflowContext::from_steps(&steps);
            tracing::debug!(%execution_id, step = %step.step_name, keys = context.len(), "running step");
            match self.run_step(&step.step_name, &context).await {
                StepOutcome::Success(output) => {
                    step.complete_with_output(output);
                    self.store.update_step(&step).await?;
                    tracing::info!(%execution_id, step = %step.step_name, "step completed");
                    self.apply_output(&execution, &step).await;
                }
                StepOutcome::Failure(error) => {
                    tracing::warn!(%execution_id, step = %step.step_name, %error, "step failed");
                    step.mark_failed(error);
                    self.store.update_step(&step).await?;
                    execution.mark_failed();
                    self.store.update_execution(&execution).await?;
                    return Ok(());
                }
            }
        }
    }

    async fn run_step(&self, step: &str, context: &WorkflowContext) -> StepOutcome {
        match tokio::time::timeout(self.step_timeout, self.executor.execute(step, context)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => StepOutcome::Failure(format!("{err:#}")),
            Err(_) => StepOutcome::Failure(format!(
                "Step {step} timed out after {:?}",
                self.step_timeout
            )),
        }
    }

    async fn apply_output(&self, execution: &Execution, step: &StepExecution) {
        let (Some(applier), Some(output)) = (self.outputs.get(&step.step_name), &step.output) else {
            return;
        };
        if let Err(err) = applier.apply(self.store.as_ref(), execution, output).await {
            tracing::warn!(execution_id = %execution.id, step = %step.step_name, error = %err, "failed to apply step output");
        }
    }

    async fn finalize(&self, execution: &Execution, steps: &[StepExecution]) {
        let Some(finalizer) = self.finalizers.get(&execution.workflow_name) else {
            return;
        };
        let context = WorkflowContext::from_steps(steps);
        if let Err(err) = finalizer
            .finalize(self.store.as_ref(), execution, &context)
            .await
        {
            tracing::warn!(execution_id = %execution.id, error = %format!("{err:#}"), "finalizer failed");
        }
    }

    async fn load_execution(&self, execution_id: Uuid) -> WorkflowResult<Execution> {
        self.store
            .execution(execution_id)
            .await?
            .ok_or(WorkflowError::ExecutionNotFound(execution_id))
    }

    async fn find_step(
        &self,
        execution_id: Uuid,
        step_ref: &StepRef,
    ) -> WorkflowResult<StepExecution> {
        self.store
            .steps(execution_id)
            .await?
            .into_iter()
            .find(|step| step_ref.matches(step))
            .ok_or_else(|| WorkflowError::StepNotFound {
                execution_id,
                step: step_ref.describe(),
            })
    }

    /// Lock shared by every call touching `execution_id`. Entries nobody else
    /// holds are dropped on the way.
    fn execution_lock(&self, execution_id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(execution_id).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::StepDefinition;
    use crate::definition::WorkflowDefinition;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn two_auto_steps() -> WorkflowDefinition {
        let step = |order: u32, name: &str| StepDefinition {
            order,
            name: name.to_string(),
            label: name.to_string(),
            kind: StepKind::Auto,
            description: String::new(),
        };
        WorkflowDefinition {
            id: Uuid::new_v4(),
            name: "ping".to_string(),
            description: String::new(),
            expected_keys: Vec::new(),
            steps: vec![step(1, "first"), step(2, "second")],
        }
    }

    struct Slow;

    #[async_trait::async_trait]
    impl StepExecutor for Slow {
        async fn execute(
            &self,
            _step: &str,
            _context: &WorkflowContext,
        ) -> anyhow::Result<StepOutcome> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(StepOutcome::success([("late", "true")]))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn executor_timeout_fails_the_step() {
        let store = Arc::new(MemoryStore::new());
        store.insert_workflow(two_auto_steps()).await.unwrap();
        let engine =
            WorkflowEngine::new(store.clone(), Arc::new(Slow)).with_step_timeout(Duration::from_secs(1));

        let execution = engine.start_execution("ping", None).await.unwrap();

        assert_eq!(execution.status, crate::state::ExecutionStatus::Failed);
        let steps = store.steps(execution.id).await.unwrap();
        assert_eq!(steps[0].status, StepStatus::Failed);
        assert!(
            steps[0]
                .error
                .as_deref()
                .is_some_and(|error| error.contains("timed out"))
        );
        assert_eq!(steps[1].status, StepStatus::Pending);
    }

    #[test]
    fn unused_locks_are_pruned() {
        let engine = WorkflowEngine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(StepRegistry::new()),
        );
        let held = engine.execution_lock(Uuid::new_v4());
        drop(engine.execution_lock(Uuid::new_v4()));
        let _third = engine.execution_lock(Uuid::new_v4());

        let locks = engine.locks.lock().unwrap();
        assert_eq!(locks.len(), 2);
        assert!(locks.values().any(|lock| Arc::ptr_eq(lock, &held)));
    }

    #[tokio::test]
    async fn unknown_workflow_is_not_found() {
        let engine = WorkflowEngine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(StepRegistry::new()),
        );
        let err = engine.start_execution("nope", None).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }
}
