use async_trait::async_trait;
use hyopps_workflow::AutomatedStep;
use hyopps_workflow::Environment;
use hyopps_workflow::ErrorKind;
use hyopps_workflow::Execution;
use hyopps_workflow::ExecutionFilter;
use hyopps_workflow::ExecutionStatus;
use hyopps_workflow::FieldMap;
use hyopps_workflow::FieldValue;
use hyopps_workflow::FinalizerRegistry;
use hyopps_workflow::HandlerRegistry;
use hyopps_workflow::ManualInputHandler;
use hyopps_workflow::MemoryStore;
use hyopps_workflow::NEW_PARTNER;
use hyopps_workflow::NEW_PARTNER_USER;
use hyopps_workflow::StepOutcome;
use hyopps_workflow::StepRegistry;
use hyopps_workflow::StepStatus;
use hyopps_workflow::StoreError;
use hyopps_workflow::Tool;
use hyopps_workflow::WorkflowContext;
use hyopps_workflow::WorkflowEngine;
use hyopps_workflow::WorkflowError;
use hyopps_workflow::WorkflowStore;
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use uuid::Uuid;

struct Harness {
    store: Arc<MemoryStore>,
    engine: Arc<WorkflowEngine>,
    admin: Uuid,
}

async fn harness(executor: StepRegistry) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let summary = hyopps_workflow::seed(store.as_ref(), Vec::new())
        .await
        .expect("seed");
    let engine = WorkflowEngine::new(store.clone(), Arc::new(executor));
    Harness {
        store,
        engine: Arc::new(engine),
        admin: summary.admin_id,
    }
}

fn simulated() -> StepRegistry {
    StepRegistry::simulated(Duration::ZERO)
}

fn fields(pairs: &[(&str, &str)]) -> FieldMap {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), FieldValue::from(*value)))
        .collect()
}

fn acme_companies() -> FieldMap {
    fields(&[
        ("organization_name", "Acme"),
        ("studio_company_id_test", "t1"),
        ("studio_company_id_prod", "p1"),
    ])
}

async fn assert_at_most_one_active(store: &MemoryStore, execution_id: Uuid) {
    let active = store
        .steps(execution_id)
        .await
        .expect("steps")
        .iter()
        .filter(|step| step.status.is_active())
        .count();
    assert!(active <= 1, "{active} active steps in {execution_id}");
}

/// Drives a new_partner execution for Acme to completion.
async fn onboard_acme(h: &Harness) -> Uuid {
    let execution = h
        .engine
        .start_execution(NEW_PARTNER, Some(h.admin))
        .await
        .expect("start");
    h.engine
        .submit_input(execution.id, "input_studio_companies", acme_companies(), Some(h.admin))
        .await
        .expect("companies");
    h.engine
        .submit_input(
            execution.id,
            "trigger_infrabot",
            fields(&[("keycloak_cluster", "eu-1"), ("keycloak_confirmed", "true")]),
            Some(h.admin),
        )
        .await
        .expect("infrabot");
    let done = h
        .engine
        .submit_input(
            execution.id,
            "lms_setup",
            fields(&[("lms_confirmed", "true")]),
            Some(h.admin),
        )
        .await
        .expect("lms");
    assert_eq!(done.status, ExecutionStatus::Completed);
    execution.id
}

struct Counting {
    calls: Arc<AtomicUsize>,
    failures: usize,
    output: &'static [(&'static str, &'static str)],
}

#[async_trait]
impl AutomatedStep for Counting {
    async fn run(&self, _context: &WorkflowContext) -> anyhow::Result<StepOutcome> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            anyhow::bail!("metabase unavailable");
        }
        Ok(StepOutcome::success(self.output.iter().copied()))
    }
}

#[tokio::test]
async fn steps_are_created_one_per_definition_in_order() {
    let h = harness(simulated()).await;
    for name in [NEW_PARTNER, NEW_PARTNER_USER] {
        let definition = h
            .store
            .workflow_by_name(name)
            .await
            .unwrap()
            .expect("definition");
        let execution = h.engine.start_execution(name, Some(h.admin)).await.unwrap();
        let steps = h.store.steps(execution.id).await.unwrap();

        let expected: Vec<(u32, String)> = definition
            .ordered_steps()
            .into_iter()
            .map(|step| (step.order, step.name.clone()))
            .collect();
        let actual: Vec<(u32, String)> = steps
            .iter()
            .map(|step| (step.step_order, step.step_name.clone()))
            .collect();
        assert_eq!(actual, expected);
        assert_eq!(execution.workflow_id, definition.id);
    }
}

#[tokio::test]
async fn happy_path_creates_partner_and_studio_companies() {
    let h = harness(simulated()).await;
    let execution = h
        .engine
        .start_execution(NEW_PARTNER, Some(h.admin))
        .await
        .unwrap();
    assert_eq!(execution.status, ExecutionStatus::AwaitingInput);
    assert_eq!(execution.current_step_order, 1);

    let execution = h
        .engine
        .submit_input(execution.id, "input_studio_companies", acme_companies(), Some(h.admin))
        .await
        .unwrap();

    let organizations = h.store.list_organizations().await.unwrap();
    assert_eq!(organizations.len(), 1);
    let acme = &organizations[0];
    assert_eq!(acme.name, "Acme");
    assert_eq!(execution.organization_id, Some(acme.id));

    let mut companies: Vec<(Environment, String)> = h
        .store
        .studio_companies(acme.id)
        .await
        .unwrap()
        .into_iter()
        .map(|company| (company.environment, company.studio_id))
        .collect();
    companies.sort_by_key(|(environment, _)| environment.suffix());
    assert_eq!(
        companies,
        vec![
            (Environment::Prod, "p1".to_string()),
            (Environment::Test, "t1".to_string()),
        ]
    );

    let report = h.engine.get_execution(execution.id).await.unwrap();
    let active = report.active_step().expect("active step");
    assert_eq!(active.step_name, "trigger_infrabot");
    assert_eq!(active.status, StepStatus::AwaitingInput);
    assert_eq!(report.context.text("organization_name"), Some("Acme"));
    assert_eq!(report.organization_name.as_deref(), Some("Acme"));

    let first = &report.steps[0];
    assert_eq!(first.status, StepStatus::Completed);
    assert_eq!(first.completed_by, Some(h.admin));
    assert_eq!(first.manual_input.as_ref(), Some(&acme_companies()));
}

#[tokio::test]
async fn completion_sets_timestamp_and_finalizes_once() {
    let h = harness(simulated()).await;
    let execution_id = onboard_acme(&h).await;

    let report = h.engine.get_execution(execution_id).await.unwrap();
    assert_eq!(report.execution.status, ExecutionStatus::Completed);
    assert!(report.execution.completed_at.is_some());
    assert!(report.steps.iter().all(|step| step.status == StepStatus::Completed));
    assert!(report.missing_context_keys.is_empty(), "{:?}", report.missing_context_keys);

    let organization_id = report.execution.organization_id.expect("organization");
    let integration = h
        .store
        .integration(organization_id)
        .await
        .unwrap()
        .expect("integration");
    assert!(integration.keycloak_confirmed);
    assert!(integration.lms_confirmed);
    assert_eq!(integration.keycloak_cluster.as_deref(), Some("eu-1"));
    assert_eq!(
        integration.metabase_collection_id.as_deref(),
        report.context.text("metabase_collection_id")
    );

    // A second finalizer run must not duplicate anything.
    let finalizers = FinalizerRegistry::standard();
    finalizers
        .get(NEW_PARTNER)
        .expect("finalizer")
        .finalize(h.store.as_ref(), &report.execution, &report.context)
        .await
        .unwrap();
    let mut tools: Vec<Tool> = h
        .store
        .system_groups(organization_id)
        .await
        .unwrap()
        .into_iter()
        .map(|group| group.tool)
        .collect();
    tools.sort_by_key(|tool| tool.as_str());
    assert_eq!(tools, vec![Tool::Metabase, Tool::Slack, Tool::Teams]);

    // Advancing a terminal execution changes nothing.
    let again = h.engine.advance(execution_id).await.unwrap();
    assert_eq!(again, report.execution);
}

#[tokio::test]
async fn empty_organization_selection_still_completes_the_step() {
    let h = harness(simulated()).await;
    let execution = h
        .engine
        .start_execution(NEW_PARTNER_USER, Some(h.admin))
        .await
        .unwrap();

    let execution = h
        .engine
        .submit_input(
            execution.id,
            "select_organization",
            fields(&[("organization_id", "")]),
            Some(h.admin),
        )
        .await
        .unwrap();

    assert_eq!(execution.organization_id, None);
    assert_eq!(execution.status, ExecutionStatus::AwaitingInput);
    let steps = h.store.steps(execution.id).await.unwrap();
    assert_eq!(steps[0].status, StepStatus::Completed);
    assert_eq!(
        steps[0].manual_input.as_ref(),
        Some(&fields(&[("organization_id", "")]))
    );
    assert_eq!(steps[1].step_name, "input_user_details");
    assert_eq!(steps[1].status, StepStatus::AwaitingInput);
}

#[tokio::test]
async fn failed_step_resumes_from_itself_on_retry() {
    let clone_calls = Arc::new(AtomicUsize::new(0));
    let group_calls = Arc::new(AtomicUsize::new(0));
    let mut executor = simulated();
    executor
        .register(
            "clone_metabase_collection",
            Arc::new(Counting {
                calls: clone_calls.clone(),
                failures: 0,
                output: &[("metabase_collection_id", "mb-col-fixed")],
            }),
        )
        .register(
            "create_metabase_group",
            Arc::new(Counting {
                calls: group_calls.clone(),
                failures: 1,
                output: &[("metabase_group_id", "mb-grp-fixed"), ("metabase_group_name", "ext-acme")],
            }),
        );
    let h = harness(executor).await;

    let execution = h
        .engine
        .start_execution(NEW_PARTNER, Some(h.admin))
        .await
        .unwrap();
    h.engine
        .submit_input(execution.id, "input_studio_companies", acme_companies(), Some(h.admin))
        .await
        .unwrap();
    let failed = h
        .engine
        .submit_input(execution.id, "trigger_infrabot", FieldMap::new(), Some(h.admin))
        .await
        .unwrap();

    assert_eq!(failed.status, ExecutionStatus::Failed);
    assert_eq!(failed.current_step_order, 4);
    let steps = h.store.steps(execution.id).await.unwrap();
    assert_eq!(steps[2].status, StepStatus::Completed);
    assert_eq!(steps[3].status, StepStatus::Failed);
    assert_eq!(steps[3].error.as_deref(), Some("metabase unavailable"));
    assert_eq!(steps[4].status, StepStatus::Pending);

    let resumed = h
        .engine
        .retry_step(execution.id, steps[3].id)
        .await
        .unwrap();

    assert_eq!(clone_calls.load(Ordering::SeqCst), 1);
    assert_eq!(group_calls.load(Ordering::SeqCst), 2);
    assert_eq!(resumed.status, ExecutionStatus::AwaitingInput);
    let steps = h.store.steps(execution.id).await.unwrap();
    assert_eq!(steps[3].status, StepStatus::Completed);
    assert_eq!(steps[3].error, None);
    assert_eq!(steps[7].step_name, "lms_setup");
    assert_eq!(steps[7].status, StepStatus::AwaitingInput);
    assert_at_most_one_active(&h.store, execution.id).await;
}

/// Runs the wrapped handler, then reports a store failure the first time.
struct FailsOnceAfterApply {
    inner: Arc<dyn ManualInputHandler>,
    failed: AtomicBool,
}

#[async_trait]
impl ManualInputHandler for FailsOnceAfterApply {
    fn required_fields(&self) -> &'static [&'static str] {
        self.inner.required_fields()
    }

    async fn apply(
        &self,
        store: &dyn WorkflowStore,
        execution: &mut Execution,
        input: &FieldMap,
    ) -> Result<(), StoreError> {
        self.inner.apply(store, execution, input).await?;
        if !self.failed.swap(true, Ordering::SeqCst) {
            return Err(StoreError::Backend("disk full".to_string()));
        }
        Ok(())
    }
}

#[tokio::test]
async fn handler_failure_keeps_the_link_and_resubmission_converges() {
    let store = Arc::new(MemoryStore::new());
    let admin = hyopps_workflow::seed(store.as_ref(), Vec::new())
        .await
        .expect("seed")
        .admin_id;
    let mut handlers = HandlerRegistry::standard();
    let standard = handlers
        .get("input_studio_companies")
        .cloned()
        .expect("studio companies handler");
    handlers.register(
        "input_studio_companies",
        Arc::new(FailsOnceAfterApply {
            inner: standard,
            failed: AtomicBool::new(false),
        }),
    );
    let engine =
        WorkflowEngine::new(store.clone(), Arc::new(simulated())).with_handlers(handlers);
    let execution = engine
        .start_execution(NEW_PARTNER, Some(admin))
        .await
        .unwrap();

    let err = engine
        .submit_input(execution.id, "input_studio_companies", acme_companies(), Some(admin))
        .await
        .expect_err("handler failure");
    assert_eq!(err.kind(), ErrorKind::Internal);

    let acme = store
        .organization_by_name("Acme")
        .await
        .unwrap()
        .expect("organization written before the failure");
    let stored = store.execution(execution.id).await.unwrap().expect("execution");
    assert_eq!(stored.organization_id, Some(acme.id));
    assert_eq!(stored.status, ExecutionStatus::AwaitingInput);
    let steps = store.steps(execution.id).await.unwrap();
    assert_eq!(steps[0].status, StepStatus::AwaitingInput);
    assert_eq!(steps[0].manual_input, None);

    let resumed = engine
        .submit_input(execution.id, "input_studio_companies", acme_companies(), Some(admin))
        .await
        .unwrap();
    assert_eq!(resumed.organization_id, Some(acme.id));
    assert_eq!(store.list_organizations().await.unwrap().len(), 1);
    assert_eq!(store.studio_companies(acme.id).await.unwrap().len(), 2);
    let steps = store.steps(execution.id).await.unwrap();
    assert_eq!(steps[0].status, StepStatus::Completed);
}

#[tokio::test]
async fn invalid_transitions_leave_records_unchanged() {
    let h = harness(simulated()).await;
    let execution = h
        .engine
        .start_execution(NEW_PARTNER, Some(h.admin))
        .await
        .unwrap();
    h.engine
        .submit_input(execution.id, "input_studio_companies", acme_companies(), Some(h.admin))
        .await
        .unwrap();
    let execution_before = h.store.execution(execution.id).await.unwrap();
    let steps_before = h.store.steps(execution.id).await.unwrap();
    let organizations_before = h.store.list_organizations().await.unwrap();

    let err = h
        .engine
        .submit_input(execution.id, "lms_setup", fields(&[("lms_confirmed", "true")]), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::InvalidState {
            expected: StepStatus::AwaitingInput,
            actual: StepStatus::Pending,
            ..
        }
    ));

    let err = h
        .engine
        .submit_input(execution.id, "input_studio_companies", acme_companies(), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let err = h
        .engine
        .retry_step(execution.id, "input_studio_companies")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::InvalidState {
            expected: StepStatus::Failed,
            actual: StepStatus::Completed,
            ..
        }
    ));

    assert_eq!(h.store.execution(execution.id).await.unwrap(), execution_before);
    assert_eq!(h.store.steps(execution.id).await.unwrap(), steps_before);
    assert_eq!(h.store.list_organizations().await.unwrap(), organizations_before);
}

#[tokio::test]
async fn unknown_references_are_not_found() {
    let h = harness(simulated()).await;
    let err = h.engine.start_execution("offboard_partner", None).await.unwrap_err();
    assert!(matches!(err, WorkflowError::UnknownWorkflow(_)));

    let missing = Uuid::new_v4();
    let err = h.engine.get_execution(missing).await.unwrap_err();
    assert!(matches!(err, WorkflowError::ExecutionNotFound(id) if id == missing));

    let execution = h
        .engine
        .start_execution(NEW_PARTNER, None)
        .await
        .unwrap();
    let err = h
        .engine
        .submit_input(execution.id, "launch_rockets", FieldMap::new(), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(h.store.list_organizations().await.unwrap().is_empty());
}

#[tokio::test]
async fn partner_user_onboarding_grants_access() {
    let h = harness(simulated()).await;
    let partner_execution = onboard_acme(&h).await;
    let organization_id = h
        .store
        .execution(partner_execution)
        .await
        .unwrap()
        .and_then(|execution| execution.organization_id)
        .expect("organization");
    let company_ids: Vec<String> = h
        .store
        .studio_companies(organization_id)
        .await
        .unwrap()
        .into_iter()
        .map(|company| company.id.to_string())
        .collect();

    let execution = h
        .engine
        .start_execution(NEW_PARTNER_USER, Some(h.admin))
        .await
        .unwrap();
    h.engine
        .submit_input(
            execution.id,
            "select_organization",
            fields(&[("organization_id", organization_id.to_string().as_str())]),
            Some(h.admin),
        )
        .await
        .unwrap();
    let mut details = fields(&[
        ("firstname", "Ada"),
        ("lastname", "Lovelace"),
        ("email", "ada@acme.test"),
    ]);
    details.insert(
        "selected_studio_company_ids".to_string(),
        FieldValue::List(company_ids),
    );
    let done = h
        .engine
        .submit_input(execution.id, "input_user_details", details, Some(h.admin))
        .await
        .unwrap();

    assert_eq!(done.status, ExecutionStatus::Completed);
    assert_eq!(done.organization_id, Some(organization_id));
    let user = h
        .store
        .user_by_email("ada@acme.test")
        .await
        .unwrap()
        .expect("user");
    assert_eq!(user.organization_id, Some(organization_id));
    assert_eq!(h.store.user_studio_access(user.id).await.unwrap().len(), 2);

    let grants = h.store.access_grants(user.id).await.unwrap();
    assert_eq!(grants.len(), h.store.list_resources().await.unwrap().len());
    assert!(grants.iter().all(|grant| grant.granted_by == Some(h.admin)));

    let personal = h
        .store
        .user_studio_company(user.id)
        .await
        .unwrap()
        .expect("personal studio company");
    assert_eq!(personal.name, "Ada Lovelace - Personal Studio");

    let report = h.engine.get_execution(execution.id).await.unwrap();
    assert_eq!(report.user_email.as_deref(), Some("ada@acme.test"));
    assert_eq!(report.requested_by_email.as_deref(), Some("admin@hyopps.local"));
}

#[tokio::test]
async fn missing_email_fails_user_steps() {
    let h = harness(simulated()).await;
    let execution = h
        .engine
        .start_execution(NEW_PARTNER_USER, Some(h.admin))
        .await
        .unwrap();
    h.engine
        .submit_input(execution.id, "select_organization", FieldMap::new(), None)
        .await
        .unwrap();
    let failed = h
        .engine
        .submit_input(execution.id, "input_user_details", FieldMap::new(), None)
        .await
        .unwrap();

    assert_eq!(failed.status, ExecutionStatus::Failed);
    assert_eq!(failed.completed_at, None);
    let steps = h.store.steps(execution.id).await.unwrap();
    let failed_step = steps
        .iter()
        .find(|step| step.status == StepStatus::Failed)
        .expect("failed step");
    assert_eq!(failed_step.step_name, "add_user_to_metabase_group");
    assert_eq!(
        failed_step.error.as_deref(),
        Some("Missing email in workflow context")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_retries_advance_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut executor = simulated();
    executor.register(
        "clone_metabase_collection",
        Arc::new(Counting {
            calls: calls.clone(),
            failures: 1,
            output: &[("metabase_collection_id", "mb-col-fixed")],
        }),
    );
    let h = harness(executor).await;
    let execution = h
        .engine
        .start_execution(NEW_PARTNER, Some(h.admin))
        .await
        .unwrap();
    h.engine
        .submit_input(execution.id, "input_studio_companies", acme_companies(), None)
        .await
        .unwrap();
    h.engine
        .submit_input(execution.id, "trigger_infrabot", FieldMap::new(), None)
        .await
        .unwrap();

    let retries: Vec<_> = (0..4)
        .map(|_| {
            let engine = h.engine.clone();
            tokio::spawn(async move {
                engine
                    .retry_step(execution.id, "clone_metabase_collection")
                    .await
            })
        })
        .collect();
    let mut succeeded = 0;
    for retry in retries {
        match retry.await.expect("join") {
            Ok(_) => succeeded += 1,
            Err(err) => assert_eq!(err.kind(), ErrorKind::InvalidState),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_at_most_one_active(&h.store, execution.id).await;
}

fn engine_with_flaky_clone(store: MemoryStore, calls: &Arc<AtomicUsize>) -> WorkflowEngine {
    let mut executor = simulated();
    executor.register(
        "clone_metabase_collection",
        Arc::new(Counting {
            calls: calls.clone(),
            failures: 1,
            output: &[("metabase_collection_id", "mb-col-fixed")],
        }),
    );
    WorkflowEngine::new(Arc::new(store), Arc::new(executor))
}

async fn open_blocking(path: PathBuf) -> MemoryStore {
    tokio::task::spawn_blocking(move || MemoryStore::open(&path))
        .await
        .expect("join")
        .expect("open store")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn separate_handles_on_one_store_file_retry_once_and_keep_every_write() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("store.json");
    let calls = Arc::new(AtomicUsize::new(0));

    let execution_id = {
        let store = open_blocking(path.clone()).await;
        let admin = hyopps_workflow::seed(&store, Vec::new())
            .await
            .expect("seed")
            .admin_id;
        let engine = engine_with_flaky_clone(store, &calls);
        let execution = engine
            .start_execution(NEW_PARTNER, Some(admin))
            .await
            .unwrap();
        engine
            .submit_input(execution.id, "input_studio_companies", acme_companies(), None)
            .await
            .unwrap();
        let failed = engine
            .submit_input(execution.id, "trigger_infrabot", FieldMap::new(), None)
            .await
            .unwrap();
        assert_eq!(failed.status, ExecutionStatus::Failed);
        execution.id
    };

    let retry = |path: PathBuf| {
        let calls = calls.clone();
        async move {
            let engine = engine_with_flaky_clone(open_blocking(path).await, &calls);
            engine
                .retry_step(execution_id, "clone_metabase_collection")
                .await
                .map(|execution| execution.status)
        }
    };
    let (first, second) = tokio::join!(retry(path.clone()), retry(path.clone()));
    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    for outcome in &outcomes {
        match outcome {
            Ok(status) => assert_eq!(*status, ExecutionStatus::AwaitingInput),
            Err(err) => assert_eq!(err.kind(), ErrorKind::InvalidState),
        }
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let start = |path: PathBuf| async move {
        let store = open_blocking(path).await;
        let engine = WorkflowEngine::new(Arc::new(store), Arc::new(simulated()));
        engine
            .start_execution(NEW_PARTNER_USER, None)
            .await
            .expect("start")
            .id
    };
    let (a, b) = tokio::join!(start(path.clone()), start(path.clone()));

    let reopened = open_blocking(path).await;
    assert!(reopened.execution(a).await.unwrap().is_some());
    assert!(reopened.execution(b).await.unwrap().is_some());
    assert_at_most_one_active(&reopened, execution_id).await;
}

#[tokio::test]
async fn listing_filters_by_status_and_organization() {
    let h = harness(simulated()).await;
    let completed = onboard_acme(&h).await;
    let pending_user = h
        .engine
        .start_execution(NEW_PARTNER_USER, Some(h.admin))
        .await
        .unwrap();

    let all = h
        .engine
        .list_executions(&ExecutionFilter::default())
        .await
        .unwrap();
    let ids: Vec<Uuid> = all.iter().map(|execution| execution.id).collect();
    assert_eq!(ids, vec![pending_user.id, completed]);

    let awaiting = h
        .engine
        .list_executions(&ExecutionFilter {
            status: Some(ExecutionStatus::AwaitingInput),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(awaiting.len(), 1);
    assert_eq!(awaiting[0].workflow_name, NEW_PARTNER_USER);

    let organization_id = all[1].organization_id.expect("organization");
    let scoped = h
        .engine
        .list_executions(&ExecutionFilter {
            organization_id: Some(organization_id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].id, completed);
}
