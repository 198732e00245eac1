use crate::Cli;
use anyhow::Context;
use anyhow::Result;
use clap::Args;
use clap::Subcommand;
use hyopps_workflow::ADMIN_EMAIL;
use hyopps_workflow::DataLayout;
use hyopps_workflow::EngineConfig;
use hyopps_workflow::Execution;
use hyopps_workflow::ExecutionFilter;
use hyopps_workflow::ExecutionReport;
use hyopps_workflow::ExecutionStatus;
use hyopps_workflow::FieldMap;
use hyopps_workflow::FieldValue;
use hyopps_workflow::MemoryStore;
use hyopps_workflow::StepRef;
use hyopps_workflow::WorkflowDefinition;
use hyopps_workflow::WorkflowEngine;
use hyopps_workflow::WorkflowStore;
use std::path::PathBuf;
use std::sync::Arc;
use textwrap::wrap;
use uuid::Uuid;

const WRAP_WIDTH: usize = 72;

#[derive(Debug, Subcommand)]
pub enum WorkflowSubcommand {
    /// Register resources, built-in workflows and the default admin.
    Seed(SeedArgs),
    /// List registered workflow definitions.
    Workflows(WorkflowsArgs),
    /// Start a new execution of a workflow.
    Start(StartArgs),
    /// Show an execution with its steps and context.
    Show(ShowArgs),
    /// List executions, newest first.
    List(ListArgs),
    /// Submit input for a step that is awaiting it.
    Input(InputArgs),
    /// Retry a failed step.
    Retry(RetryArgs),
}

#[derive(Debug, Args)]
pub struct SeedArgs {
    /// Directory of extra workflow definitions (YAML or TOML). Defaults to
    /// `definitions_dir` from config.toml, then `<data-dir>/workflows`.
    #[arg(long = "definitions", value_name = "DIR")]
    pub definitions: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct WorkflowsArgs {
    /// Also print each workflow's steps.
    #[arg(long)]
    pub steps: bool,
}

#[derive(Debug, Args)]
pub struct StartArgs {
    /// Workflow name, e.g. `new_partner`.
    #[arg(value_name = "WORKFLOW")]
    pub workflow: String,

    /// Email of the requesting user.
    #[arg(long = "as", value_name = "EMAIL", default_value = ADMIN_EMAIL)]
    pub requested_by: String,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[arg(value_name = "EXECUTION_ID")]
    pub execution_id: Uuid,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only executions in this status (pending, running, awaiting_input,
    /// completed, failed).
    #[arg(long, value_name = "STATUS")]
    pub status: Option<ExecutionStatus>,

    /// Only executions linked to this organization.
    #[arg(long = "organization", value_name = "ORGANIZATION_ID")]
    pub organization_id: Option<Uuid>,

    /// Only executions of this workflow.
    #[arg(long, value_name = "WORKFLOW")]
    pub workflow: Option<String>,
}

#[derive(Debug, Args)]
pub struct InputArgs {
    #[arg(value_name = "EXECUTION_ID")]
    pub execution_id: Uuid,

    /// Step name or step execution id.
    #[arg(value_name = "STEP")]
    pub step: String,

    /// Text field, repeatable.
    #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_pair)]
    pub fields: Vec<(String, String)>,

    /// Comma-separated list field, repeatable.
    #[arg(long = "list", value_name = "KEY=A,B", value_parser = parse_pair)]
    pub lists: Vec<(String, String)>,

    /// Whole form as a JSON object of strings and string arrays. `--field`
    /// and `--list` entries are applied on top.
    #[arg(long = "input-json", value_name = "JSON")]
    pub input_json: Option<String>,

    /// Email of the user confirming the step.
    #[arg(long = "as", value_name = "EMAIL", default_value = ADMIN_EMAIL)]
    pub completed_by: String,
}

#[derive(Debug, Args)]
pub struct RetryArgs {
    #[arg(value_name = "EXECUTION_ID")]
    pub execution_id: Uuid,

    /// Step name or step execution id.
    #[arg(value_name = "STEP")]
    pub step: String,
}

pub async fn execute(cli: Cli) -> Result<()> {
    let layout = DataLayout::new(cli.data_dir);
    layout.ensure_root()?;
    let config = EngineConfig::load_or_default(&layout.config_file())?;
    let store: Arc<dyn WorkflowStore> = Arc::new(MemoryStore::open(&layout.store_file())?);
    tracing::debug!(data_dir = %layout.root().display(), "opened workflow store");
    let engine = WorkflowEngine::from_config(store.clone(), &config);
    let json = cli.json;

    match cli.action {
        WorkflowSubcommand::Seed(args) => {
            let dir = args
                .definitions
                .or_else(|| config.definitions_dir.clone())
                .unwrap_or_else(|| layout.definitions_dir());
            let extra = WorkflowDefinition::load_dir(&dir)?;
            let summary = hyopps_workflow::seed(store.as_ref(), extra).await?;
            if json {
                print_json(&serde_json::json!({
                    "admin_id": summary.admin_id,
                    "workflows_added": summary.workflows_added,
                    "resources_added": summary.resources_added,
                }))?;
            } else {
                println!(
                    "Seeded {} workflow(s) and {} resource(s) into {}",
                    summary.workflows_added,
                    summary.resources_added,
                    layout.store_file().display()
                );
                println!("Default admin: {ADMIN_EMAIL}");
            }
            Ok(())
        }
        WorkflowSubcommand::Workflows(args) => {
            let workflows = store.list_workflows().await?;
            if json {
                return print_json(&workflows);
            }
            if workflows.is_empty() {
                println!("No workflows registered. Run `hyopps seed` first.");
            }
            for workflow in &workflows {
                println!("{:<20} {}", workflow.name, workflow.description);
                if args.steps {
                    for step in workflow.ordered_steps() {
                        println!(
                            "    {:>2}. [{:<6}] {}",
                            step.order,
                            step.kind.as_str(),
                            step.label
                        );
                    }
                }
            }
            Ok(())
        }
        WorkflowSubcommand::Start(args) => {
            let requester = user_id(store.as_ref(), &args.requested_by).await?;
            let execution = engine
                .start_execution(&args.workflow, Some(requester))
                .await?;
            print_report(&engine.get_execution(execution.id).await?, json)
        }
        WorkflowSubcommand::Show(args) => {
            print_report(&engine.get_execution(args.execution_id).await?, json)
        }
        WorkflowSubcommand::List(args) => {
            let filter = ExecutionFilter {
                status: args.status,
                organization_id: args.organization_id,
                workflow_name: args.workflow,
            };
            let executions = engine.list_executions(&filter).await?;
            if json {
                return print_json(&executions);
            }
            if executions.is_empty() {
                println!("No executions found.");
            }
            for execution in &executions {
                print_execution_line(execution);
            }
            Ok(())
        }
        WorkflowSubcommand::Input(args) => {
            let completed_by = user_id(store.as_ref(), &args.completed_by).await?;
            let input = build_input(args.input_json.as_deref(), args.fields, args.lists)?;
            let execution = engine
                .submit_input(
                    args.execution_id,
                    step_ref(&args.step),
                    input,
                    Some(completed_by),
                )
                .await?;
            print_report(&engine.get_execution(execution.id).await?, json)
        }
        WorkflowSubcommand::Retry(args) => {
            let execution = engine
                .retry_step(args.execution_id, step_ref(&args.step))
                .await?;
            print_report(&engine.get_execution(execution.id).await?, json)
        }
    }
}

async fn user_id(store: &dyn WorkflowStore, email: &str) -> Result<Uuid> {
    let user = store
        .user_by_email(email)
        .await?
        .with_context(|| format!("no user with email {email}; run `hyopps seed` first"))?;
    Ok(user.id)
}

fn step_ref(raw: &str) -> StepRef {
    match Uuid::parse_str(raw) {
        Ok(id) => StepRef::Id(id),
        Err(_) => StepRef::Name(raw.to_string()),
    }
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn build_input(
    input_json: Option<&str>,
    fields: Vec<(String, String)>,
    lists: Vec<(String, String)>,
) -> Result<FieldMap> {
    let mut input: FieldMap = match input_json {
        Some(raw) => serde_json::from_str(raw).context("parse --input-json")?,
        None => FieldMap::new(),
    };
    for (key, value) in fields {
        input.insert(key, FieldValue::Text(value));
    }
    for (key, value) in lists {
        let items = value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect();
        input.insert(key, FieldValue::List(items));
    }
    Ok(input)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_execution_line(execution: &Execution) {
    println!(
        "{}  {:<18} {:<15} step {:>2}  {}",
        execution.id,
        execution.workflow_name,
        execution.status.as_str(),
        execution.current_step_order,
        execution.created_at.format("%Y-%m-%d %H:%M:%S")
    );
}

fn print_report(report: &ExecutionReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }
    let execution = &report.execution;
    println!("Execution: {}", execution.id);
    println!("Workflow: {}", execution.workflow_name);
    for line in wrap(&report.workflow_description, WRAP_WIDTH) {
        println!("  {line}");
    }
    println!("Status: {}", execution.status);
    if let Some(organization) = &report.organization_name {
        println!("Organization: {organization}");
    }
    if let Some(email) = &report.user_email {
        println!("User: {email}");
    }
    if let Some(email) = &report.requested_by_email {
        println!("Requested by: {email}");
    }
    if let Some(completed_at) = execution.completed_at {
        println!("Completed at: {}", completed_at.to_rfc3339());
    }
    println!("Steps:");
    for step in &report.steps {
        println!(
            "  {:>2}. {:<15} {:<6} {}",
            step.step_order,
            step.status.as_str(),
            step.step_kind.as_str(),
            step.step_label
        );
        if let Some(error) = &step.error {
            for line in wrap(error, WRAP_WIDTH) {
                println!("        ! {line}");
            }
        }
    }
    if !report.context.is_empty() {
        println!("Context:");
        for (key, value) in report.context.iter() {
            let rendered = match value {
                FieldValue::Text(text) => text.clone(),
                FieldValue::List(items) => format!("[{}]", items.join(", ")),
            };
            println!("  {key} = {rendered}");
        }
    }
    if let Some(active) = report.active_step() {
        println!(
            "Next: {} ({}) is {}",
            active.step_label, active.step_name, active.status
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pairs_split_on_first_equals() {
        assert_eq!(
            parse_pair("keycloak_cluster=eu=1"),
            Ok(("keycloak_cluster".to_string(), "eu=1".to_string()))
        );
        assert!(parse_pair("novalue").is_err());
        assert!(parse_pair("=x").is_err());
    }

    #[test]
    fn flags_override_json_input() {
        let input = build_input(
            Some(r#"{"organization_name": "Acme", "roles": ["dev"]}"#),
            vec![("organization_name".to_string(), "Acme Corp".to_string())],
            vec![("languages".to_string(), "en, fr,".to_string())],
        )
        .expect("input");

        assert_eq!(
            input.get("organization_name"),
            Some(&FieldValue::from("Acme Corp"))
        );
        assert_eq!(
            input.get("languages"),
            Some(&FieldValue::List(vec!["en".to_string(), "fr".to_string()]))
        );
        assert_eq!(
            input.get("roles"),
            Some(&FieldValue::List(vec!["dev".to_string()]))
        );
    }

    #[test]
    fn step_refs_accept_ids_and_names() {
        let id = Uuid::new_v4();
        assert_eq!(step_ref(&id.to_string()), StepRef::Id(id));
        assert_eq!(
            step_ref("lms_setup"),
            StepRef::Name("lms_setup".to_string())
        );
    }
}
