//! Automated step execution.
//!
//! The engine hands a step name and the current context to a
//! [`StepExecutor`]. The default executor is a [`StepRegistry`] of
//! [`AutomatedStep`] implementations; every step shipped here simulates the
//! external platform call with a fixed latency and a generated identifier.

use crate::context::FieldMap;
use crate::context::FieldValue;
use crate::context::WorkflowContext;
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success(FieldMap),
    Failure(String),
}

impl StepOutcome {
    pub fn success<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        StepOutcome::Success(
            fields
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    pub fn failure(error: impl Into<String>) -> Self {
        StepOutcome::Failure(error.into())
    }
}

/// Boundary to the systems automated steps talk to.
///
/// An `Err` is treated exactly like [`StepOutcome::Failure`]. Implementations
/// may be invoked again for the same step after a failure, so calls against
/// real systems must be idempotent.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, step: &str, context: &WorkflowContext) -> anyhow::Result<StepOutcome>;
}

/// One automated step, registered under its step name.
#[async_trait]
pub trait AutomatedStep: Send + Sync {
    async fn run(&self, context: &WorkflowContext) -> anyhow::Result<StepOutcome>;
}

#[derive(Clone, Default)]
pub struct StepRegistry {
    steps: HashMap<String, Arc<dyn AutomatedStep>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, step: Arc<dyn AutomatedStep>) -> &mut Self {
        self.steps.insert(name.into(), step);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    /// Every automated step of the built-in workflows, simulated.
    pub fn simulated(latency: Duration) -> Self {
        let table: [(&str, SimulateFn); 12] = [
            ("clone_metabase_collection", clone_metabase_collection),
            ("create_metabase_group", create_metabase_group),
            ("grant_metabase_db_access", grant_metabase_db_access),
            ("create_teams_channel", create_teams_channel),
            ("create_slack_group", create_slack_group),
            ("add_user_to_studio_companies", add_user_to_studio_companies),
            ("add_user_to_metabase_group", add_user_to_metabase_group),
            ("add_user_to_teams_channel", add_user_to_teams_channel),
            ("add_user_to_slack_group", add_user_to_slack_group),
            ("create_studio_user_company", create_studio_user_company),
            ("send_studio_invite", send_studio_invite),
            ("share_documentation", share_documentation),
        ];
        let mut registry = Self::new();
        for (name, simulate) in table {
            registry.register(name, Arc::new(SimulatedStep { latency, simulate }));
        }
        registry
    }
}

#[async_trait]
impl StepExecutor for StepRegistry {
    async fn execute(&self, step: &str, context: &WorkflowContext) -> anyhow::Result<StepOutcome> {
        match self.steps.get(step) {
            Some(handler) => handler.run(context).await,
            None => Ok(StepOutcome::failure(format!("Unknown step: {step}"))),
        }
    }
}

type SimulateFn = fn(&WorkflowContext) -> StepOutcome;

struct SimulatedStep {
    latency: Duration,
    simulate: SimulateFn,
}

#[async_trait]
impl AutomatedStep for SimulatedStep {
    async fn run(&self, context: &WorkflowContext) -> anyhow::Result<StepOutcome> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok((self.simulate)(context))
    }
}

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// `<prefix>-` followed by seven random base-36 characters.
pub fn fake_id(prefix: &str) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..7)
        .map(|_| char::from(ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())]))
        .collect();
    format!("{prefix}-{suffix}")
}

/// `ext-<organization>` lowercased with whitespace runs turned into dashes.
fn external_handle(context: &WorkflowContext) -> String {
    let organization = context.text("organization_name").unwrap_or("partner");
    let slug = organization
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();
    format!("ext-{slug}")
}

fn clone_metabase_collection(_context: &WorkflowContext) -> StepOutcome {
    StepOutcome::success([("metabase_collection_id", fake_id("mb-col"))])
}

fn create_metabase_group(context: &WorkflowContext) -> StepOutcome {
    StepOutcome::success([
        ("metabase_group_id", fake_id("mb-grp")),
        ("metabase_group_name", external_handle(context)),
    ])
}

fn grant_metabase_db_access(_context: &WorkflowContext) -> StepOutcome {
    StepOutcome::success([("granted", "true")])
}

fn create_teams_channel(context: &WorkflowContext) -> StepOutcome {
    StepOutcome::success([
        ("teams_channel_id", fake_id("teams-ch")),
        ("teams_channel_name", external_handle(context)),
    ])
}

fn create_slack_group(context: &WorkflowContext) -> StepOutcome {
    StepOutcome::success([
        ("slack_group_id", fake_id("slack-grp")),
        ("slack_group_handle", external_handle(context)),
    ])
}

fn add_user_to_studio_companies(context: &WorkflowContext) -> StepOutcome {
    let added = context
        .list("selected_studio_company_ids")
        .map(|ids| ids.join(","))
        .unwrap_or_default();
    StepOutcome::success([("added_companies", added)])
}

/// Steps that act on a user inside the partner organization need both.
fn require_user_and_organization(context: &WorkflowContext) -> Result<&str, StepOutcome> {
    let Some(email) = context.text("email") else {
        return Err(StepOutcome::failure("Missing email in workflow context"));
    };
    if context.text("organization_id").is_none() {
        return Err(StepOutcome::failure(
            "Missing organization_id in workflow context",
        ));
    }
    Ok(email)
}

fn add_user_to_metabase_group(context: &WorkflowContext) -> StepOutcome {
    if let Err(failure) = require_user_and_organization(context) {
        return failure;
    }
    StepOutcome::success([("metabase_user_id", fake_id("mb-usr"))])
}

fn add_user_to_teams_channel(_context: &WorkflowContext) -> StepOutcome {
    StepOutcome::success([("teams_membership_id", fake_id("teams-mbr"))])
}

fn add_user_to_slack_group(_context: &WorkflowContext) -> StepOutcome {
    StepOutcome::success([("updated", "true")])
}

fn create_studio_user_company(context: &WorkflowContext) -> StepOutcome {
    let full_name = [context.text("firstname"), context.text("lastname")]
        .into_iter()
        .flatten()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ");
    let name = if full_name.is_empty() {
        context.text("email").unwrap_or("user").to_string()
    } else {
        full_name
    };
    StepOutcome::success([
        ("studio_user_company_id", fake_id("studio-usr")),
        ("studio_user_company_name", format!("{name} - Personal Studio")),
    ])
}

fn send_studio_invite(context: &WorkflowContext) -> StepOutcome {
    StepOutcome::success([
        ("invite_sent", "true".to_string()),
        ("email", context.text("email").unwrap_or_default().to_string()),
    ])
}

fn share_documentation(context: &WorkflowContext) -> StepOutcome {
    match require_user_and_organization(context) {
        Ok(email) => StepOutcome::success([("sent_to", email), ("channels", "email,slack")]),
        Err(failure) => failure,
    }
}
