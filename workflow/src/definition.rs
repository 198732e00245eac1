use crate::context::WorkflowContext;
use anyhow::Context;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use uuid::Uuid;

pub const NEW_PARTNER: &str = "new_partner";
pub const NEW_PARTNER_USER: &str = "new_partner_user";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Auto,
    Manual,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Auto => "auto",
            StepKind::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepDefinition {
    pub order: u32,
    pub name: String,
    pub label: String,
    pub kind: StepKind,
    #[serde(default)]
    pub description: String,
}

impl StepDefinition {
    fn new(order: u32, name: &str, label: &str, kind: StepKind, description: &str) -> Self {
        Self {
            order,
            name: name.to_string(),
            label: label.to_string(),
            kind,
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowDefinition {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Context keys this workflow is expected to accumulate. Used for
    /// reporting only; the context itself stays an open map.
    #[serde(default)]
    pub expected_keys: Vec<String>,
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

impl WorkflowDefinition {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read workflow definition {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut definition: WorkflowDefinition = match ext.as_str() {
            "yml" | "yaml" => {
                serde_yaml::from_str(&contents).context("parse workflow definition")?
            }
            "toml" | "tml" => toml::from_str(&contents).context("parse workflow definition")?,
            _ => serde_yaml::from_str(&contents)
                .or_else(|_| toml::from_str(&contents))
                .context("parse workflow definition (yaml or toml)")?,
        };
        definition.steps.sort_by_key(|step| step.order);
        definition.validate()?;
        Ok(definition)
    }

    /// Loads every `.yaml`, `.yml` and `.toml` file in `dir`, sorted by file
    /// name. A missing directory yields no definitions.
    pub fn load_dir(dir: &Path) -> anyhow::Result<Vec<Self>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        for entry in
            fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?
        {
            let path = entry?.path();
            let is_definition = path
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| matches!(ext, "yaml" | "yml" | "toml"));
            if is_definition {
                paths.push(path);
            }
        }
        paths.sort();
        paths.iter().map(|path| Self::load(path)).collect()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("workflow definition must have a name");
        }
        if self.steps.is_empty() {
            anyhow::bail!("workflow {} must contain at least one step", self.name);
        }
        let mut orders = HashSet::new();
        let mut names = HashSet::new();
        for step in &self.steps {
            if !orders.insert(step.order) {
                anyhow::bail!("duplicate step order {} in workflow {}", step.order, self.name);
            }
            if !names.insert(step.name.as_str()) {
                anyhow::bail!("duplicate step name {} in workflow {}", step.name, self.name);
            }
        }
        Ok(())
    }

    pub fn ordered_steps(&self) -> Vec<&StepDefinition> {
        let mut steps: Vec<&StepDefinition> = self.steps.iter().collect();
        steps.sort_by_key(|step| step.order);
        steps
    }

    pub fn step(&self, name: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|step| step.name == name)
    }

    pub fn missing_context_keys(&self, context: &WorkflowContext) -> Vec<String> {
        self.expected_keys
            .iter()
            .filter(|key| !context.contains_key(key))
            .cloned()
            .collect()
    }

    pub fn builtin() -> Vec<Self> {
        vec![new_partner(), new_partner_user()]
    }
}

fn new_partner() -> WorkflowDefinition {
    use StepKind::Auto;
    use StepKind::Manual;

    WorkflowDefinition {
        id: Uuid::new_v4(),
        name: NEW_PARTNER.to_string(),
        description: "Onboard a new partner organization from scratch".to_string(),
        expected_keys: [
            "organization_name",
            "studio_company_id_test",
            "studio_company_id_prod",
            "keycloak_cluster",
            "metabase_collection_id",
            "metabase_group_id",
            "teams_channel_id",
            "slack_group_id",
        ]
        .into_iter()
        .map(String::from)
        .collect(),
        steps: vec![
            StepDefinition::new(
                1,
                "input_studio_companies",
                "Input Studio Companies",
                Manual,
                "Admin creates companies in Studio UI, then inputs organization name + Studio TEST ID + Studio PROD ID",
            ),
            StepDefinition::new(
                2,
                "trigger_infrabot",
                "Trigger Infrabot",
                Manual,
                "Admin triggers Infrabot with name, company ID, cluster, scopes. Confirms when KeyCloak creds are stored in GitHub",
            ),
            StepDefinition::new(
                3,
                "clone_metabase_collection",
                "Clone Metabase Collection",
                Auto,
                "Clone template collection for the new partner via Metabase API",
            ),
            StepDefinition::new(
                4,
                "create_metabase_group",
                "Create Metabase User Group",
                Auto,
                "Create a user group in Metabase and store the group ID",
            ),
            StepDefinition::new(
                5,
                "grant_metabase_db_access",
                "Grant DB Access to Metabase Group",
                Auto,
                "Grant database access to the Metabase group",
            ),
            StepDefinition::new(
                6,
                "create_teams_channel",
                "Create Teams Channel",
                Auto,
                "Create a dedicated Teams channel via MS Graph API",
            ),
            StepDefinition::new(
                7,
                "create_slack_group",
                "Create Slack Group",
                Auto,
                "Create a Slack group via Slack API",
            ),
            StepDefinition::new(
                8,
                "lms_setup",
                "LMS Setup",
                Manual,
                "Admin adds partner learning path in LMS. Confirm when done",
            ),
        ],
    }
}

fn new_partner_user() -> WorkflowDefinition {
    use StepKind::Auto;
    use StepKind::Manual;

    WorkflowDefinition {
        id: Uuid::new_v4(),
        name: NEW_PARTNER_USER.to_string(),
        description: "Add a new user to an existing partner organization".to_string(),
        expected_keys: [
            "organization_id",
            "email",
            "firstname",
            "lastname",
            "selected_studio_company_ids",
        ]
        .into_iter()
        .map(String::from)
        .collect(),
        steps: vec![
            StepDefinition::new(
                1,
                "select_organization",
                "Select Organization",
                Manual,
                "Admin selects existing partner organization from list",
            ),
            StepDefinition::new(
                2,
                "input_user_details",
                "Input User Details",
                Manual,
                "Admin inputs user details and selects which Studio companies to grant access to",
            ),
            StepDefinition::new(
                3,
                "add_user_to_studio_companies",
                "Add User to Studio Companies",
                Auto,
                "Add user to selected Studio companies (TEST + PROD)",
            ),
            StepDefinition::new(
                4,
                "add_user_to_metabase_group",
                "Add User to Metabase Group",
                Auto,
                "Add user to the org's Metabase system group",
            ),
            StepDefinition::new(
                5,
                "add_user_to_teams_channel",
                "Add User to Teams Channel",
                Auto,
                "Add user to the org's Teams system group",
            ),
            StepDefinition::new(
                6,
                "add_user_to_slack_group",
                "Add User to Slack Group",
                Auto,
                "Add user to the org's Slack system group",
            ),
            StepDefinition::new(
                7,
                "create_studio_user_company",
                "Create User-Specific Studio Company",
                Auto,
                "Create a user-specific Studio company entry",
            ),
            StepDefinition::new(
                8,
                "send_studio_invite",
                "Send Studio Invite",
                Auto,
                "Send invite to Studio platform",
            ),
            StepDefinition::new(
                9,
                "share_documentation",
                "Share Documentation",
                Auto,
                "Send documentation links via email/Slack",
            ),
        ],
    }
}
