//! Domain records the workflows create and link while they run.

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub account_types: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub fn partner(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            account_types: vec!["partner".to_string()],
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppRole {
    Admin,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub languages: Vec<String>,
    pub skills: Vec<String>,
    pub roles: Vec<String>,
    pub organization_id: Option<Uuid>,
    pub app_role: AppRole,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(firstname: &str, lastname: &str, email: &str, app_role: AppRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            firstname: firstname.to_string(),
            lastname: lastname.to_string(),
            email: email.to_string(),
            languages: Vec::new(),
            skills: Vec::new(),
            roles: Vec::new(),
            organization_id: None,
            app_role,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Test,
    Prod,
}

impl Environment {
    pub fn suffix(self) -> &'static str {
        match self {
            Environment::Test => "TEST",
            Environment::Prod => "PROD",
        }
    }
}

/// A company provisioned in Studio; `studio_id` is the external id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudioCompany {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub studio_id: String,
    pub name: String,
    pub environment: Environment,
    pub created_at: DateTime<Utc>,
}

/// Personal Studio company created for a single user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserStudioCompany {
    pub id: Uuid,
    pub user_id: Uuid,
    pub studio_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Metabase,
    Teams,
    Slack,
}

impl Tool {
    pub const ALL: [Tool; 3] = [Tool::Metabase, Tool::Teams, Tool::Slack];

    pub fn as_str(self) -> &'static str {
        match self {
            Tool::Metabase => "metabase",
            Tool::Teams => "teams",
            Tool::Slack => "slack",
        }
    }

    /// Context keys carrying this tool's external id and display name.
    pub fn context_keys(self) -> (&'static str, &'static str) {
        match self {
            Tool::Metabase => ("metabase_group_id", "metabase_group_name"),
            Tool::Teams => ("teams_channel_id", "teams_channel_name"),
            Tool::Slack => ("slack_group_id", "slack_group_handle"),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External group for one tool; unique per (organization, tool).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemGroup {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub tool: Tool,
    pub external_name: String,
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SystemGroup {
    pub fn new(organization_id: Uuid, tool: Tool, external_name: &str, external_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            tool,
            external_name: external_name.to_string(),
            external_id: Some(external_id.to_string()),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrganizationIntegration {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub keycloak_confirmed: bool,
    pub keycloak_cluster: Option<String>,
    pub metabase_collection_id: Option<String>,
    pub lms_confirmed: bool,
    pub updated_at: DateTime<Utc>,
}

impl OrganizationIntegration {
    pub fn empty(organization_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            keycloak_confirmed: false,
            keycloak_cluster: None,
            metabase_collection_id: None,
            lms_confirmed: false,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserStudioAccess {
    pub id: Uuid,
    pub user_id: Uuid,
    pub studio_company_id: Uuid,
    pub granted_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resource {
    pub id: Uuid,
    pub name: String,
    pub kind: String,
    pub has_api: bool,
}

impl Resource {
    pub fn new(name: &str, kind: &str, has_api: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            kind: kind.to_string(),
            has_api,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    Write,
    Admin,
}

/// Permission on one resource; unique per (user, resource).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessGrant {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resource_id: Uuid,
    pub permission: Permission,
    pub granted_by: Option<Uuid>,
    pub granted_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub execution_id: Option<Uuid>,
}
