//! Reference data every deployment starts from.

use crate::definition::WorkflowDefinition;
use crate::records::AppRole;
use crate::records::Resource;
use crate::records::User;
use crate::store::StoreError;
use crate::store::StoreResult;
use crate::store::WorkflowStore;
use uuid::Uuid;

pub const ADMIN_EMAIL: &str = "admin@hyopps.local";

const RESOURCES: [(&str, &str, bool); 6] = [
    ("Studio", "studio", true),
    ("Metabase", "insights", true),
    ("Microsoft Teams", "communication", true),
    ("Slack", "communication", true),
    ("LMS", "learning", false),
    ("KeyCloak", "auth", false),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub admin_id: Uuid,
    pub workflows_added: usize,
    pub resources_added: usize,
}

/// Registers the resources, the built-in workflows plus `extra` definitions,
/// and the default admin. Records that already exist are left untouched, so
/// seeding twice is harmless.
pub async fn seed(
    store: &dyn WorkflowStore,
    extra: Vec<WorkflowDefinition>,
) -> StoreResult<SeedSummary> {
    let mut resources_added = 0;
    for (name, kind, has_api) in RESOURCES {
        if store.insert_resource(Resource::new(name, kind, has_api)).await? {
            resources_added += 1;
        }
    }

    let mut workflows_added = 0;
    for definition in WorkflowDefinition::builtin().into_iter().chain(extra) {
        let name = definition.name.clone();
        if store.insert_workflow(definition).await? {
            tracing::debug!(workflow = %name, "registered workflow definition");
            workflows_added += 1;
        }
    }

    store
        .insert_user(User::new("Admin", "User", ADMIN_EMAIL, AppRole::Admin))
        .await?;
    let admin = store
        .user_by_email(ADMIN_EMAIL)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("user {ADMIN_EMAIL}")))?;

    tracing::info!(workflows_added, resources_added, "store seeded");
    Ok(SeedSummary {
        admin_id: admin.id,
        workflows_added,
        resources_added,
    })
}
