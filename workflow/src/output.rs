//! Mirrors fields of a successful automated step's output into domain
//! records right away, before the workflow completes.

use crate::context::FieldMap;
use crate::context::text_field;
use crate::records::SystemGroup;
use crate::records::Tool;
use crate::records::UserStudioCompany;
use crate::state::Execution;
use crate::store::StoreResult;
use crate::store::WorkflowStore;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait OutputApplier: Send + Sync {
    async fn apply(
        &self,
        store: &dyn WorkflowStore,
        execution: &Execution,
        output: &FieldMap,
    ) -> StoreResult<()>;
}

#[derive(Clone, Default)]
pub struct OutputRegistry {
    appliers: HashMap<String, Arc<dyn OutputApplier>>,
}

impl OutputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, step: impl Into<String>, applier: Arc<dyn OutputApplier>) -> &mut Self {
        self.appliers.insert(step.into(), applier);
        self
    }

    pub fn get(&self, step: &str) -> Option<&Arc<dyn OutputApplier>> {
        self.appliers.get(step)
    }

    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry
            .register("clone_metabase_collection", Arc::new(MetabaseCollection))
            .register("create_metabase_group", Arc::new(ToolGroup(Tool::Metabase)))
            .register("create_teams_channel", Arc::new(ToolGroup(Tool::Teams)))
            .register("create_slack_group", Arc::new(ToolGroup(Tool::Slack)))
            .register("create_studio_user_company", Arc::new(PersonalStudioCompany));
        registry
    }
}

/// Inserts the system group for `tool` unless (organization, tool) already
/// has one. Returns whether a row was written.
pub(crate) async fn record_system_group(
    store: &dyn WorkflowStore,
    organization_id: Uuid,
    tool: Tool,
    fields: impl Fn(&str) -> Option<String>,
) -> StoreResult<bool> {
    let (id_key, name_key) = tool.context_keys();
    let Some(external_id) = fields(id_key) else {
        return Ok(false);
    };
    let external_name = fields(name_key).unwrap_or_else(|| tool.as_str().to_string());
    let inserted = store
        .insert_system_group(SystemGroup::new(
            organization_id,
            tool,
            &external_name,
            &external_id,
        ))
        .await?;
    if !inserted {
        tracing::debug!(%organization_id, %tool, "system group already recorded");
    }
    Ok(inserted)
}

struct MetabaseCollection;

#[async_trait]
impl OutputApplier for MetabaseCollection {
    async fn apply(
        &self,
        store: &dyn WorkflowStore,
        execution: &Execution,
        output: &FieldMap,
    ) -> StoreResult<()> {
        let (Some(organization_id), Some(collection_id)) = (
            execution.organization_id,
            text_field(output, "metabase_collection_id"),
        ) else {
            return Ok(());
        };
        // Only an existing integration row is updated; the finalizer upserts.
        if let Some(mut integration) = store.integration(organization_id).await? {
            integration.metabase_collection_id = Some(collection_id.to_string());
            integration.updated_at = Utc::now();
            store.upsert_integration(integration).await?;
        }
        Ok(())
    }
}

struct ToolGroup(Tool);

#[async_trait]
impl OutputApplier for ToolGroup {
    async fn apply(
        &self,
        store: &dyn WorkflowStore,
        execution: &Execution,
        output: &FieldMap,
    ) -> StoreResult<()> {
        let Some(organization_id) = execution.organization_id else {
            return Ok(());
        };
        record_system_group(store, organization_id, self.0, |key| {
            text_field(output, key).map(str::to_string)
        })
        .await?;
        Ok(())
    }
}

struct PersonalStudioCompany;

#[async_trait]
impl OutputApplier for PersonalStudioCompany {
    async fn apply(
        &self,
        store: &dyn WorkflowStore,
        execution: &Execution,
        output: &FieldMap,
    ) -> StoreResult<()> {
        let (Some(user_id), Some(studio_id)) =
            (execution.user_id, text_field(output, "studio_user_company_id"))
        else {
            return Ok(());
        };
        let name = text_field(output, "studio_user_company_name").unwrap_or("Personal Studio");
        store
            .insert_user_studio_company(UserStudioCompany {
                id: Uuid::new_v4(),
                user_id,
                studio_id: studio_id.to_string(),
                name: name.to_string(),
                created_at: Utc::now(),
            })
            .await?;
        Ok(())
    }
}
