//! Record writing performed once an execution completes.
//!
//! Finalizers run after the execution is already marked completed, so an
//! error here is logged by the engine and never reverts the status. Every
//! write is keyed on a uniqueness rule, which makes running a finalizer twice
//! harmless.

use crate::context::WorkflowContext;
use crate::definition::NEW_PARTNER;
use crate::definition::NEW_PARTNER_USER;
use crate::output::record_system_group;
use crate::records::AccessGrant;
use crate::records::OrganizationIntegration;
use crate::records::Permission;
use crate::records::Tool;
use crate::records::UserStudioAccess;
use crate::state::Execution;
use crate::store::WorkflowStore;
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait Finalizer: Send + Sync {
    async fn finalize(
        &self,
        store: &dyn WorkflowStore,
        execution: &Execution,
        context: &WorkflowContext,
    ) -> anyhow::Result<()>;
}

#[derive(Clone, Default)]
pub struct FinalizerRegistry {
    finalizers: HashMap<String, Arc<dyn Finalizer>>,
}

impl FinalizerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        workflow: impl Into<String>,
        finalizer: Arc<dyn Finalizer>,
    ) -> &mut Self {
        self.finalizers.insert(workflow.into(), finalizer);
        self
    }

    pub fn get(&self, workflow: &str) -> Option<&Arc<dyn Finalizer>> {
        self.finalizers.get(workflow)
    }

    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry
            .register(NEW_PARTNER, Arc::new(NewPartnerFinalizer))
            .register(NEW_PARTNER_USER, Arc::new(NewPartnerUserFinalizer));
        registry
    }
}

/// Confirms integrations and records every tool group of the partner.
pub struct NewPartnerFinalizer;

#[async_trait]
impl Finalizer for NewPartnerFinalizer {
    async fn finalize(
        &self,
        store: &dyn WorkflowStore,
        execution: &Execution,
        context: &WorkflowContext,
    ) -> anyhow::Result<()> {
        let organization_id = execution
            .organization_id
            .with_context(|| format!("execution {} has no organization linked", execution.id))?;

        let mut integration = store
            .integration(organization_id)
            .await?
            .unwrap_or_else(|| OrganizationIntegration::empty(organization_id));
        // Confirmations only ever move from false to true.
        integration.keycloak_confirmed |= context.is_truthy("keycloak_confirmed");
        if let Some(cluster) = context.text("keycloak_cluster") {
            integration.keycloak_cluster = Some(cluster.to_string());
        }
        if let Some(collection_id) = context.text("metabase_collection_id") {
            integration.metabase_collection_id = Some(collection_id.to_string());
        }
        integration.lms_confirmed |= context.is_truthy("lms_confirmed");
        integration.updated_at = Utc::now();
        store.upsert_integration(integration).await?;

        for tool in Tool::ALL {
            record_system_group(store, organization_id, tool, |key| {
                context.text(key).map(str::to_string)
            })
            .await?;
        }
        tracing::info!(%organization_id, execution_id = %execution.id, "partner onboarding finalized");
        Ok(())
    }
}

/// Grants the new user Studio access and read access to every resource.
pub struct NewPartnerUserFinalizer;

#[async_trait]
impl Finalizer for NewPartnerUserFinalizer {
    async fn finalize(
        &self,
        store: &dyn WorkflowStore,
        execution: &Execution,
        context: &WorkflowContext,
    ) -> anyhow::Result<()> {
        let user_id = execution
            .user_id
            .with_context(|| format!("execution {} has no user linked", execution.id))?;
        let requested_by = execution
            .requested_by
            .with_context(|| format!("execution {} has no requester", execution.id))?;

        for raw_id in context.list("selected_studio_company_ids").unwrap_or_default() {
            let Ok(studio_company_id) = Uuid::parse_str(raw_id) else {
                tracing::warn!(studio_company_id = %raw_id, "skipping non-uuid studio company id");
                continue;
            };
            store
                .insert_user_studio_access(UserStudioAccess {
                    id: Uuid::new_v4(),
                    user_id,
                    studio_company_id,
                    granted_at: Utc::now(),
                    revoked_at: None,
                })
                .await?;
        }

        for resource in store.list_resources().await? {
            store
                .insert_access_grant(AccessGrant {
                    id: Uuid::new_v4(),
                    user_id,
                    resource_id: resource.id,
                    permission: Permission::Read,
                    granted_by: Some(requested_by),
                    granted_at: Utc::now(),
                    revoked_at: None,
                    execution_id: Some(execution.id),
                })
                .await?;
        }
        tracing::info!(%user_id, execution_id = %execution.id, "partner user onboarding finalized");
        Ok(())
    }
}
