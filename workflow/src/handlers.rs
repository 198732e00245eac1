//! Handlers applied when a human submits input for a manual step.
//!
//! A handler only checks that its identifying fields are present. When they
//! are missing it performs no mutation and the submission still completes
//! the step with the raw input recorded.

use crate::context::FieldMap;
use crate::context::list_field;
use crate::context::text_field;
use crate::records::AppRole;
use crate::records::Environment;
use crate::records::Organization;
use crate::records::OrganizationIntegration;
use crate::records::StudioCompany;
use crate::records::User;
use crate::state::Execution;
use crate::store::StoreError;
use crate::store::StoreResult;
use crate::store::WorkflowStore;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait ManualInputHandler: Send + Sync {
    /// Fields that must be present and non-empty for [`apply`] to run.
    ///
    /// [`apply`]: ManualInputHandler::apply
    fn required_fields(&self) -> &'static [&'static str];

    fn validate(&self, input: &FieldMap) -> bool {
        self.required_fields()
            .iter()
            .all(|field| text_field(input, field).is_some())
    }

    /// Mutates domain records. Links made on `execution` are persisted by the
    /// caller, also when this returns an error.
    ///
    /// Store writes here are not transactional, so a failure can leave some
    /// records written. Implementations must find-or-insert so that running
    /// again on the same input converges instead of duplicating rows.
    async fn apply(
        &self,
        store: &dyn WorkflowStore,
        execution: &mut Execution,
        input: &FieldMap,
    ) -> StoreResult<()>;
}

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ManualInputHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        step: impl Into<String>,
        handler: Arc<dyn ManualInputHandler>,
    ) -> &mut Self {
        self.handlers.insert(step.into(), handler);
        self
    }

    pub fn get(&self, step: &str) -> Option<&Arc<dyn ManualInputHandler>> {
        self.handlers.get(step)
    }

    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry
            .register("input_studio_companies", Arc::new(StudioCompaniesInput))
            .register("select_organization", Arc::new(SelectOrganization))
            .register("input_user_details", Arc::new(UserDetailsInput))
            .register("trigger_infrabot", Arc::new(InfrabotConfirmation));
        registry
    }
}

/// Creates or finds the partner organization and its Studio companies.
pub struct StudioCompaniesInput;

#[async_trait]
impl ManualInputHandler for StudioCompaniesInput {
    fn required_fields(&self) -> &'static [&'static str] {
        &["organization_name"]
    }

    async fn apply(
        &self,
        store: &dyn WorkflowStore,
        execution: &mut Execution,
        input: &FieldMap,
    ) -> StoreResult<()> {
        let Some(org_name) = text_field(input, "organization_name") else {
            return Ok(());
        };

        let organization = match store.organization_by_name(org_name).await? {
            Some(existing) => existing,
            None => {
                let organization = Organization::partner(org_name);
                if store.insert_organization(organization.clone()).await? {
                    tracing::info!(organization = %org_name, "created partner organization");
                    organization
                } else {
                    store
                        .organization_by_name(org_name)
                        .await?
                        .ok_or_else(|| StoreError::NotFound(format!("organization {org_name}")))?
                }
            }
        };
        execution.organization_id = Some(organization.id);

        if store.integration(organization.id).await?.is_none() {
            store
                .upsert_integration(OrganizationIntegration::empty(organization.id))
                .await?;
        }

        for (environment, id_key, name_key) in [
            (Environment::Test, "studio_company_id_test", "studio_company_name_test"),
            (Environment::Prod, "studio_company_id_prod", "studio_company_name_prod"),
        ] {
            let Some(studio_id) = text_field(input, id_key) else {
                continue;
            };
            let name = text_field(input, name_key)
                .map(str::to_string)
                .unwrap_or_else(|| format!("{org_name} {}", environment.suffix()));
            let inserted = store
                .insert_studio_company(StudioCompany {
                    id: Uuid::new_v4(),
                    organization_id: organization.id,
                    studio_id: studio_id.to_string(),
                    name,
                    environment,
                    created_at: Utc::now(),
                })
                .await?;
            if !inserted {
                tracing::debug!(studio_id, "studio company already registered");
            }
        }
        Ok(())
    }
}

/// Links an existing organization picked from a list.
pub struct SelectOrganization;

#[async_trait]
impl ManualInputHandler for SelectOrganization {
    fn required_fields(&self) -> &'static [&'static str] {
        &["organization_id"]
    }

    async fn apply(
        &self,
        store: &dyn WorkflowStore,
        execution: &mut Execution,
        input: &FieldMap,
    ) -> StoreResult<()> {
        let Some(raw_id) = text_field(input, "organization_id") else {
            return Ok(());
        };
        let Ok(organization_id) = Uuid::parse_str(raw_id) else {
            tracing::warn!(organization_id = raw_id, "organization id is not a uuid; not linking");
            return Ok(());
        };
        if store.organization(organization_id).await?.is_none() {
            tracing::warn!(%organization_id, "selected organization does not exist; not linking");
            return Ok(());
        }
        execution.organization_id = Some(organization_id);
        Ok(())
    }
}

/// Creates or finds the user by email and links it to the execution.
pub struct UserDetailsInput;

#[async_trait]
impl ManualInputHandler for UserDetailsInput {
    fn required_fields(&self) -> &'static [&'static str] {
        &["email"]
    }

    async fn apply(
        &self,
        store: &dyn WorkflowStore,
        execution: &mut Execution,
        input: &FieldMap,
    ) -> StoreResult<()> {
        let Some(email) = text_field(input, "email") else {
            return Ok(());
        };

        let user = match store.user_by_email(email).await? {
            Some(existing) => existing,
            None => {
                let mut user = User::new(
                    text_field(input, "firstname").unwrap_or_default(),
                    text_field(input, "lastname").unwrap_or_default(),
                    email,
                    AppRole::User,
                );
                user.languages = list_field(input, "languages");
                user.skills = list_field(input, "skills");
                user.roles = list_field(input, "roles");
                user.organization_id = execution.organization_id;
                if store.insert_user(user.clone()).await? {
                    tracing::info!(email, "created partner user");
                    user
                } else {
                    store
                        .user_by_email(email)
                        .await?
                        .ok_or_else(|| StoreError::NotFound(format!("user {email}")))?
                }
            }
        };
        execution.user_id = Some(user.id);
        Ok(())
    }
}

/// Records the KeyCloak confirmation once Infrabot has run.
pub struct InfrabotConfirmation;

#[async_trait]
impl ManualInputHandler for InfrabotConfirmation {
    fn required_fields(&self) -> &'static [&'static str] {
        &[]
    }

    async fn apply(
        &self,
        store: &dyn WorkflowStore,
        execution: &mut Execution,
        input: &FieldMap,
    ) -> StoreResult<()> {
        let Some(organization_id) = execution.organization_id else {
            tracing::warn!(execution_id = %execution.id, "no organization linked; skipping keycloak confirmation");
            return Ok(());
        };
        let mut integration = store
            .integration(organization_id)
            .await?
            .unwrap_or_else(|| OrganizationIntegration::empty(organization_id));
        integration.keycloak_confirmed = true;
        integration.keycloak_cluster = text_field(input, "keycloak_cluster").map(str::to_string);
        integration.updated_at = Utc::now();
        store.upsert_integration(integration).await
    }
}
