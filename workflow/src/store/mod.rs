//! Persistence boundary for the workflow engine.
//!
//! The engine only talks to [`WorkflowStore`]. Unique-keyed records are
//! written with `insert_*` methods that behave like `INSERT OR IGNORE`: they
//! return `false` instead of failing when the unique key already exists.

mod memory;
mod snapshot;

pub use memory::MemoryStore;

use crate::definition::WorkflowDefinition;
use crate::records::AccessGrant;
use crate::records::Organization;
use crate::records::OrganizationIntegration;
use crate::records::Resource;
use crate::records::StudioCompany;
use crate::records::SystemGroup;
use crate::records::User;
use crate::records::UserStudioAccess;
use crate::records::UserStudioCompany;
use crate::state::Execution;
use crate::state::ExecutionStatus;
use crate::state::StepExecution;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Filters for [`WorkflowStore::list_executions`]. Unset fields match all.
#[derive(Debug, Clone, Default)]
pub struct ExecutionFilter {
    pub status: Option<ExecutionStatus>,
    pub organization_id: Option<Uuid>,
    pub workflow_name: Option<String>,
}

impl ExecutionFilter {
    pub fn matches(&self, execution: &Execution) -> bool {
        self.status.is_none_or(|status| execution.status == status)
            && self
                .organization_id
                .is_none_or(|org| execution.organization_id == Some(org))
            && self
                .workflow_name
                .as_deref()
                .is_none_or(|name| execution.workflow_name == name)
    }
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Registers a definition unless one with the same name exists.
    /// Definitions are immutable once stored.
    async fn insert_workflow(&self, definition: WorkflowDefinition) -> StoreResult<bool>;
    async fn workflow(&self, id: Uuid) -> StoreResult<Option<WorkflowDefinition>>;
    async fn workflow_by_name(&self, name: &str) -> StoreResult<Option<WorkflowDefinition>>;
    async fn list_workflows(&self) -> StoreResult<Vec<WorkflowDefinition>>;

    /// Stores the execution and all of its step executions in one write.
    async fn create_execution(
        &self,
        execution: Execution,
        steps: Vec<StepExecution>,
    ) -> StoreResult<()>;
    async fn execution(&self, id: Uuid) -> StoreResult<Option<Execution>>;
    async fn update_execution(&self, execution: &Execution) -> StoreResult<()>;
    /// Newest first.
    async fn list_executions(&self, filter: &ExecutionFilter) -> StoreResult<Vec<Execution>>;
    /// Ordered by step order.
    async fn steps(&self, execution_id: Uuid) -> StoreResult<Vec<StepExecution>>;
    async fn update_step(&self, step: &StepExecution) -> StoreResult<()>;

    async fn insert_organization(&self, organization: Organization) -> StoreResult<bool>;
    async fn organization(&self, id: Uuid) -> StoreResult<Option<Organization>>;
    async fn organization_by_name(&self, name: &str) -> StoreResult<Option<Organization>>;
    async fn list_organizations(&self) -> StoreResult<Vec<Organization>>;

    async fn insert_user(&self, user: User) -> StoreResult<bool>;
    async fn user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn insert_studio_company(&self, company: StudioCompany) -> StoreResult<bool>;
    async fn studio_companies(&self, organization_id: Uuid) -> StoreResult<Vec<StudioCompany>>;

    async fn insert_user_studio_company(&self, company: UserStudioCompany) -> StoreResult<bool>;
    async fn user_studio_company(&self, user_id: Uuid) -> StoreResult<Option<UserStudioCompany>>;

    async fn integration(&self, organization_id: Uuid)
    -> StoreResult<Option<OrganizationIntegration>>;
    /// Keyed by organization: replaces the existing row, keeping its id.
    async fn upsert_integration(&self, integration: OrganizationIntegration) -> StoreResult<()>;

    async fn insert_system_group(&self, group: SystemGroup) -> StoreResult<bool>;
    async fn system_groups(&self, organization_id: Uuid) -> StoreResult<Vec<SystemGroup>>;

    async fn insert_user_studio_access(&self, access: UserStudioAccess) -> StoreResult<bool>;
    async fn user_studio_access(&self, user_id: Uuid) -> StoreResult<Vec<UserStudioAccess>>;

    async fn insert_resource(&self, resource: Resource) -> StoreResult<bool>;
    async fn list_resources(&self) -> StoreResult<Vec<Resource>>;

    async fn insert_access_grant(&self, grant: AccessGrant) -> StoreResult<bool>;
    async fn access_grants(&self, user_id: Uuid) -> StoreResult<Vec<AccessGrant>>;
}
