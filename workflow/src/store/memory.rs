use super::ExecutionFilter;
use super::StoreError;
use super::StoreResult;
use super::WorkflowStore;
use super::snapshot;
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
use crate::state::StepExecution;
use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::path::PathBuf;
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub(super) struct Tables {
    workflows: BTreeMap<Uuid, WorkflowDefinition>,
    executions: BTreeMap<Uuid, Execution>,
    step_executions: BTreeMap<Uuid, StepExecution>,
    organizations: BTreeMap<Uuid, Organization>,
    users: BTreeMap<Uuid, User>,
    studio_companies: BTreeMap<Uuid, StudioCompany>,
    user_studio_companies: BTreeMap<Uuid, UserStudioCompany>,
    /// Keyed by organization id.
    integrations: BTreeMap<Uuid, OrganizationIntegration>,
    system_groups: BTreeMap<Uuid, SystemGroup>,
    user_studio_access: BTreeMap<Uuid, UserStudioAccess>,
    resources: BTreeMap<Uuid, Resource>,
    access_grants: BTreeMap<Uuid, AccessGrant>,
}

/// Store backed by in-process maps. Uniqueness constraints are enforced the
/// same way a relational backend would enforce them.
///
/// When opened with [`MemoryStore::open`], every write is followed by a JSON
/// snapshot of all tables to the given file, and the store holds an exclusive
/// lock on that file until it is dropped. A second `open` of the same path,
/// from this process or another one, waits for the lock and then loads the
/// tables the first holder left behind.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    snapshot_path: Option<PathBuf>,
    _lock_file: Option<File>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let lock_file = snapshot::lock(path)?;
        let tables = if path.exists() {
            snapshot::load(path)?
        } else {
            Tables::default()
        };
        tracing::debug!(path = %path.display(), "workflow store locked and loaded");
        Ok(Self {
            tables: RwLock::new(tables),
            snapshot_path: Some(path.to_path_buf()),
            _lock_file: Some(lock_file),
        })
    }

    fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> StoreResult<R> {
        let guard = self
            .tables
            .read()
            .map_err(|_| StoreError::Backend("tables lock poisoned".to_string()))?;
        Ok(f(&guard))
    }

    fn write<R>(&self, f: impl FnOnce(&mut Tables) -> StoreResult<R>) -> StoreResult<R> {
        let mut guard = self
            .tables
            .write()
            .map_err(|_| StoreError::Backend("tables lock poisoned".to_string()))?;
        let result = f(&mut guard)?;
        if let Some(path) = &self.snapshot_path {
            snapshot::save(&guard, path).map_err(|err| StoreError::Backend(format!("{err:#}")))?;
        }
        Ok(result)
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn insert_workflow(&self, definition: WorkflowDefinition) -> StoreResult<bool> {
        self.write(|tables| {
            if tables
                .workflows
                .values()
                .any(|existing| existing.name == definition.name)
            {
                return Ok(false);
            }
            if tables.workflows.contains_key(&definition.id) {
                return Err(StoreError::Conflict(format!(
                    "workflow {} already exists",
                    definition.id
                )));
            }
            tables.workflows.insert(definition.id, definition);
            Ok(true)
        })
    }

    async fn workflow(&self, id: Uuid) -> StoreResult<Option<WorkflowDefinition>> {
        self.read(|tables| tables.workflows.get(&id).cloned())
    }

    async fn workflow_by_name(&self, name: &str) -> StoreResult<Option<WorkflowDefinition>> {
        self.read(|tables| {
            tables
                .workflows
                .values()
                .find(|definition| definition.name == name)
                .cloned()
        })
    }

    async fn list_workflows(&self) -> StoreResult<Vec<WorkflowDefinition>> {
        self.read(|tables| {
            let mut workflows: Vec<WorkflowDefinition> =
                tables.workflows.values().cloned().collect();
            workflows.sort_by(|a, b| a.name.cmp(&b.name));
            workflows
        })
    }

    async fn create_execution(
        &self,
        execution: Execution,
        steps: Vec<StepExecution>,
    ) -> StoreResult<()> {
        self.write(|tables| {
            if tables.executions.contains_key(&execution.id) {
                return Err(StoreError::Conflict(format!(
                    "execution {} already exists",
                    execution.id
                )));
            }
            if let Some(step) = steps.iter().find(|step| step.execution_id != execution.id) {
                return Err(StoreError::Conflict(format!(
                    "step {} belongs to execution {}",
                    step.id, step.execution_id
                )));
            }
            for step in steps {
                tables.step_executions.insert(step.id, step);
            }
            tables.executions.insert(execution.id, execution);
            Ok(())
        })
    }

    async fn execution(&self, id: Uuid) -> StoreResult<Option<Execution>> {
        self.read(|tables| tables.executions.get(&id).cloned())
    }

    async fn update_execution(&self, execution: &Execution) -> StoreResult<()> {
        self.write(|tables| match tables.executions.get_mut(&execution.id) {
            Some(existing) => {
                *existing = execution.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("execution {}", execution.id))),
        })
    }

    async fn list_executions(&self, filter: &ExecutionFilter) -> StoreResult<Vec<Execution>> {
        self.read(|tables| {
            let mut executions: Vec<Execution> = tables
                .executions
                .values()
                .filter(|execution| filter.matches(execution))
                .cloned()
                .collect();
            executions.sort_by_key(|execution| std::cmp::Reverse(execution.created_at));
            executions
        })
    }

    async fn steps(&self, execution_id: Uuid) -> StoreResult<Vec<StepExecution>> {
        self.read(|tables| {
            let mut steps: Vec<StepExecution> = tables
                .step_executions
                .values()
                .filter(|step| step.execution_id == execution_id)
                .cloned()
                .collect();
            steps.sort_by_key(|step| step.step_order);
            steps
        })
    }

    async fn update_step(&self, step: &StepExecution) -> StoreResult<()> {
        self.write(|tables| match tables.step_executions.get_mut(&step.id) {
            Some(existing) => {
                *existing = step.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("step execution {}", step.id))),
        })
    }

    async fn insert_organization(&self, organization: Organization) -> StoreResult<bool> {
        self.write(|tables| {
            if tables
                .organizations
                .values()
                .any(|existing| existing.name == organization.name)
            {
                return Ok(false);
            }
            tables.organizations.insert(organization.id, organization);
            Ok(true)
        })
    }

    async fn organization(&self, id: Uuid) -> StoreResult<Option<Organization>> {
        self.read(|tables| tables.organizations.get(&id).cloned())
    }

    async fn organization_by_name(&self, name: &str) -> StoreResult<Option<Organization>> {
        self.read(|tables| {
            tables
                .organizations
                .values()
                .find(|organization| organization.name == name)
                .cloned()
        })
    }

    async fn list_organizations(&self) -> StoreResult<Vec<Organization>> {
        self.read(|tables| {
            let mut organizations: Vec<Organization> =
                tables.organizations.values().cloned().collect();
            organizations.sort_by(|a, b| a.name.cmp(&b.name));
            organizations
        })
    }

    async fn insert_user(&self, user: User) -> StoreResult<bool> {
        self.write(|tables| {
            if tables
                .users
                .values()
                .any(|existing| existing.email == user.email)
            {
                return Ok(false);
            }
            tables.users.insert(user.id, user);
            Ok(true)
        })
    }

    async fn user(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.read(|tables| tables.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.read(|tables| {
            tables
                .users
                .values()
                .find(|user| user.email == email)
                .cloned()
        })
    }

    async fn insert_studio_company(&self, company: StudioCompany) -> StoreResult<bool> {
        self.write(|tables| {
            if tables
                .studio_companies
                .values()
                .any(|existing| existing.studio_id == company.studio_id)
            {
                return Ok(false);
            }
            tables.studio_companies.insert(company.id, company);
            Ok(true)
        })
    }

    async fn studio_companies(&self, organization_id: Uuid) -> StoreResult<Vec<StudioCompany>> {
        self.read(|tables| {
            tables
                .studio_companies
                .values()
                .filter(|company| company.organization_id == organization_id)
                .cloned()
                .collect()
        })
    }

    async fn insert_user_studio_company(&self, company: UserStudioCompany) -> StoreResult<bool> {
        self.write(|tables| {
            if tables.user_studio_companies.values().any(|existing| {
                existing.user_id == company.user_id || existing.studio_id == company.studio_id
            }) {
                return Ok(false);
            }
            tables.user_studio_companies.insert(company.id, company);
            Ok(true)
        })
    }

    async fn user_studio_company(&self, user_id: Uuid) -> StoreResult<Option<UserStudioCompany>> {
        self.read(|tables| {
            tables
                .user_studio_companies
                .values()
                .find(|company| company.user_id == user_id)
                .cloned()
        })
    }

    async fn integration(
        &self,
        organization_id: Uuid,
    ) -> StoreResult<Option<OrganizationIntegration>> {
        self.read(|tables| tables.integrations.get(&organization_id).cloned())
    }

    async fn upsert_integration(&self, integration: OrganizationIntegration) -> StoreResult<()> {
        self.write(|tables| {
            match tables.integrations.get_mut(&integration.organization_id) {
                Some(existing) => {
                    let id = existing.id;
                    *existing = OrganizationIntegration { id, ..integration };
                }
                None => {
                    tables
                        .integrations
                        .insert(integration.organization_id, integration);
                }
            }
            Ok(())
        })
    }

    async fn insert_system_group(&self, group: SystemGroup) -> StoreResult<bool> {
        self.write(|tables| {
            if tables.system_groups.values().any(|existing| {
                existing.organization_id == group.organization_id && existing.tool == group.tool
            }) {
                return Ok(false);
            }
            tables.system_groups.insert(group.id, group);
            Ok(true)
        })
    }

    async fn system_groups(&self, organization_id: Uuid) -> StoreResult<Vec<SystemGroup>> {
        self.read(|tables| {
            tables
                .system_groups
                .values()
                .filter(|group| group.organization_id == organization_id)
                .cloned()
                .collect()
        })
    }

    async fn insert_user_studio_access(&self, access: UserStudioAccess) -> StoreResult<bool> {
        self.write(|tables| {
            if tables.user_studio_access.values().any(|existing| {
                existing.user_id == access.user_id
                    && existing.studio_company_id == access.studio_company_id
            }) {
                return Ok(false);
            }
            tables.user_studio_access.insert(access.id, access);
            Ok(true)
        })
    }

    async fn user_studio_access(&self, user_id: Uuid) -> StoreResult<Vec<UserStudioAccess>> {
        self.read(|tables| {
            tables
                .user_studio_access
                .values()
                .filter(|access| access.user_id == user_id)
                .cloned()
                .collect()
        })
    }

    async fn insert_resource(&self, resource: Resource) -> StoreResult<bool> {
        self.write(|tables| {
            if tables
                .resources
                .values()
                .any(|existing| existing.name == resource.name)
            {
                return Ok(false);
            }
            tables.resources.insert(resource.id, resource);
            Ok(true)
        })
    }

    async fn list_resources(&self) -> StoreResult<Vec<Resource>> {
        self.read(|tables| {
            let mut resources: Vec<Resource> = tables.resources.values().cloned().collect();
            resources.sort_by(|a, b| a.name.cmp(&b.name));
            resources
        })
    }

    async fn insert_access_grant(&self, grant: AccessGrant) -> StoreResult<bool> {
        self.write(|tables| {
            if tables.access_grants.values().any(|existing| {
                existing.user_id == grant.user_id && existing.resource_id == grant.resource_id
            }) {
                return Ok(false);
            }
            tables.access_grants.insert(grant.id, grant);
            Ok(true)
        })
    }

    async fn access_grants(&self, user_id: Uuid) -> StoreResult<Vec<AccessGrant>> {
        self.read(|tables| {
            tables
                .access_grants
                .values()
                .filter(|grant| grant.user_id == user_id)
                .cloned()
                .collect()
        })
    }
}
