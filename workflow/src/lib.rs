mod config;
mod context;
mod definition;
mod engine;
mod error;
mod executor;
mod finalize;
mod handlers;
mod layout;
mod output;
mod records;
mod report;
mod seed;
mod state;
pub mod store;

pub use config::EngineConfig;
pub use context::FieldMap;
pub use context::FieldValue;
pub use context::WorkflowContext;
pub use definition::NEW_PARTNER;
pub use definition::NEW_PARTNER_USER;
pub use definition::StepDefinition;
pub use definition::StepKind;
pub use definition::WorkflowDefinition;
pub use engine::StepRef;
pub use engine::WorkflowEngine;
pub use error::ErrorKind;
pub use error::WorkflowError;
pub use error::WorkflowResult;
pub use executor::AutomatedStep;
pub use executor::StepExecutor;
pub use executor::StepOutcome;
pub use executor::StepRegistry;
pub use executor::fake_id;
pub use finalize::Finalizer;
pub use finalize::FinalizerRegistry;
pub use handlers::HandlerRegistry;
pub use handlers::ManualInputHandler;
pub use layout::DataLayout;
pub use output::OutputApplier;
pub use output::OutputRegistry;
pub use records::AccessGrant;
pub use records::AppRole;
pub use records::Environment;
pub use records::Organization;
pub use records::OrganizationIntegration;
pub use records::Permission;
pub use records::Resource;
pub use records::StudioCompany;
pub use records::SystemGroup;
pub use records::Tool;
pub use records::User;
pub use records::UserStudioAccess;
pub use records::UserStudioCompany;
pub use report::ExecutionReport;
pub use seed::ADMIN_EMAIL;
pub use seed::SeedSummary;
pub use seed::seed;
pub use state::Execution;
pub use state::ExecutionStatus;
pub use state::StepExecution;
pub use state::StepStatus;
pub use store::ExecutionFilter;
pub use store::MemoryStore;
pub use store::StoreError;
pub use store::WorkflowStore;
