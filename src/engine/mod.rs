//! Settlement engine.
//!
//! The engine owns the ledger and exposes the boundary operations: project
//! review, investment initiation and payment confirmation. Each public
//! operation checks the caller's role once and then runs lock-protected logic
//! that never looks at roles again.
//! Also supports an async stream of commands.

use std::fmt::Display;
use std::sync::Arc;

use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::audit::{AuditEntry, AuditSink, TracingAuditSink};
use crate::config::Config;
use crate::model::{Actor, Command, Identity, ProjectId, UserId};

mod catalog;
mod dashboard;
mod error;
mod settlement;
mod state;
mod store;

pub use catalog::Review;
pub use dashboard::{AdminSummary, DeveloperSummary, InvestorSummary};
pub use error::{AccessError, CatalogError, ConfirmError, EngineError, ErrorKind, InitiateError};
pub use state::{PaymentTransaction, Project, SharePurchase};
pub use store::{Ledger, UniqueViolation};

/// The settlement engine. Share it behind an `Arc` to serve concurrent callers.
pub struct Engine {
    ledger: Ledger,
    audit: Arc<dyn AuditSink>,
    config: Config,
}

/// Public API
impl Engine {
    pub fn new(config: Config) -> Self {
        Self::with_audit(config, Arc::new(TracingAuditSink))
    }

    pub fn with_audit(config: Config, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            ledger: Ledger::new(),
            audit,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the engine with the given command stream
    pub async fn run(&self, mut stream: impl Stream<Item = Command> + Unpin) {
        while let Some(command) = stream.next().await {
            // failures are logged by each operation and must not stop the engine
            let _ = self.apply(command).await;
        }
    }

    /// Apply a single command on top of the current ledger state
    pub async fn apply(&self, command: Command) -> Result<(), EngineError> {
        match command {
            Command::CreateProject { developer, project } => {
                self.create_project(&Identity::developer(developer), project)
                    .await?;
            }
            Command::SubmitProject { developer, project } => {
                self.submit_for_review(&Identity::developer(developer), project)
                    .await?;
            }
            Command::ApproveProject { admin, project } => {
                self.review(&Identity::admin(admin), project, Review::Approve)
                    .await?;
            }
            Command::RejectProject { admin, project } => {
                self.review(&Identity::admin(admin), project, Review::Reject(None))
                    .await?;
            }
            Command::RequestChanges { admin, project } => {
                self.review(&Identity::admin(admin), project, Review::RequestChanges(None))
                    .await?;
            }
            Command::Initiate { investor, request } => {
                self.initiate(&Identity::investor(investor), request).await?;
            }
            Command::Confirm(callback) => {
                self.confirm(Actor::System, callback).await?;
            }
        }
        Ok(())
    }

    /// Snapshot of one project, read under its row lock.
    pub async fn project(&self, id: ProjectId) -> Option<Project> {
        let row = self.ledger.lock_project(id).await?;
        Some(row.clone())
    }

    /// Snapshots of all projects, ordered by id.
    pub async fn projects(&self) -> Vec<Project> {
        let mut projects = Vec::new();
        for id in self.ledger.project_ids().await {
            if let Some(project) = self.project(id).await {
                projects.push(project);
            }
        }
        projects
    }

    /// Snapshot of a payment transaction by gateway reference.
    pub async fn payment(&self, reference: &str) -> Option<PaymentTransaction> {
        let row = self.ledger.lock_payment(reference).await?;
        Some(row.clone())
    }

    /// An investor's purchases, newest first.
    pub async fn purchases_for_investor(&self, investor: UserId) -> Vec<SharePurchase> {
        self.ledger
            .purchases_where(|purchase| purchase.investor == investor)
            .await
    }

    /// A project's purchases, newest first.
    pub async fn purchases_for_project(&self, project: ProjectId) -> Vec<SharePurchase> {
        self.ledger
            .purchases_where(|purchase| purchase.project == project)
            .await
    }
}

/// Private API
impl Engine {
    /// Small helper to log operation results
    fn log_result<T>(operation: &str, subject: &dyn Display, result: &Result<T, EngineError>) {
        match result {
            Ok(_) => info!(subject = %subject, "{operation} applied"),
            Err(e) => info!(
                subject = %subject,
                kind = ?e.kind(),
                reason = %e,
                "{operation} skipped"
            ),
        }
    }

    /// Hand an entry to the audit sink. A failing sink is logged, never fatal.
    fn emit(&self, entry: AuditEntry) {
        let action = entry.action;
        let entity_id = entry.entity_id.clone();
        if let Err(e) = self.audit.record(entry) {
            warn!(action, entity_id = %entity_id, reason = %e, "audit record dropped");
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
