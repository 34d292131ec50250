//! Project catalog: creation and the admin review lifecycle.

use super::Engine;
use super::error::{AccessError, CatalogError, EngineError};
use super::state::Project;
use crate::audit::{self, AuditEntry};
use crate::model::{Actor, Identity, NewProject, ProjectId, ProjectStatus, Role};

/// Outcome of an admin review of a pending project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Review {
    Approve,
    Reject(Option<String>),
    RequestChanges(Option<String>),
}

impl Review {
    fn target(&self) -> ProjectStatus {
        match self {
            Review::Approve => ProjectStatus::Approved,
            Review::Reject(_) => ProjectStatus::Rejected,
            Review::RequestChanges(_) => ProjectStatus::NeedsChanges,
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Review::Approve => "approved",
            Review::Reject(_) => "rejected",
            Review::RequestChanges(_) => "sent back for changes",
        }
    }

    fn audit_entry(self, actor: Actor, project: &Project) -> AuditEntry {
        let (action, note) = match self {
            Review::Approve => (audit::PROJECT_APPROVED, None),
            Review::Reject(reason) => (audit::PROJECT_REJECTED, Some(("reason", reason))),
            Review::RequestChanges(note) => {
                (audit::PROJECT_CHANGES_REQUESTED, Some(("note", note)))
            }
        };
        let entry = AuditEntry::new(actor, action, "Project", project.id)
            .with("developer_id", project.developer);
        match note {
            Some((key, value)) => entry.with(key, value),
            None => entry,
        }
    }
}

impl Engine {
    /// Register a new draft project owned by the calling developer.
    pub async fn create_project(
        &self,
        identity: &Identity,
        new: NewProject,
    ) -> Result<Project, EngineError> {
        let id = new.id;
        let result = self.register(identity, new).await;
        Self::log_result("create project", &id, &result);
        result
    }

    /// Hand a draft (or reworked) project to the admins for review.
    pub async fn submit_for_review(
        &self,
        identity: &Identity,
        project: ProjectId,
    ) -> Result<(), EngineError> {
        let result = self.submit(identity, project).await;
        Self::log_result("submit project", &project, &result);
        result
    }

    /// Approve, reject or send back a pending project.
    pub async fn review(
        &self,
        identity: &Identity,
        project: ProjectId,
        review: Review,
    ) -> Result<(), EngineError> {
        let result = self.apply_review(identity, project, review).await;
        Self::log_result("review project", &project, &result);
        result
    }

    async fn register(&self, identity: &Identity, new: NewProject) -> Result<Project, EngineError> {
        identity.require(Role::Developer)?;

        let project = Project::new(identity.id, new)?;
        let snapshot = project.clone();
        self.ledger
            .insert_project(project)
            .await
            .map_err(|_| CatalogError::DuplicateProject(snapshot.id))?;
        Ok(snapshot)
    }

    async fn submit(&self, identity: &Identity, id: ProjectId) -> Result<(), EngineError> {
        identity.require(Role::Developer)?;

        let mut project = self
            .ledger
            .lock_project(id)
            .await
            .ok_or(CatalogError::UnknownProject(id))?;

        if project.developer != identity.id {
            return Err(AccessError::NotOwner {
                user: identity.id,
                project: id,
            }
            .into());
        }
        if !matches!(
            project.status,
            ProjectStatus::Draft | ProjectStatus::NeedsChanges
        ) {
            return Err(CatalogError::InvalidTransition {
                project: id,
                from: project.status,
                action: "submitted",
            }
            .into());
        }

        project.status = ProjectStatus::Pending;
        Ok(())
    }

    async fn apply_review(
        &self,
        identity: &Identity,
        id: ProjectId,
        review: Review,
    ) -> Result<(), EngineError> {
        identity.require(Role::Admin)?;

        let entry = {
            let mut project = self
                .ledger
                .lock_project(id)
                .await
                .ok_or(CatalogError::UnknownProject(id))?;

            if project.status != ProjectStatus::Pending {
                return Err(CatalogError::InvalidTransition {
                    project: id,
                    from: project.status,
                    action: review.verb(),
                }
                .into());
            }

            project.status = review.target();
            review.audit_entry(Actor::from(identity), &project)
        };

        self.emit(entry);
        Ok(())
    }
}
