//! Error types for settlement and catalog operations.

use thiserror::Error;

use crate::model::{PaymentStatus, ProjectId, ProjectStatus, Role, UserId};

/// Failure category surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any lock was taken or state touched.
    Validation,
    /// Not enough inventory once the project row was locked.
    Capacity,
    /// Gateway retry or forged callback.
    Protocol,
    Access,
    Catalog,
}

/// Top-level error returned by the public [`Engine`](super::Engine) operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("initiation failed: {0}")]
    Initiate(#[from] InitiateError),

    #[error("confirmation failed: {0}")]
    Confirm(#[from] ConfirmError),

    #[error("{0}")]
    Catalog(#[from] CatalogError),

    #[error("{0}")]
    Access(#[from] AccessError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Initiate(e) => e.kind(),
            EngineError::Confirm(e) => e.kind(),
            EngineError::Catalog(_) => ErrorKind::Catalog,
            EngineError::Access(_) => ErrorKind::Access,
        }
    }
}

/// Error during investment initiation.
#[derive(Debug, Error)]
pub enum InitiateError {
    #[error("duplicate payment request for key '{0}'")]
    DuplicateRequest(String),
    #[error("shares requested must be a positive whole number, got {0}")]
    InvalidQuantity(i64),
    #[error("idempotency key must be 1 to {max} characters long, got {len}")]
    InvalidKey { len: usize, max: usize },
    #[error("project {0} is not open for investment")]
    ProjectNotInvestable(ProjectId),
    #[error("not enough shares in project {project}: available {available}, requested {requested}")]
    InsufficientShares {
        project: ProjectId,
        available: u32,
        requested: u32,
    },
}

impl InitiateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InitiateError::DuplicateRequest(_)
            | InitiateError::InvalidQuantity(_)
            | InitiateError::InvalidKey { .. }
            | InitiateError::ProjectNotInvestable(_) => ErrorKind::Validation,
            InitiateError::InsufficientShares { .. } => ErrorKind::Capacity,
        }
    }
}

/// Error during payment confirmation.
#[derive(Debug, Error)]
pub enum ConfirmError {
    #[error("unknown payment reference '{0}'")]
    UnknownPayment(String),
    #[error("payment '{0}' already processed ({1:?})")]
    AlreadyProcessed(String, PaymentStatus),
    #[error("payload for payment '{0}' does not match the initiated purchase")]
    PayloadMismatch(String),
    #[error("oversell detected on project {project}: sold {sold} of {total}, requested {requested}")]
    OversellDetected {
        project: ProjectId,
        sold: u32,
        total: u32,
        requested: u32,
    },
}

impl ConfirmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfirmError::UnknownPayment(_)
            | ConfirmError::AlreadyProcessed(..)
            | ConfirmError::PayloadMismatch(_) => ErrorKind::Protocol,
            ConfirmError::OversellDetected { .. } => ErrorKind::Capacity,
        }
    }
}

/// Error during project catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("project {0} already exists")]
    DuplicateProject(ProjectId),
    #[error("project {0} not found")]
    UnknownProject(ProjectId),
    #[error("total shares must be a positive whole number, got {0}")]
    InvalidShares(i64),
    #[error("project value must be positive and yield a positive share price")]
    InvalidValue,
    #[error("project {project} cannot be {action} while {from:?}")]
    InvalidTransition {
        project: ProjectId,
        from: ProjectStatus,
        action: &'static str,
    },
}

/// Error raised by the role gate at the operation boundary.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("user {user} with role {role:?} is not allowed, {required:?} required")]
    Forbidden {
        user: UserId,
        role: Role,
        required: Role,
    },
    #[error("user {user} does not own project {project}")]
    NotOwner { user: UserId, project: ProjectId },
}
