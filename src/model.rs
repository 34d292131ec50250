//! Core domain types for the settlement engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::Amount;
use crate::engine::AccessError;

/// Project identifier, issued by the project catalog.
pub type ProjectId = u32;

/// User identifier, issued by the identity provider.
pub type UserId = u32;

/// Payment transaction identifier.
pub type PaymentId = Uuid;

/// Share purchase identifier.
pub type PurchaseId = Uuid;

/// Capability carried by an authenticated identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Developer,
    Investor,
    Admin,
}

/// An authenticated caller, as handed over by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    pub role: Role,
}

impl Identity {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn developer(id: UserId) -> Self {
        Self::new(id, Role::Developer)
    }

    pub fn investor(id: UserId) -> Self {
        Self::new(id, Role::Investor)
    }

    pub fn admin(id: UserId) -> Self {
        Self::new(id, Role::Admin)
    }

    /// Ensure the identity carries the `required` role.
    pub fn require(&self, required: Role) -> Result<(), AccessError> {
        if self.role == required {
            Ok(())
        } else {
            Err(AccessError::Forbidden {
                user: self.id,
                role: self.role,
                required,
            })
        }
    }
}

/// Who an audit entry is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// An automated caller such as the payment gateway callback.
    System,
    User(UserId),
}

impl From<&Identity> for Actor {
    fn from(identity: &Identity) -> Self {
        Actor::User(identity.id)
    }
}

/// Review state of a project in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    #[default]
    Draft,
    Pending,
    /// The only state in which shares can be bought.
    Approved,
    Rejected,
    NeedsChanges,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Draft => "DRAFT",
            ProjectStatus::Pending => "PENDING",
            ProjectStatus::Approved => "APPROVED",
            ProjectStatus::Rejected => "REJECTED",
            ProjectStatus::NeedsChanges => "NEEDS_CHANGES",
        }
    }
}

/// State of a payment transaction. `Success` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Initiated,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PaymentStatus::Initiated)
    }
}

/// Attributes of a project being created by a developer.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub id: ProjectId,
    pub total_value: Amount,
    pub total_shares: i64,
}

/// A share purchase request from an investor.
///
/// `shares_requested` is signed so that non-positive quantities coming off the
/// wire are rejected as `InvalidQuantity` instead of failing to parse.
#[derive(Debug, Clone, Deserialize)]
pub struct InitiateRequest {
    pub project_id: ProjectId,
    pub shares_requested: i64,
    pub idempotency_key: String,
}

/// What the caller hands over to the payment gateway after initiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentReceipt {
    pub payment_id: PaymentId,
    pub total_amount: Amount,
    pub shares_requested: u32,
}

/// Asynchronous callback from the payment gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentCallback {
    pub payment_reference_id: String,
    #[serde(default)]
    pub gateway_payload: Value,
    pub success: bool,
}

impl PaymentCallback {
    pub fn new(reference: impl Into<String>, payload: Value, success: bool) -> Self {
        Self {
            payment_reference_id: reference.into(),
            gateway_payload: payload,
            success,
        }
    }
}

/// Settlement terms a gateway payload may carry. Every field is optional since
/// the gateway is not guaranteed to echo them back, least of all on failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PayloadTerms {
    pub project_id: Option<ProjectId>,
    pub investor_id: Option<UserId>,
    pub shares: Option<u32>,
}

impl PayloadTerms {
    /// Pick the settlement terms out of an opaque gateway payload.
    ///
    /// Numbers may arrive as JSON numbers or numeric strings; anything else is
    /// treated as absent.
    pub fn extract(payload: &Value) -> Self {
        fn number(value: Option<&Value>) -> Option<u32> {
            match value? {
                Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            }
        }

        Self {
            project_id: number(payload.get("project_id")),
            investor_id: number(payload.get("investor_id")),
            shares: number(payload.get("shares")),
        }
    }
}

/// A command applied by [`Engine::run`](crate::Engine::run).
#[derive(Debug, Clone)]
pub enum Command {
    CreateProject {
        developer: UserId,
        project: NewProject,
    },
    SubmitProject {
        developer: UserId,
        project: ProjectId,
    },
    ApproveProject {
        admin: UserId,
        project: ProjectId,
    },
    RejectProject {
        admin: UserId,
        project: ProjectId,
    },
    RequestChanges {
        admin: UserId,
        project: ProjectId,
    },
    Initiate {
        investor: UserId,
        request: InitiateRequest,
    },
    Confirm(PaymentCallback),
}
