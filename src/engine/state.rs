use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::error::CatalogError;
use crate::Amount;
use crate::model::{
    NewProject, PaymentId, PaymentStatus, ProjectId, ProjectStatus, PurchaseId, UserId,
};

/// A project and its share inventory.
///
/// `shares_sold + shares_reserved <= total_shares` holds whenever the row lock
/// is released.
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: ProjectId,
    pub developer: UserId,
    pub total_shares: u32,
    pub share_price: Amount,
    pub shares_sold: u32,
    /// Shares held by initiated payments under hard reservation.
    pub shares_reserved: u32,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// Create a draft project, deriving the share price from its total value.
    pub fn new(developer: UserId, new: NewProject) -> Result<Self, CatalogError> {
        let total_shares = u32::try_from(new.total_shares)
            .ok()
            .filter(|shares| *shares > 0)
            .ok_or(CatalogError::InvalidShares(new.total_shares))?;

        if !new.total_value.is_positive() {
            return Err(CatalogError::InvalidValue);
        }
        let share_price = new
            .total_value
            .per_share(total_shares)
            .filter(|price| price.is_positive())
            // the fully sold project must stay representable
            .filter(|price| price.checked_mul(total_shares).is_some())
            .ok_or(CatalogError::InvalidValue)?;

        Ok(Self {
            id: new.id,
            developer,
            total_shares,
            share_price,
            shares_sold: 0,
            shares_reserved: 0,
            status: ProjectStatus::Draft,
            created_at: Utc::now(),
        })
    }

    pub fn is_investable(&self) -> bool {
        self.status == ProjectStatus::Approved
    }

    /// Shares neither sold nor held by a pending payment.
    pub fn available(&self) -> u32 {
        self.total_shares
            .saturating_sub(self.shares_sold)
            .saturating_sub(self.shares_reserved)
    }

    /// Money received for the shares sold so far.
    pub fn raised(&self) -> Amount {
        self.share_price.saturating_mul(self.shares_sold)
    }

    pub fn can_fit(&self, shares: u32) -> bool {
        shares <= self.available()
    }

    pub fn reserve(&mut self, shares: u32) {
        debug_assert!(self.can_fit(shares));
        self.shares_reserved += shares;
    }

    pub fn release(&mut self, shares: u32) {
        self.shares_reserved = self.shares_reserved.saturating_sub(shares);
    }

    /// Record a settled sale. Callers hold the row lock and have checked
    /// [`can_fit`](Self::can_fit) after releasing any reservation.
    pub fn record_sale(&mut self, shares: u32) {
        debug_assert!(self.can_fit(shares));
        self.shares_sold += shares;
    }
}

/// A payment attempt at the external gateway.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentTransaction {
    pub id: PaymentId,
    /// Gateway-visible reference, doubling as the idempotency key.
    pub reference_id: String,
    pub status: PaymentStatus,
    pub raw_payload: Option<Value>,
    pub project: ProjectId,
    pub investor: UserId,
    pub shares: u32,
    /// Share price at initiation; the purchase settles at this price.
    pub price_per_share: Amount,
    pub total_amount: Amount,
    /// Shares held on the project until this payment settles (hard policy only).
    pub reserved_shares: u32,
    pub created_at: DateTime<Utc>,
}

impl PaymentTransaction {
    pub fn initiated(
        reference_id: String,
        project: &Project,
        investor: UserId,
        shares: u32,
        total_amount: Amount,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            reference_id,
            status: PaymentStatus::Initiated,
            raw_payload: None,
            project: project.id,
            investor,
            shares,
            price_per_share: project.share_price,
            total_amount,
            reserved_shares: 0,
            created_at: Utc::now(),
        }
    }

    /// Move out of `Initiated`. The payload is only ever written here.
    pub fn finalize(&mut self, status: PaymentStatus, payload: Value) {
        debug_assert!(!self.status.is_terminal() && status.is_terminal());
        self.status = status;
        self.raw_payload = Some(payload);
        self.reserved_shares = 0;
    }
}

/// Settled ownership of shares, created once per successful payment.
#[derive(Debug, Clone, Serialize)]
pub struct SharePurchase {
    pub id: PurchaseId,
    pub investor: UserId,
    pub project: ProjectId,
    pub shares_purchased: u32,
    pub price_per_share: Amount,
    pub total_amount: Amount,
    pub payment: PaymentId,
    pub created_at: DateTime<Utc>,
}

impl SharePurchase {
    pub fn settle(payment: &PaymentTransaction) -> Self {
        Self {
            id: Uuid::new_v4(),
            investor: payment.investor,
            project: payment.project,
            shares_purchased: payment.shares,
            price_per_share: payment.price_per_share,
            total_amount: payment.total_amount,
            payment: payment.id,
            created_at: Utc::now(),
        }
    }
}
