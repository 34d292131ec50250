//! In-process ledger of projects, payment transactions and share purchases.
//!
//! Every record lives behind its own async mutex, which plays the part of a
//! row lock: holding the guard is holding `SELECT ... FOR UPDATE`. The table
//! maps are only locked long enough to find or insert a row, never while
//! waiting on a row, so row locks can be taken in any order per table without
//! the map locks joining a cycle.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::state::{PaymentTransaction, Project, SharePurchase};
use crate::model::{PaymentId, ProjectId};

/// Exclusive lock on a project row.
pub type ProjectRow = OwnedMutexGuard<Project>;

/// Exclusive lock on a payment transaction row.
pub type PaymentRow = OwnedMutexGuard<PaymentTransaction>;

/// A unique key was already present in a table.
#[derive(Debug, Error)]
#[error("unique constraint violated on {table}")]
pub struct UniqueViolation {
    pub table: &'static str,
}

#[derive(Default)]
pub struct Ledger {
    projects: RwLock<HashMap<ProjectId, Arc<Mutex<Project>>>>,
    /// Keyed by `reference_id`: the map itself is the unique index.
    payments: RwLock<HashMap<String, Arc<Mutex<PaymentTransaction>>>>,
    /// Keyed by payment: at most one purchase per payment. Each row carries
    /// its insertion sequence number.
    purchases: RwLock<HashMap<PaymentId, (u64, SharePurchase)>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_project(&self, project: Project) -> Result<(), UniqueViolation> {
        match self.projects.write().await.entry(project.id) {
            Entry::Occupied(_) => Err(UniqueViolation { table: "projects" }),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(project)));
                Ok(())
            }
        }
    }

    /// Lock a project row, waiting for any current holder to release it.
    pub async fn lock_project(&self, id: ProjectId) -> Option<ProjectRow> {
        let row = self.projects.read().await.get(&id).cloned()?;
        Some(row.lock_owned().await)
    }

    pub async fn project_ids(&self) -> Vec<ProjectId> {
        let mut ids: Vec<_> = self.projects.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub async fn contains_payment(&self, reference: &str) -> bool {
        self.payments.read().await.contains_key(reference)
    }

    pub async fn insert_payment(&self, payment: PaymentTransaction) -> Result<(), UniqueViolation> {
        match self.payments.write().await.entry(payment.reference_id.clone()) {
            Entry::Occupied(_) => Err(UniqueViolation { table: "payments" }),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(payment)));
                Ok(())
            }
        }
    }

    /// Lock a payment row by its gateway reference.
    pub async fn lock_payment(&self, reference: &str) -> Option<PaymentRow> {
        let row = self.payments.read().await.get(reference).cloned()?;
        Some(row.lock_owned().await)
    }

    pub async fn insert_purchase(&self, purchase: SharePurchase) -> Result<(), UniqueViolation> {
        let mut purchases = self.purchases.write().await;
        // rows are never removed, so the table size is a monotonic sequence
        let seq = purchases.len() as u64;
        match purchases.entry(purchase.payment) {
            Entry::Occupied(_) => Err(UniqueViolation { table: "purchases" }),
            Entry::Vacant(slot) => {
                slot.insert((seq, purchase));
                Ok(())
            }
        }
    }

    /// Purchases matching `filter`, most recently inserted first.
    pub async fn purchases_where(
        &self,
        filter: impl Fn(&SharePurchase) -> bool,
    ) -> Vec<SharePurchase> {
        let purchases = self.purchases.read().await;
        let mut found: Vec<_> = purchases
            .values()
            .filter(|(_, purchase)| filter(purchase))
            .collect();
        found.sort_unstable_by(|(a, _), (b, _)| b.cmp(a));
        found
            .into_iter()
            .map(|(_, purchase)| purchase.clone())
            .collect()
    }
}
