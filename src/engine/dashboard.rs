//! Per-role totals read off the settlement ledger.

use serde::Serialize;

use super::Engine;
use super::error::EngineError;
use super::state::Project;
use crate::Amount;
use crate::model::{Identity, ProjectStatus, Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvestorSummary {
    /// Settled purchases.
    pub total_investments: usize,
    pub portfolio_value: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeveloperSummary {
    pub total_projects: usize,
    pub total_shares_sold: u64,
    /// Shares sold valued at each project's share price.
    pub total_investment_received: Amount,
    pub pending_projects: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminSummary {
    pub total_projects: usize,
    pub pending_projects: usize,
    pub total_investments: usize,
    pub total_revenue: Amount,
}

fn pending(projects: &[Project]) -> usize {
    projects
        .iter()
        .filter(|project| project.status == ProjectStatus::Pending)
        .count()
}

impl Engine {
    pub async fn investor_summary(
        &self,
        identity: &Identity,
    ) -> Result<InvestorSummary, EngineError> {
        identity.require(Role::Investor)?;

        let purchases = self.purchases_for_investor(identity.id).await;
        Ok(InvestorSummary {
            total_investments: purchases.len(),
            portfolio_value: purchases.iter().map(|p| p.total_amount).sum(),
        })
    }

    /// Totals over the projects owned by the calling developer.
    pub async fn developer_summary(
        &self,
        identity: &Identity,
    ) -> Result<DeveloperSummary, EngineError> {
        identity.require(Role::Developer)?;

        let mut projects = self.projects().await;
        projects.retain(|project| project.developer == identity.id);

        Ok(DeveloperSummary {
            total_projects: projects.len(),
            total_shares_sold: projects.iter().map(|p| u64::from(p.shares_sold)).sum(),
            total_investment_received: projects.iter().map(Project::raised).sum(),
            pending_projects: pending(&projects),
        })
    }

    pub async fn admin_summary(&self, identity: &Identity) -> Result<AdminSummary, EngineError> {
        identity.require(Role::Admin)?;

        let projects = self.projects().await;
        let purchases = self.ledger.purchases_where(|_| true).await;

        Ok(AdminSummary {
            total_projects: projects.len(),
            pending_projects: pending(&projects),
            total_investments: purchases.len(),
            total_revenue: purchases.iter().map(|p| p.total_amount).sum(),
        })
    }
}
