//! Investment initiation and payment confirmation.
//!
//! Both paths mutate a project's inventory only while holding its row lock.
//! Confirmation takes the payment row first and the project row second;
//! initiation only ever holds a project row, so the two cannot deadlock.
//!
//! Everything fallible runs before the first mutation, so an error leaves the
//! ledger exactly as it was.

use serde_json::Value;
use tracing::{debug, warn};

use super::Engine;
use super::error::{ConfirmError, EngineError, InitiateError};
use super::state::{PaymentTransaction, SharePurchase};
use super::store::PaymentRow;
use crate::audit::{self, AuditEntry};
use crate::config::ReservationPolicy;
use crate::model::{
    Actor, Identity, InitiateRequest, PayloadTerms, PaymentCallback, PaymentReceipt,
    PaymentStatus, Role, UserId,
};

const PAYMENT_ENTITY: &str = "PaymentTransaction";

/// A payment that left `Initiated`, with the audit entry describing it.
struct Finalized {
    entry: AuditEntry,
    /// Set when the payment was closed as failed instead of settling.
    rejection: Option<ConfirmError>,
}

impl Engine {
    /// Start a share purchase for the calling investor.
    ///
    /// Checks the idempotency key and the project's remaining inventory, then
    /// records an `Initiated` payment. Under [`ReservationPolicy::Soft`] the
    /// project's counters are left untouched until the gateway confirms.
    pub async fn initiate(
        &self,
        identity: &Identity,
        request: InitiateRequest,
    ) -> Result<PaymentReceipt, EngineError> {
        let key = request.idempotency_key.clone();
        let result: Result<_, EngineError> = match identity.require(Role::Investor) {
            Ok(()) => self.reserve(identity.id, request).await.map_err(Into::into),
            Err(e) => Err(e.into()),
        };
        Self::log_result("initiate", &key, &result);
        result
    }

    /// Apply a gateway callback to the payment it references.
    ///
    /// Safe to repeat: once the payment is terminal every further call fails
    /// with [`ConfirmError::AlreadyProcessed`] without touching the ledger.
    pub async fn confirm(
        &self,
        actor: Actor,
        callback: PaymentCallback,
    ) -> Result<(), EngineError> {
        let reference = callback.payment_reference_id.clone();

        let result = match self.finalize(actor, callback).await {
            Ok(Finalized { entry, rejection }) => {
                self.emit(entry);
                rejection.map_or(Ok(()), Err)
            }
            Err(e) => Err(e),
        };

        let result = result.map_err(EngineError::from);
        Self::log_result("confirm", &reference, &result);
        result
    }
}

/// Initiation
impl Engine {
    async fn reserve(
        &self,
        investor: UserId,
        request: InitiateRequest,
    ) -> Result<PaymentReceipt, InitiateError> {
        let InitiateRequest {
            project_id,
            shares_requested,
            idempotency_key: key,
        } = request;

        let max = self.config.max_key_len;
        let len = key.chars().count();
        if len == 0 || len > max {
            return Err(InitiateError::InvalidKey { len, max });
        }

        let shares = u32::try_from(shares_requested)
            .ok()
            .filter(|shares| *shares > 0)
            .ok_or(InitiateError::InvalidQuantity(shares_requested))?;

        // Cheap early exit; the unique index on insert below is what actually
        // decides between concurrent requests with the same key.
        if self.ledger.contains_payment(&key).await {
            return Err(InitiateError::DuplicateRequest(key));
        }

        let mut project = self
            .ledger
            .lock_project(project_id)
            .await
            .ok_or(InitiateError::ProjectNotInvestable(project_id))?;

        if !project.is_investable() {
            return Err(InitiateError::ProjectNotInvestable(project_id));
        }

        if !project.can_fit(shares) {
            return Err(InitiateError::InsufficientShares {
                project: project_id,
                available: project.available(),
                requested: shares,
            });
        }

        let total_amount = project
            .share_price
            .checked_mul(shares)
            .ok_or(InitiateError::InvalidQuantity(shares_requested))?;

        let mut payment =
            PaymentTransaction::initiated(key.clone(), &project, investor, shares, total_amount);
        let hard = self.config.reservation == ReservationPolicy::Hard;
        if hard {
            payment.reserved_shares = shares;
        }

        let receipt = PaymentReceipt {
            payment_id: payment.id,
            total_amount,
            shares_requested: shares,
        };

        self.ledger
            .insert_payment(payment)
            .await
            .map_err(|_| InitiateError::DuplicateRequest(key))?;

        if hard {
            project.reserve(shares);
        }

        Ok(receipt)
    }
}

/// Confirmation
impl Engine {
    async fn finalize(
        &self,
        actor: Actor,
        callback: PaymentCallback,
    ) -> Result<Finalized, ConfirmError> {
        let PaymentCallback {
            payment_reference_id: reference,
            gateway_payload: payload,
            success,
        } = callback;

        let payment = self
            .ledger
            .lock_payment(&reference)
            .await
            .ok_or_else(|| ConfirmError::UnknownPayment(reference.clone()))?;

        if payment.status.is_terminal() {
            return Err(ConfirmError::AlreadyProcessed(reference, payment.status));
        }

        let terms = PayloadTerms::extract(&payload);
        if success {
            self.settle(actor, payment, terms, payload).await
        } else {
            self.fail(actor, payment, terms, payload).await
        }
    }

    /// The success branch: commit the purchase and the sold-share increment
    /// together, or close the payment as failed if the project is sold out.
    async fn settle(
        &self,
        actor: Actor,
        mut payment: PaymentRow,
        terms: PayloadTerms,
        payload: Value,
    ) -> Result<Finalized, ConfirmError> {
        let reference = payment.reference_id.clone();

        let mismatch = terms.project_id.is_some_and(|p| p != payment.project)
            || terms.investor_id.is_some_and(|i| i != payment.investor)
            || terms.shares.is_some_and(|s| s != payment.shares);
        if mismatch {
            return Err(ConfirmError::PayloadMismatch(reference));
        }
        if terms == PayloadTerms::default() {
            debug!(
                reference = %reference,
                "payload carries no settlement terms, using initiated terms"
            );
        }

        let mut project = self
            .ledger
            .lock_project(payment.project)
            .await
            .ok_or_else(|| ConfirmError::PayloadMismatch(reference.clone()))?;

        let shares = payment.shares;
        let reserved = payment.reserved_shares;
        // this payment's own reservation counts as room for it
        let room = project.available().saturating_add(reserved);

        if shares > room {
            let err = ConfirmError::OversellDetected {
                project: project.id,
                sold: project.shares_sold,
                total: project.total_shares,
                requested: shares,
            };
            warn!(reference = %reference, reason = %err, "closing payment as failed");

            project.release(reserved);
            payment.finalize(PaymentStatus::Failed, payload);
            let entry = failure_entry(actor, &payment, terms, "oversell detected");
            return Ok(Finalized {
                entry,
                rejection: Some(err),
            });
        }

        let purchase = SharePurchase::settle(&payment);
        self.ledger
            .insert_purchase(purchase)
            .await
            .map_err(|_| ConfirmError::AlreadyProcessed(reference, PaymentStatus::Success))?;

        project.release(reserved);
        project.record_sale(shares);
        payment.finalize(PaymentStatus::Success, payload);

        let entry = AuditEntry::new(actor, audit::PAYMENT_CONFIRMED, PAYMENT_ENTITY, payment.id)
            .with("reference_id", payment.reference_id.as_str())
            .with("project_id", payment.project)
            .with("investor_id", payment.investor)
            .with("shares", shares)
            .with("total_amount", payment.total_amount.to_string());

        Ok(Finalized {
            entry,
            rejection: None,
        })
    }

    /// The failure branch: close the payment and hand back any held shares.
    async fn fail(
        &self,
        actor: Actor,
        mut payment: PaymentRow,
        terms: PayloadTerms,
        payload: Value,
    ) -> Result<Finalized, ConfirmError> {
        let reserved = payment.reserved_shares;
        if reserved > 0 {
            let mut project = self
                .ledger
                .lock_project(payment.project)
                .await
                .ok_or_else(|| ConfirmError::PayloadMismatch(payment.reference_id.clone()))?;
            project.release(reserved);
        }

        payment.finalize(PaymentStatus::Failed, payload);
        let entry = failure_entry(actor, &payment, terms, "gateway failure");
        Ok(Finalized {
            entry,
            rejection: None,
        })
    }
}

/// Audit entry for a failed payment, naming whatever the payload carried.
fn failure_entry(
    actor: Actor,
    payment: &PaymentTransaction,
    terms: PayloadTerms,
    reason: &str,
) -> AuditEntry {
    AuditEntry::new(actor, audit::PAYMENT_FAILED, PAYMENT_ENTITY, payment.id)
        .with("reference_id", payment.reference_id.as_str())
        .with("project_id", terms.project_id)
        .with("investor_id", terms.investor_id)
        .with("shares", terms.shares)
        .with("reason", reason)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::Amount;
    use crate::audit::{AuditError, AuditSink, MemoryAuditLog};
    use crate::config::Config;
    use crate::engine::{ErrorKind, Review};
    use crate::model::{NewProject, ProjectId};

    const DEVELOPER: UserId = 10;
    const ADMIN: UserId = 1;
    const INVESTOR: UserId = 20;

    // test utils

    fn amount(s: &str) -> Amount {
        s.parse().unwrap()
    }

    fn engine_with(policy: ReservationPolicy) -> (Engine, Arc<MemoryAuditLog>) {
        let log = Arc::new(MemoryAuditLog::new());
        let config = Config::default().with_reservation(policy);
        (Engine::with_audit(config, log.clone()), log)
    }

    fn engine() -> (Engine, Arc<MemoryAuditLog>) {
        engine_with(ReservationPolicy::Soft)
    }

    async fn approved_project(engine: &Engine, id: ProjectId, value: &str, shares: i64) {
        let developer = Identity::developer(DEVELOPER);
        engine
            .create_project(
                &developer,
                NewProject {
                    id,
                    total_value: amount(value),
                    total_shares: shares,
                },
            )
            .await
            .unwrap();
        engine.submit_for_review(&developer, id).await.unwrap();
        engine
            .review(&Identity::admin(ADMIN), id, Review::Approve)
            .await
            .unwrap();
    }

    /// Bump the sold counter directly, as if earlier purchases had settled.
    async fn presell(engine: &Engine, id: ProjectId, shares: u32) {
        engine.ledger.lock_project(id).await.unwrap().shares_sold = shares;
    }

    fn request(project: ProjectId, shares: i64, key: &str) -> InitiateRequest {
        InitiateRequest {
            project_id: project,
            shares_requested: shares,
            idempotency_key: key.into(),
        }
    }

    async fn initiate(
        engine: &Engine,
        project: ProjectId,
        shares: i64,
        key: &str,
    ) -> Result<PaymentReceipt, EngineError> {
        engine
            .initiate(&Identity::investor(INVESTOR), request(project, shares, key))
            .await
    }

    fn callback(key: &str, project: ProjectId, shares: u32, success: bool) -> PaymentCallback {
        PaymentCallback::new(
            key,
            json!({ "project_id": project, "investor_id": INVESTOR, "shares": shares }),
            success,
        )
    }

    async fn confirm(
        engine: &Engine,
        key: &str,
        project: ProjectId,
        shares: u32,
        success: bool,
    ) -> Result<(), EngineError> {
        engine
            .confirm(Actor::System, callback(key, project, shares, success))
            .await
    }

    // Happy path

    #[tokio::test]
    async fn initiate_then_confirm_settles_purchase() {
        let (engine, log) = engine();
        approved_project(&engine, 1, "1000", 100).await;

        let receipt = initiate(&engine, 1, 20, "k1").await.unwrap();
        assert_eq!(receipt.total_amount, amount("200.00"));
        assert_eq!(receipt.shares_requested, 20);

        let payment = engine.payment("k1").await.unwrap();
        assert_eq!(payment.id, receipt.payment_id);
        assert_eq!(payment.status, PaymentStatus::Initiated);
        assert!(payment.raw_payload.is_none());
        // soft reservation: nothing sold yet
        assert_eq!(engine.project(1).await.unwrap().shares_sold, 0);

        confirm(&engine, "k1", 1, 20, true).await.unwrap();

        let project = engine.project(1).await.unwrap();
        assert_eq!(project.shares_sold, 20);

        let purchases = engine.purchases_for_project(1).await;
        assert_eq!(purchases.len(), 1);
        assert_eq!(purchases[0].shares_purchased, 20);
        assert_eq!(purchases[0].price_per_share, amount("10.00"));
        assert_eq!(purchases[0].total_amount, amount("200.00"));
        assert_eq!(purchases[0].investor, INVESTOR);
        assert_eq!(purchases[0].payment, receipt.payment_id);

        let payment = engine.payment("k1").await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.raw_payload.unwrap()["shares"], 20);

        let entry = log.entries().pop().unwrap();
        assert_eq!(entry.action, audit::PAYMENT_CONFIRMED);
        assert_eq!(entry.actor, Actor::System);
        assert_eq!(entry.entity_id, receipt.payment_id.to_string());
        assert_eq!(entry.metadata["total_amount"], "200.0000");
        assert_eq!(entry.metadata["shares"], 20);
    }

    // Initiation validation

    #[tokio::test]
    async fn non_positive_quantity_is_rejected() {
        let (engine, _) = engine();
        approved_project(&engine, 1, "1000", 100).await;

        for shares in [0, -3, i64::from(u32::MAX) + 1] {
            let err = initiate(&engine, 1, shares, "k").await.unwrap_err();
            assert!(matches!(
                err,
                EngineError::Initiate(InitiateError::InvalidQuantity(s)) if s == shares
            ));
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert!(engine.payment("k").await.is_none());
    }

    #[tokio::test]
    async fn key_must_be_present_and_bounded() {
        let (engine, _) = engine();
        approved_project(&engine, 1, "1000", 100).await;

        let err = initiate(&engine, 1, 1, "").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Initiate(InitiateError::InvalidKey { len: 0, max: 255 })
        ));

        let long = "x".repeat(256);
        let err = initiate(&engine, 1, 1, &long).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Initiate(InitiateError::InvalidKey { len: 256, .. })
        ));
    }

    #[tokio::test]
    async fn unapproved_or_missing_project_is_not_investable() {
        let (engine, _) = engine();
        engine
            .create_project(
                &Identity::developer(DEVELOPER),
                NewProject {
                    id: 1,
                    total_value: amount("100"),
                    total_shares: 10,
                },
            )
            .await
            .unwrap();

        let err = initiate(&engine, 1, 1, "draft").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Initiate(InitiateError::ProjectNotInvestable(1))
        ));

        let err = initiate(&engine, 9, 1, "missing").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Initiate(InitiateError::ProjectNotInvestable(9))
        ));
    }

    #[tokio::test]
    async fn only_investors_initiate() {
        let (engine, _) = engine();
        approved_project(&engine, 1, "1000", 100).await;

        let err = engine
            .initiate(&Identity::developer(DEVELOPER), request(1, 1, "k"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Access);
        assert!(engine.payment("k").await.is_none());
    }

    #[tokio::test]
    async fn duplicate_key_creates_one_transaction() {
        let (engine, _) = engine();
        approved_project(&engine, 1, "1000", 100).await;

        let first = initiate(&engine, 1, 5, "k1").await.unwrap();
        let err = initiate(&engine, 1, 5, "k1").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Initiate(InitiateError::DuplicateRequest(ref k)) if k == "k1"
        ));

        assert_eq!(engine.payment("k1").await.unwrap().id, first.payment_id);
    }

    #[tokio::test]
    async fn insufficient_shares_leaves_no_trace() {
        let (engine, _) = engine();
        approved_project(&engine, 1, "500", 50).await;
        presell(&engine, 1, 45).await;

        let err = initiate(&engine, 1, 6, "k1").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Initiate(InitiateError::InsufficientShares {
                project: 1,
                available: 5,
                requested: 6,
            })
        ));
        assert_eq!(err.kind(), ErrorKind::Capacity);
        assert!(engine.payment("k1").await.is_none());
        assert_eq!(engine.project(1).await.unwrap().shares_sold, 45);
    }

    // Exact capacity boundary under soft reservation

    #[tokio::test]
    async fn soft_reservation_checks_against_sold_only() {
        let (engine, _) = engine();
        approved_project(&engine, 1, "500", 50).await;
        presell(&engine, 1, 40).await;

        initiate(&engine, 1, 10, "fill").await.unwrap();
        // the first payment is still pending, so 10 shares still look free
        initiate(&engine, 1, 1, "extra").await.unwrap();

        let project = engine.project(1).await.unwrap();
        assert_eq!(project.shares_sold, 40);
        assert_eq!(project.shares_reserved, 0);
    }

    #[tokio::test]
    async fn oversell_at_confirmation_fails_payment_atomically() {
        let (engine, log) = engine();
        approved_project(&engine, 1, "500", 50).await;
        presell(&engine, 1, 40).await;

        initiate(&engine, 1, 10, "fill").await.unwrap();
        initiate(&engine, 1, 1, "extra").await.unwrap();
        confirm(&engine, "fill", 1, 10, true).await.unwrap();

        let err = confirm(&engine, "extra", 1, 1, true).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Confirm(ConfirmError::OversellDetected {
                project: 1,
                sold: 50,
                total: 50,
                requested: 1,
            })
        ));

        let project = engine.project(1).await.unwrap();
        assert_eq!(project.shares_sold, 50);
        assert_eq!(engine.purchases_for_project(1).await.len(), 1);

        let payment = engine.payment("extra").await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert!(payment.raw_payload.is_some());

        let entry = log.entries().pop().unwrap();
        assert_eq!(entry.action, audit::PAYMENT_FAILED);
        assert_eq!(entry.metadata["reason"], "oversell detected");

        // a gateway retry is now a harmless no-op
        let err = confirm(&engine, "extra", 1, 1, true).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Confirm(ConfirmError::AlreadyProcessed(_, PaymentStatus::Failed))
        ));
    }

    // Confirmation protocol

    #[tokio::test]
    async fn repeated_confirmation_settles_once() {
        let (engine, log) = engine();
        approved_project(&engine, 1, "1000", 100).await;
        initiate(&engine, 1, 20, "k1").await.unwrap();

        confirm(&engine, "k1", 1, 20, true).await.unwrap();
        let err = confirm(&engine, "k1", 1, 20, true).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Confirm(ConfirmError::AlreadyProcessed(ref k, PaymentStatus::Success))
                if k == "k1"
        ));
        assert_eq!(err.kind(), ErrorKind::Protocol);

        assert_eq!(engine.project(1).await.unwrap().shares_sold, 20);
        assert_eq!(engine.purchases_for_project(1).await.len(), 1);
        assert_eq!(log.entries().len(), 2); // approval + settlement
    }

    #[tokio::test]
    async fn unknown_reference_is_rejected() {
        let (engine, _) = engine();
        let err = confirm(&engine, "forged", 1, 1, true).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Confirm(ConfirmError::UnknownPayment(ref k)) if k == "forged"
        ));
    }

    #[tokio::test]
    async fn failed_payment_changes_no_inventory() {
        let (engine, log) = engine();
        approved_project(&engine, 1, "1000", 100).await;
        initiate(&engine, 1, 20, "k1").await.unwrap();

        confirm(&engine, "k1", 1, 20, false).await.unwrap();

        let project = engine.project(1).await.unwrap();
        assert_eq!(project.shares_sold, 0);
        assert_eq!(project.total_shares, 100);
        assert!(engine.purchases_for_project(1).await.is_empty());
        assert_eq!(
            engine.payment("k1").await.unwrap().status,
            PaymentStatus::Failed
        );

        let entry = log.entries().pop().unwrap();
        assert_eq!(entry.action, audit::PAYMENT_FAILED);
        assert_eq!(entry.metadata["reason"], "gateway failure");
        assert_eq!(entry.metadata["project_id"], 1);
    }

    #[tokio::test]
    async fn failure_audit_tolerates_empty_payload() {
        let (engine, log) = engine();
        approved_project(&engine, 1, "1000", 100).await;
        initiate(&engine, 1, 20, "k1").await.unwrap();

        engine
            .confirm(Actor::System, PaymentCallback::new("k1", json!({}), false))
            .await
            .unwrap();

        let entry = log.entries().pop().unwrap();
        assert!(entry.metadata["project_id"].is_null());
        assert!(entry.metadata["shares"].is_null());
    }

    #[tokio::test]
    async fn mismatched_payload_is_rejected_without_mutation() {
        let (engine, _) = engine();
        approved_project(&engine, 1, "1000", 100).await;
        initiate(&engine, 1, 5, "k1").await.unwrap();

        let err = confirm(&engine, "k1", 1, 50, true).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Confirm(ConfirmError::PayloadMismatch(_))
        ));
        let payment = engine.payment("k1").await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Initiated);
        assert!(payment.raw_payload.is_none());

        // the genuine callback still goes through
        confirm(&engine, "k1", 1, 5, true).await.unwrap();
        assert_eq!(engine.project(1).await.unwrap().shares_sold, 5);
    }

    #[tokio::test]
    async fn missing_terms_fall_back_to_initiated_purchase() {
        let (engine, _) = engine();
        approved_project(&engine, 1, "1000", 100).await;
        initiate(&engine, 1, 7, "k1").await.unwrap();

        engine
            .confirm(
                Actor::System,
                PaymentCallback::new("k1", json!({ "gateway_ref": "x" }), true),
            )
            .await
            .unwrap();

        assert_eq!(engine.project(1).await.unwrap().shares_sold, 7);
    }

    // Hard reservation

    #[tokio::test]
    async fn hard_reservation_holds_shares_at_initiation() {
        let (engine, _) = engine_with(ReservationPolicy::Hard);
        approved_project(&engine, 1, "500", 50).await;
        presell(&engine, 1, 40).await;

        initiate(&engine, 1, 10, "fill").await.unwrap();
        let err = initiate(&engine, 1, 1, "extra").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Initiate(InitiateError::InsufficientShares { available: 0, .. })
        ));

        confirm(&engine, "fill", 1, 10, true).await.unwrap();
        let project = engine.project(1).await.unwrap();
        assert_eq!(project.shares_sold, 50);
        assert_eq!(project.shares_reserved, 0);
        assert_eq!(engine.payment("fill").await.unwrap().reserved_shares, 0);
    }

    #[tokio::test]
    async fn hard_reservation_released_on_failure() {
        let (engine, _) = engine_with(ReservationPolicy::Hard);
        approved_project(&engine, 1, "100", 10).await;

        initiate(&engine, 1, 10, "all").await.unwrap();
        assert_eq!(engine.project(1).await.unwrap().available(), 0);

        confirm(&engine, "all", 1, 10, false).await.unwrap();
        let project = engine.project(1).await.unwrap();
        assert_eq!(project.shares_reserved, 0);
        assert_eq!(project.shares_sold, 0);

        initiate(&engine, 1, 10, "retry").await.unwrap();
    }

    // Price snapshot

    #[tokio::test]
    async fn purchase_settles_at_initiated_price() {
        let (engine, _) = engine();
        approved_project(&engine, 1, "1000", 3).await;

        let receipt = initiate(&engine, 1, 3, "k1").await.unwrap();
        assert_eq!(receipt.total_amount, amount("999.9999"));

        confirm(&engine, "k1", 1, 3, true).await.unwrap();
        let purchase = engine.purchases_for_investor(INVESTOR).await.remove(0);
        assert_eq!(purchase.price_per_share, amount("333.3333"));
        assert_eq!(purchase.total_amount, receipt.total_amount);
    }

    // Audit sink failures

    struct BrokenSink;

    impl AuditSink for BrokenSink {
        fn record(&self, _entry: AuditEntry) -> Result<(), AuditError> {
            Err(AuditError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn broken_audit_sink_does_not_undo_settlement() {
        let engine = Engine::with_audit(Config::default(), Arc::new(BrokenSink));
        approved_project(&engine, 1, "1000", 100).await;
        initiate(&engine, 1, 20, "k1").await.unwrap();

        confirm(&engine, "k1", 1, 20, true).await.unwrap();

        assert_eq!(engine.project(1).await.unwrap().shares_sold, 20);
        assert_eq!(engine.purchases_for_project(1).await.len(), 1);
    }
}
