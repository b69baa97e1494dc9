use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use milletchain_core::audit::{AuditContext, AuditSink};
use milletchain_core::domain::market::Payment;
use milletchain_core::domain::order::{ActorRole, Order, OrderId, OrderStatus, PlaceOrder};
use milletchain_core::errors::{ApplicationError, DomainError};
use milletchain_core::notifications::{Notification, NotificationSink};
use milletchain_core::orders::{OrderStateMachine, TransitionOutcome, TransitionRequest};
use milletchain_db::repositories::{OrderRepository, PaymentRepository};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateStatusCommand {
    pub order_id: OrderId,
    pub new_status: OrderStatus,
    pub actor_id: String,
    pub actor_role: ActorRole,
    pub reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StatusUpdate {
    pub order_id: OrderId,
    pub outcome: TransitionOutcome,
}

/// Order placement and status updates: load, validate through the state
/// machine, compare-and-swap write, then the fire-and-forget side effects.
pub struct OrderWorkflow {
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentRepository>,
    notifications: Arc<dyn NotificationSink>,
    audit: Arc<dyn AuditSink>,
    machine: OrderStateMachine,
}

impl OrderWorkflow {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentRepository>,
        notifications: Arc<dyn NotificationSink>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { orders, payments, notifications, audit, machine: OrderStateMachine::default() }
    }

    pub async fn place_order(
        &self,
        request: PlaceOrder,
        actor_role: ActorRole,
        correlation_id: &str,
    ) -> Result<Order, ApplicationError> {
        self.machine
            .authorize_placement(actor_role)
            .map_err(|error| ApplicationError::Domain(DomainError::from(error)))?;
        let order = Order::place(request, Utc::now())?;
        self.orders.insert(order.clone()).await?;

        info!(
            event_name = "order.placed",
            correlation_id = %correlation_id,
            order_id = %order.id,
            buyer_id = %order.buyer_id,
            seller_id = %order.seller_id,
            total_price = %order.total_price,
            "order placed"
        );
        Ok(order)
    }

    pub async fn get_order(&self, id: &OrderId) -> Result<Order, ApplicationError> {
        self.orders
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound { entity: "order", id: id.0.clone() })
    }

    /// Moves an order to `command.new_status`. The write only lands if nobody
    /// else changed the order since it was read; otherwise the caller gets
    /// `ConcurrencyConflict` and nothing is written.
    pub async fn update_status(
        &self,
        command: UpdateStatusCommand,
        correlation_id: &str,
    ) -> Result<StatusUpdate, ApplicationError> {
        let order = self.get_order(&command.order_id).await?;

        let mut request =
            TransitionRequest::new(command.new_status, command.actor_id.clone(), command.actor_role);
        if let Some(reason) = command.reason {
            request = request.with_reason(reason);
        }

        let now = Utc::now();
        let audit = AuditContext::new(
            Some(order.id.clone()),
            correlation_id,
            format!("{}:{}", command.actor_role, command.actor_id),
        );
        let outcome = self
            .machine
            .apply_with_audit(&order, &request, now, self.audit.as_ref(), &audit)
            .map_err(|error| {
                warn!(
                    event_name = "order.status.rejected",
                    correlation_id = %correlation_id,
                    order_id = %order.id,
                    from = %order.status,
                    to = %command.new_status,
                    actor_role = %command.actor_role,
                    error = %error,
                    "order status update rejected"
                );
                ApplicationError::Domain(DomainError::from(error))
            })?;

        if let Err(error) = self.orders.update_if_version(&outcome.order, order.version).await {
            warn!(
                event_name = "order.status.write_failed",
                correlation_id = %correlation_id,
                order_id = %order.id,
                expected_version = order.version,
                error = %error,
                "order status write did not land"
            );
            return Err(error.into());
        }

        info!(
            event_name = "order.status.updated",
            correlation_id = %correlation_id,
            order_id = %order.id,
            from = %outcome.previous_status,
            to = %outcome.new_status,
            version = outcome.order.version,
            "order status updated"
        );

        self.notifications.emit(Notification::status_changed(&outcome.order, now));
        if outcome.new_status == OrderStatus::Delivered {
            self.record_payment(&outcome.order, now, correlation_id).await;
        }

        Ok(StatusUpdate { order_id: order.id, outcome })
    }

    async fn record_payment(&self, order: &Order, now: DateTime<Utc>, correlation_id: &str) {
        let payment = Payment::pending_for(order, Uuid::new_v4().to_string(), now);
        match self.payments.record_if_absent(payment).await {
            Ok(true) => info!(
                event_name = "order.payment.recorded",
                correlation_id = %correlation_id,
                order_id = %order.id,
                payee_id = %order.seller_id,
                amount = %order.total_price,
                "pending payment recorded for delivered order"
            ),
            Ok(false) => {}
            Err(error) => warn!(
                event_name = "order.payment.failed",
                correlation_id = %correlation_id,
                order_id = %order.id,
                error = %error,
                "failed to record payment for delivered order"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;
    use tokio::sync::Barrier;

    use milletchain_core::audit::InMemoryAuditSink;
    use milletchain_core::domain::market::Payment;
    use milletchain_core::domain::order::{
        ActorRole, Order, OrderId, OrderStatus, PlaceOrder, SellerCategory,
    };
    use milletchain_core::errors::{ApplicationError, DomainError};
    use milletchain_core::notifications::InMemoryNotificationSink;
    use milletchain_core::orders::TransitionError;
    use milletchain_db::connect_with_settings;
    use milletchain_db::repositories::{
        InMemoryOrderRepository, InMemoryPaymentRepository, OrderRepository, PaymentRepository,
        RepositoryError, SqlNotificationSink,
    };

    use super::{OrderWorkflow, UpdateStatusCommand};

    struct Harness {
        workflow: OrderWorkflow,
        payments: Arc<InMemoryPaymentRepository>,
        notifications: InMemoryNotificationSink,
        audit: InMemoryAuditSink,
    }

    fn harness(orders: Arc<dyn OrderRepository>) -> Harness {
        let payments = Arc::new(InMemoryPaymentRepository::default());
        let notifications = InMemoryNotificationSink::default();
        let audit = InMemoryAuditSink::default();
        let workflow = OrderWorkflow::new(
            orders,
            payments.clone(),
            Arc::new(notifications.clone()),
            Arc::new(audit.clone()),
        );
        Harness { workflow, payments, notifications, audit }
    }

    fn place_request(id: &str) -> PlaceOrder {
        PlaceOrder {
            id: OrderId(id.to_string()),
            product_id: "prod-ragi".to_string(),
            product_name: "Organic Ragi".to_string(),
            product_type: "Finger Millet".to_string(),
            region: Some("Karnataka".to_string()),
            buyer_id: "consumer-1".to_string(),
            buyer_name: "Priya Singh".to_string(),
            seller_id: "farmer-1".to_string(),
            seller_name: "Ramesh Kumar".to_string(),
            seller_category: SellerCategory::Farmer,
            quantity: Decimal::new(10, 0),
            unit: "kg".to_string(),
            price_per_unit: Decimal::new(45, 0),
        }
    }

    fn command(
        id: &str,
        status: OrderStatus,
        actor: &str,
        role: ActorRole,
        reason: Option<&str>,
    ) -> UpdateStatusCommand {
        UpdateStatusCommand {
            order_id: OrderId(id.to_string()),
            new_status: status,
            actor_id: actor.to_string(),
            actor_role: role,
            reason: reason.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn confirm_updates_order_and_notifies_buyer() {
        let h = harness(Arc::new(InMemoryOrderRepository::default()));
        h.workflow.place_order(place_request("ORD-1"), ActorRole::Consumer, "test").await.expect("place");

        let update = h
            .workflow
            .update_status(
                command("ORD-1", OrderStatus::Confirmed, "farmer-1", ActorRole::Farmer, None),
                "test",
            )
            .await
            .expect("confirm");

        assert_eq!(update.outcome.previous_status, OrderStatus::Placed);
        assert_eq!(update.outcome.new_status, OrderStatus::Confirmed);
        assert_eq!(
            update.outcome.message,
            "Order status successfully updated from 'placed' to 'confirmed'"
        );
        let stored = h.workflow.get_order(&update.order_id).await.expect("stored");
        assert_eq!(stored.version, 2);
        assert!(stored.confirmed_at.is_some());

        let notifications = h.notifications.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].user_id, "consumer-1");
        assert_eq!(notifications[0].message, "Your order #ORD-1 is now confirmed");
        assert_eq!(h.audit.events()[0].event_type, "order.transition_applied");
    }

    #[tokio::test]
    async fn consumer_cannot_ship_and_nothing_is_written() {
        let h = harness(Arc::new(InMemoryOrderRepository::default()));
        h.workflow.place_order(place_request("ORD-1"), ActorRole::Consumer, "test").await.expect("place");
        for (status, actor, role) in [
            (OrderStatus::Confirmed, "farmer-1", ActorRole::Farmer),
            (OrderStatus::Processing, "shg-1", ActorRole::Shg),
        ] {
            h.workflow
                .update_status(command("ORD-1", status, actor, role, None), "test")
                .await
                .expect("advance");
        }

        let error = h
            .workflow
            .update_status(
                command("ORD-1", OrderStatus::Shipped, "consumer-1", ActorRole::Consumer, None),
                "test",
            )
            .await
            .expect_err("forbidden");

        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::Transition(TransitionError::Forbidden { .. }))
        ));
        assert_eq!(error.clone().into_interface("cid").status_code(), 403);
        let stored = h.workflow.get_order(&OrderId("ORD-1".to_string())).await.expect("stored");
        assert_eq!(stored.status, OrderStatus::Processing);
        assert_eq!(h.notifications.notifications().len(), 2);
        assert_eq!(
            h.audit.events().last().map(|event| event.event_type.clone()),
            Some("order.transition_rejected".to_string())
        );
    }

    #[tokio::test]
    async fn sellers_cannot_place_orders() {
        let h = harness(Arc::new(InMemoryOrderRepository::default()));

        let error = h
            .workflow
            .place_order(place_request("ORD-1"), ActorRole::Farmer, "test")
            .await
            .expect_err("farmer cannot place");

        assert_eq!(error.into_interface("cid").status_code(), 403);
        assert!(h.workflow.get_order(&OrderId("ORD-1".to_string())).await.is_err());
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let h = harness(Arc::new(InMemoryOrderRepository::default()));

        let error = h
            .workflow
            .update_status(
                command("ORD-404", OrderStatus::Confirmed, "farmer-1", ActorRole::Farmer, None),
                "test",
            )
            .await
            .expect_err("missing");

        assert_eq!(
            error,
            ApplicationError::NotFound { entity: "order", id: "ORD-404".to_string() }
        );
    }

    #[tokio::test]
    async fn delivery_records_a_single_pending_payment() {
        let h = harness(Arc::new(InMemoryOrderRepository::default()));
        h.workflow.place_order(place_request("ORD-1"), ActorRole::Consumer, "test").await.expect("place");
        for (status, actor, role) in [
            (OrderStatus::Confirmed, "farmer-1", ActorRole::Farmer),
            (OrderStatus::Processing, "shg-1", ActorRole::Shg),
            (OrderStatus::Shipped, "shg-1", ActorRole::Shg),
            (OrderStatus::Delivered, "consumer-1", ActorRole::Consumer),
        ] {
            h.workflow
                .update_status(command("ORD-1", status, actor, role, None), "test")
                .await
                .expect("advance");
        }

        let payment = h
            .payments
            .find_by_order(&OrderId("ORD-1".to_string()))
            .await
            .expect("lookup")
            .expect("payment recorded");
        assert_eq!(payment.payee_id, "farmer-1");
        assert_eq!(payment.payer_id, "consumer-1");
        assert_eq!(payment.amount, Decimal::new(450, 0));

        let stored = h.workflow.get_order(&OrderId("ORD-1".to_string())).await.expect("stored");
        assert_eq!(stored.status_history.len(), 4);
        assert_eq!(stored.status_history.last().map(|c| c.status), Some(OrderStatus::Delivered));
    }

    async fn advance_to_delivered(workflow: &OrderWorkflow, id: &str) -> Result<(), ApplicationError> {
        for (status, actor, role) in [
            (OrderStatus::Confirmed, "farmer-1", ActorRole::Farmer),
            (OrderStatus::Processing, "shg-1", ActorRole::Shg),
            (OrderStatus::Shipped, "shg-1", ActorRole::Shg),
            (OrderStatus::Delivered, "consumer-1", ActorRole::Consumer),
        ] {
            workflow.update_status(command(id, status, actor, role, None), "test").await?;
        }
        Ok(())
    }

    struct UnavailablePaymentRepository;

    #[async_trait::async_trait]
    impl PaymentRepository for UnavailablePaymentRepository {
        async fn record_if_absent(&self, _payment: Payment) -> Result<bool, RepositoryError> {
            Err(RepositoryError::Decode("payments table unavailable".to_string()))
        }

        async fn find_by_order(&self, _order_id: &OrderId) -> Result<Option<Payment>, RepositoryError> {
            Err(RepositoryError::Decode("payments table unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn failed_payment_recording_does_not_fail_delivery() {
        let orders = Arc::new(InMemoryOrderRepository::default());
        let workflow = OrderWorkflow::new(
            orders.clone(),
            Arc::new(UnavailablePaymentRepository),
            Arc::new(InMemoryNotificationSink::default()),
            Arc::new(InMemoryAuditSink::default()),
        );
        workflow.place_order(place_request("ORD-1"), ActorRole::Consumer, "test").await.expect("place");

        advance_to_delivered(&workflow, "ORD-1").await.expect("delivery succeeds");

        let stored = orders.find_by_id(&OrderId("ORD-1".to_string())).await.expect("find");
        let stored = stored.expect("present");
        assert_eq!(stored.status, OrderStatus::Delivered);
        assert_eq!(stored.version, 5);
    }

    #[tokio::test]
    async fn failed_notification_storage_does_not_fail_the_transition() {
        // No migrations: every notification insert fails.
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        let orders = Arc::new(InMemoryOrderRepository::default());
        let workflow = OrderWorkflow::new(
            orders.clone(),
            Arc::new(InMemoryPaymentRepository::default()),
            Arc::new(SqlNotificationSink::new(pool.clone())),
            Arc::new(InMemoryAuditSink::default()),
        );
        workflow.place_order(place_request("ORD-1"), ActorRole::Consumer, "test").await.expect("place");

        let update = workflow
            .update_status(
                command("ORD-1", OrderStatus::Confirmed, "farmer-1", ActorRole::Farmer, None),
                "test",
            )
            .await
            .expect("confirm succeeds");
        tokio::task::yield_now().await;

        assert_eq!(update.outcome.new_status, OrderStatus::Confirmed);
        let stored = orders.find_by_id(&OrderId("ORD-1".to_string())).await.expect("find");
        assert_eq!(stored.map(|order| order.status), Some(OrderStatus::Confirmed));

        pool.close().await;
    }

    /// Holds every reader at a barrier so both requests see the same snapshot.
    struct SnapshotBarrierRepository {
        inner: InMemoryOrderRepository,
        barrier: Barrier,
    }

    #[async_trait::async_trait]
    impl OrderRepository for SnapshotBarrierRepository {
        async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
            let found = self.inner.find_by_id(id).await;
            self.barrier.wait().await;
            found
        }

        async fn insert(&self, order: Order) -> Result<(), RepositoryError> {
            self.inner.insert(order).await
        }

        async fn update_if_version(
            &self,
            order: &Order,
            expected_version: u32,
        ) -> Result<(), RepositoryError> {
            self.inner.update_if_version(order, expected_version).await
        }

        async fn list_created_since(
            &self,
            since: DateTime<Utc>,
            region: Option<&str>,
        ) -> Result<Vec<Order>, RepositoryError> {
            self.inner.list_created_since(since, region).await
        }
    }

    #[tokio::test]
    async fn concurrent_updates_from_one_snapshot_let_exactly_one_win() {
        let inner = InMemoryOrderRepository::default();
        let order = Order::place(place_request("ORD-RACE"), Utc::now()).expect("valid order");
        inner.insert(order).await.expect("insert");
        let repo = Arc::new(SnapshotBarrierRepository { inner, barrier: Barrier::new(2) });
        let h = harness(repo.clone());

        let confirm =
            command("ORD-RACE", OrderStatus::Confirmed, "farmer-1", ActorRole::Farmer, None);
        let cancel = command(
            "ORD-RACE",
            OrderStatus::Cancelled,
            "consumer-1",
            ActorRole::Consumer,
            Some("Found a closer seller"),
        );
        let (first, second) = tokio::join!(
            h.workflow.update_status(confirm, "race-a"),
            h.workflow.update_status(cancel, "race-b"),
        );

        let outcomes = [first, second];
        let winners = outcomes.iter().filter(|result| result.is_ok()).count();
        let conflicts = outcomes
            .iter()
            .filter(|result| {
                matches!(
                    result,
                    Err(ApplicationError::ConcurrencyConflict { expected: 1, actual: 2, .. })
                )
            })
            .count();
        assert_eq!(winners, 1);
        assert_eq!(conflicts, 1);

        let stored = repo.inner.find_by_id(&OrderId("ORD-RACE".to_string())).await.expect("find");
        let stored = stored.expect("present");
        assert_eq!(stored.version, 2);
        assert_eq!(stored.status_history.len(), 1);
        assert_eq!(h.notifications.notifications().len(), 1);

        let loser = outcomes.into_iter().find_map(Result::err).expect("one conflict");
        let interface = loser.into_interface("race");
        assert_eq!(interface.status_code(), 409);
    }
}
