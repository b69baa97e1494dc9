use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::order::{ActorRole, Order, OrderStatus, StatusChange};
use crate::orders::lifecycle::{MarketplaceLifecycle, OrderLifecycle};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub new_status: OrderStatus,
    pub actor_id: String,
    pub actor_role: ActorRole,
    pub reason: Option<String>,
}

impl TransitionRequest {
    pub fn new(new_status: OrderStatus, actor_id: impl Into<String>, actor_role: ActorRole) -> Self {
        Self { new_status, actor_id: actor_id.into(), actor_role, reason: None }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// The reason exactly as supplied; only an empty string counts as absent.
    pub fn given_reason(&self) -> Option<&str> {
        self.reason.as_deref().filter(|reason| !reason.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransitionOutcome {
    pub previous_status: OrderStatus,
    pub new_status: OrderStatus,
    pub updated_at: DateTime<Utc>,
    pub message: String,
    pub order: Order,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid current order status '{status}'")]
    InvalidState { status: String },
    #[error(
        "Invalid status transition: Cannot change from '{from}' to '{to}'. Allowed next statuses: {}",
        join_or_none(.allowed)
    )]
    IllegalTransition { from: OrderStatus, to: OrderStatus, allowed: Vec<OrderStatus> },
    #[error(
        "User role '{role}' is not allowed to set status to '{to}'. Allowed roles: {}",
        join_or_none(.allowed_roles)
    )]
    Forbidden { role: ActorRole, to: OrderStatus, allowed_roles: Vec<ActorRole> },
    #[error("{reason}")]
    PreconditionFailed { reason: String },
}

fn join_or_none<T: ToString>(items: &[T]) -> String {
    if items.is_empty() {
        return "none".to_string();
    }
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Validates and applies order status transitions against a lifecycle table.
/// Pure: persistence and side effects belong to the caller.
pub struct OrderStateMachine<L = MarketplaceLifecycle> {
    lifecycle: L,
}

impl<L> OrderStateMachine<L>
where
    L: OrderLifecycle,
{
    pub fn new(lifecycle: L) -> Self {
        Self { lifecycle }
    }

    pub fn initial_status(&self) -> OrderStatus {
        self.lifecycle.initial_status()
    }

    /// Placing an order counts as setting its initial status.
    pub fn authorize_placement(&self, role: ActorRole) -> Result<(), TransitionError> {
        let initial = self.lifecycle.initial_status();
        let roles = self.lifecycle.authorized_roles(initial);
        if roles.contains(&role) {
            return Ok(());
        }
        Err(TransitionError::Forbidden { role, to: initial, allowed_roles: roles.to_vec() })
    }

    /// Checks run in a fixed order: graph, role, cancellation reason, then the
    /// delivered-after-shipped precondition.
    pub fn validate(
        &self,
        current: OrderStatus,
        request: &TransitionRequest,
    ) -> Result<(), TransitionError> {
        let to = request.new_status;
        let allowed = self
            .lifecycle
            .next_statuses(current)
            .ok_or_else(|| TransitionError::InvalidState { status: current.to_string() })?;

        if !allowed.contains(&to) {
            return Err(TransitionError::IllegalTransition {
                from: current,
                to,
                allowed: allowed.to_vec(),
            });
        }

        let roles = self.lifecycle.authorized_roles(to);
        if !roles.contains(&request.actor_role) {
            return Err(TransitionError::Forbidden {
                role: request.actor_role,
                to,
                allowed_roles: roles.to_vec(),
            });
        }

        if to == OrderStatus::Cancelled && request.given_reason().is_none() {
            return Err(TransitionError::PreconditionFailed {
                reason: "Cancellation reason is required".to_string(),
            });
        }

        if to == OrderStatus::Delivered && current != OrderStatus::Shipped {
            return Err(TransitionError::PreconditionFailed {
                reason: "Order must be shipped before marking as delivered".to_string(),
            });
        }

        Ok(())
    }

    pub fn apply(
        &self,
        order: &Order,
        request: &TransitionRequest,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, TransitionError> {
        let from = order.status;
        self.validate(from, request)?;

        let to = request.new_status;
        let reason = request.given_reason().map(str::to_owned);
        let mut next = order.clone();

        next.status = to;
        next.updated_at = Some(now);
        next.updated_by = Some(request.actor_id.clone());
        next.version = order.version.saturating_add(1);
        match to {
            OrderStatus::Placed => {}
            OrderStatus::Confirmed => next.confirmed_at = Some(now),
            OrderStatus::Processing => next.processing_at = Some(now),
            OrderStatus::Shipped => next.shipped_at = Some(now),
            OrderStatus::Delivered => {
                next.delivered_at = Some(now);
                next.completed_at = Some(now);
            }
            OrderStatus::Cancelled => {
                next.cancelled_at = Some(now);
                next.cancellation_reason = reason.clone();
            }
        }
        next.status_history.push(StatusChange {
            status: to,
            actor_id: request.actor_id.clone(),
            actor_role: request.actor_role,
            changed_at: now,
            reason,
        });

        Ok(TransitionOutcome {
            previous_status: from,
            new_status: to,
            updated_at: now,
            message: format!("Order status successfully updated from '{from}' to '{to}'"),
            order: next,
        })
    }

    pub fn apply_with_audit<S>(
        &self,
        order: &Order,
        request: &TransitionRequest,
        now: DateTime<Utc>,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, TransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(order, request, now);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::from_context(
                        audit,
                        "order.transition_applied",
                        AuditCategory::Order,
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", outcome.previous_status.as_str())
                    .with_metadata("to", outcome.new_status.as_str())
                    .with_metadata("role", request.actor_role.as_str())
                    .with_metadata("version", outcome.order.version.to_string()),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::from_context(
                        audit,
                        "order.transition_rejected",
                        AuditCategory::Order,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("from", order.status.as_str())
                    .with_metadata("to", request.new_status.as_str())
                    .with_metadata("role", request.actor_role.as_str())
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Default for OrderStateMachine<MarketplaceLifecycle> {
    fn default() -> Self {
        Self::new(MarketplaceLifecycle)
    }
}
