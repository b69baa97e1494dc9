use crate::domain::order::{ActorRole, OrderStatus};

/// Declarative description of an order lifecycle: which statuses may follow
/// which, and which roles may move an order into a given status.
pub trait OrderLifecycle {
    fn initial_status(&self) -> OrderStatus;

    /// `None` means `current` has no entry in the lifecycle table.
    fn next_statuses(&self, current: OrderStatus) -> Option<&'static [OrderStatus]>;

    fn authorized_roles(&self, destination: OrderStatus) -> &'static [ActorRole];
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MarketplaceLifecycle;

const FROM_PLACED: &[OrderStatus] = &[OrderStatus::Confirmed, OrderStatus::Cancelled];
const FROM_CONFIRMED: &[OrderStatus] = &[OrderStatus::Processing, OrderStatus::Cancelled];
const FROM_PROCESSING: &[OrderStatus] = &[OrderStatus::Shipped, OrderStatus::Cancelled];
const FROM_SHIPPED: &[OrderStatus] = &[OrderStatus::Delivered];
const TERMINAL: &[OrderStatus] = &[];

const PLACERS: &[ActorRole] = &[ActorRole::Consumer];
const CONFIRMERS: &[ActorRole] = &[ActorRole::Farmer, ActorRole::Shg, ActorRole::Admin];
const PROCESSORS: &[ActorRole] = &[ActorRole::Shg, ActorRole::Admin];
const RECEIVERS: &[ActorRole] = &[ActorRole::Consumer, ActorRole::Admin];
const CANCELLERS: &[ActorRole] =
    &[ActorRole::Consumer, ActorRole::Farmer, ActorRole::Shg, ActorRole::Admin];

impl OrderLifecycle for MarketplaceLifecycle {
    fn initial_status(&self) -> OrderStatus {
        OrderStatus::Placed
    }

    fn next_statuses(&self, current: OrderStatus) -> Option<&'static [OrderStatus]> {
        Some(match current {
            OrderStatus::Placed => FROM_PLACED,
            OrderStatus::Confirmed => FROM_CONFIRMED,
            OrderStatus::Processing => FROM_PROCESSING,
            OrderStatus::Shipped => FROM_SHIPPED,
            OrderStatus::Delivered | OrderStatus::Cancelled => TERMINAL,
        })
    }

    fn authorized_roles(&self, destination: OrderStatus) -> &'static [ActorRole] {
        match destination {
            OrderStatus::Placed => PLACERS,
            OrderStatus::Confirmed => CONFIRMERS,
            OrderStatus::Processing | OrderStatus::Shipped => PROCESSORS,
            OrderStatus::Delivered => RECEIVERS,
            OrderStatus::Cancelled => CANCELLERS,
        }
    }
}
