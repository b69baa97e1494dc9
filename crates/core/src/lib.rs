pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod notifications;
pub mod orders;
pub mod scoring;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use domain::batch::{
    BatchId, BatchMeasurements, GrainColor, GrainSize, QualityCheckRecord, QualityFinding,
    QualityStatus, QualityVerdict,
};
pub use domain::market::{Payment, PaymentStatus, PriceRecord};
pub use domain::order::{
    ActorRole, Order, OrderId, OrderStatus, PlaceOrder, SellerCategory, StatusChange,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use notifications::{Notification, NotificationKind, NotificationSink};
pub use orders::{
    MarketplaceLifecycle, OrderLifecycle, OrderStateMachine, TransitionError, TransitionOutcome,
    TransitionRequest,
};
pub use scoring::{
    DemandForecaster, PriceSuggestionEngine, QualityInspector, ScoringConfig,
};
