//! Core domain models, event types and runtime primitives.
//!
//! Provides strongly-typed payment and merchant models, the event kinds
//! observed by sinks, the plugin registry shared by fraud rules and sinks,
//! repository contracts with in-memory stores, a clock abstraction and the
//! bounded worker pool used for asynchronous work. All other crates depend on
//! these foundational types.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod models;
pub mod registry;
pub mod storage;
pub mod time;
pub mod worker_pool;

pub use error::{CoreError, Result, SinkError};
pub use events::{EventKind, EventSink, WebhookEvent};
pub use models::{
    DeliveryId, DeliveryRecord, EventId, Merchant, MerchantId, MerchantStatus, Payment,
    PaymentId, PaymentStatus,
};
pub use registry::{Descriptor, PluginRegistry, RegistryBuilder, RegistryEntry};
pub use storage::{
    DeliveryRepository, InMemoryDeliveryRepository, InMemoryMerchantRepository,
    InMemoryPaymentRepository, MerchantRepository, PaymentRepository,
};
pub use time::{Clock, RealClock, TestClock};
pub use worker_pool::{Job, PoolConfig, PoolError, PoolStats, WorkerPool};
