//! Payment event notification service.
//!
//! Ties the workspace crates together: fraud screening before a payment is
//! saved, sink fan-out after every status change, and signed merchant
//! webhooks with bounded retry.
//!
//! ```text
//! PaymentWorkflow ──▶ paysink-fraud      (pre-commit scoring)
//!                 ──▶ paysink-dispatch   (internal sinks)
//!                 ──▶ paysink-delivery   (merchant webhooks)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod config;
pub mod workflow;

pub use app::{App, SinkRegistryBuilder};
pub use config::Config;
pub use workflow::{
    CreatePayment, PaymentMethod, PaymentWorkflow, ProcessingSettings, RefundReceipt,
    WorkflowError, WorkflowParts,
};
