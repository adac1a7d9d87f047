//! Test infrastructure shared by the paysink crates.
//!
//! Provides fixture builders for payments and merchants, event sinks that
//! record, fail, stall or panic on demand, and a wiremock-backed webhook
//! target that replays scripted status sequences.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod fixtures;
pub mod http;
pub mod sinks;

pub use fixtures::{MerchantBuilder, PaymentBuilder};
pub use http::{ReceivedWebhook, WebhookTarget};
pub use sinks::{FailingSink, PanickingSink, RecordingSink, SinkJournal, SlowSink};
