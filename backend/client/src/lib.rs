//! Client side of the chart-insight relay.
//!
//! [`InsightConsumer`] posts `{chartType, data}` to the relay, decodes the
//! event stream line by line and exposes `content`, loading and error state
//! through a `watch` channel.

pub mod consumer;
pub mod http;

pub use consumer::{InsightConsumer, InsightState, Phase, STREAM_TRUNCATED};
pub use http::{InsightClient, REQUEST_FAILED};
