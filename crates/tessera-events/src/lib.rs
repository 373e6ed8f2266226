//! Events and metrics plumbing for the tessera engine.
//!
//! One broadcast [`EventBus`] carries every user-visible event; one
//! [`MetricsBus`] fans per-request throughput samples from the pipelines into
//! the estimator, preserving emission order.

#![forbid(unsafe_code)]

mod bus;
mod event;
mod metrics;

pub use bus::EventBus;
pub use event::{AbrEvent, Event, PipelineEvent, PlayerEvent};
pub use metrics::{MetricsBus, MetricsReceiver, TrackSample};
