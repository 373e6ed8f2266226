//! Adaptive bitrate estimation and selection.
//!
//! Protocol-agnostic: the estimator consumes throughput samples from any
//! segment source, the chooser selects among [`tessera_core::Representation`]s
//! of any track type.
//!
//! ## Shape
//!
//! - [`Ewma`] — one exponentially weighted moving average with bias
//!   correction for small total weight.
//! - [`BandwidthEstimator`] — fast+slow EWMA pair plus a low-latency chunk
//!   filter; yields one scalar estimate in bits per second.
//! - [`RepresentationChooser`] — per-track selector combining the estimate
//!   with user ceilings, device constraints, a manual pin, and buffer health.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use tessera_abr::{BandwidthEstimator, EstimatorOptions, Sample, SampleSource};
//! use web_time::Instant;
//!
//! let mut est = BandwidthEstimator::new(EstimatorOptions::default());
//! est.add_sample(Sample {
//!     duration: Duration::from_millis(500),
//!     bytes: 250_000,
//!     is_chunk: false,
//!     source: SampleSource::Network,
//!     at: Instant::now(),
//! });
//! assert!(est.estimate(false).is_some());
//! ```

#![forbid(unsafe_code)]

mod chooser;
mod estimator;
mod ewma;
mod types;

pub use chooser::{Choice, ChooserOptions, RepresentationChooser, SwitchReason};
pub use estimator::{BandwidthEstimator, Estimator, SharedEstimator};
pub use ewma::Ewma;
pub use types::{EstimatorOptions, Sample, SampleSource};
