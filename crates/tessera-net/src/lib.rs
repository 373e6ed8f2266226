//! HTTP transport for the tessera streaming engine.
//!
//! A thin [`Net`] trait over `reqwest`, composed with decorators:
//! [`TimeoutNet`] enforces a per-request deadline, [`RetryNet`] adds bounded
//! retry with truncated exponential backoff and jitter.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tessera_net::{HttpClient, NetExt, NetOptions, RetryPolicy};
//!
//! let net = HttpClient::new(NetOptions::default())
//!     .with_timeout(Duration::from_secs(30))
//!     .with_retry(RetryPolicy::default());
//! # let _ = net;
//! ```

#![forbid(unsafe_code)]

mod client;
mod error;
mod retry;
mod timeout;
mod traits;
mod types;

pub use client::HttpClient;
pub use error::{NetError, NetResult};
pub use retry::{RetryClassifier, RetryNet, StatusRetryClassifier};
pub use timeout::TimeoutNet;
pub use traits::{ByteStream, Net, NetExt};
pub use types::{Headers, NetOptions, RangeSpec, RetryPolicy};
