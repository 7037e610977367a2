//! # fullgrad_monitor
//!
//! Watches a tensor store while a job is still recording and renders a
//! saliency figure for every step as soon as all of its tensors are present.
//!
//! This crate provides:
//! - [`StepPoller`], the polling loop with timeout and cancellation
//! - [`StepHandler`], the per-step hook the loop drives
//! - [`SaliencyStepHandler`], which builds and renders full-gradient maps
//! - [`WatchConfig`], the JSON-loadable configuration of a watch run
//!
//! ## Example
//!
//! ```rust,ignore
//! use fullgrad_monitor::{SaliencyStepHandler, StepPoller, WatchConfig};
//!
//! let config = WatchConfig::from_json_file("watch.json")?;
//! let mut handler = SaliencyStepHandler::<NdArray>::from_config(&config, device);
//! let report = StepPoller::new(config.poll).run(&store, &mut handler)?;
//! println!("rendered {} steps", report.rendered.len());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod cancel;
mod config;
mod error;
mod handler;
mod poller;

pub use cancel::CancelToken;
pub use config::{PollConfig, WatchConfig};
pub use error::{MonitorError, Result};
pub use handler::SaliencyStepHandler;
pub use poller::{PollReport, PollState, StepHandler, StepPoller};
