// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Log control for the certification harness.
//!
//! Every module that logs declares itself with [`trace_target!`] (or
//! [`custom_target!`] for third-party targets). The declarations are
//! collected at link time, so the full list of targets and their default
//! levels is known before the subscriber is installed, and can be changed at
//! run time with `tag=level` strings such as `default=warn,filter=debug`.

pub mod control;
pub mod display;
pub mod targets;

// re-exports
pub use control::LogConfigError;
pub use control::TracingControl;
pub use control::get_trace_ctl;
pub use tracing_subscriber::filter::LevelFilter;
