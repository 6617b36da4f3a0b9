//! # simple-counter core
//!
//! Lifecycle contract for polling protocol adapters, with a reference
//! adapter that exposes a single incrementing counter.
//!
//! This crate provides:
//! - Validated adapter configuration ([`AdapterConfig`])
//! - The scheduler-facing [`PollingAdapter`] trait and [`SimpleCounterAdapter`]
//! - The [`Publisher`] seam through which samples leave the adapter
//! - The consecutive-error budget that decides when an adapter is removed
//!
//! Scheduling and transport live elsewhere; see the `simple-counter-mqtt`
//! and `simple-counter-agent` crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod budget;
pub mod config;
pub mod datapoint;
pub mod publisher;
pub mod state;

pub use adapter::{
    PollError, PollingAdapter, SimpleCounterAdapter, StartError, StopError, StopReason,
    COUNTER_DATA_POINT,
};
pub use budget::ErrorBudget;
pub use config::{load_adapter_configs, AdapterConfig, ConfigError, RawAdapterConfig};
pub use datapoint::{DataPoint, DataPointBatch};
pub use publisher::{MemoryPublisher, PublishError, Publisher};
pub use state::{ConnectionStatus, Lifecycle};
