//! # simple-counter MQTT
//!
//! MQTT transport for simple-counter adapters.
//!
//! [`MqttPublisher`] implements the core `Publisher` trait on top of a
//! `rumqttc` client. Each batch is published as one JSON document:
//!
//! ```text
//! {"adapterId":"counter-1","sampledAt":"2024-01-01T00:00:00Z","dataPoints":[{"name":"counter","value":6}]}
//! ```
//!
//! The client's event loop must be driven for anything to reach the broker;
//! [`spawn_event_loop`] does that on the tokio runtime.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod publisher;
pub mod topic;

pub use publisher::{qos_from_level, spawn_event_loop, MqttError, MqttPublisher, MqttPublisherConfig};
pub use topic::{validate_topic_name, TopicError};
