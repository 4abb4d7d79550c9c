//! Alerting channels.

pub mod email;
