//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Token lifecycle
    pub static ref TOKENS_ISSUED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("skiff_tokens_issued_total", "Total number of magic link tokens issued"),
        &["token_type"]
    ).expect("metric can be created");
    pub static ref TOKENS_CONSUMED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("skiff_tokens_consumed_total", "Total number of magic link tokens consumed"),
        &["token_type"]
    ).expect("metric can be created");

    // Federation
    pub static ref ACTIVITIES_SENT_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("skiff_activities_sent_total", "Total number of ActivityPub activities sent"),
        &["activity_type"]
    ).expect("metric can be created");
    pub static ref ACTIVITIES_RECEIVED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("skiff_activities_received_total", "Total number of ActivityPub activities received"),
        &["activity_type"]
    ).expect("metric can be created");

    // Errors
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("skiff_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(TOKENS_ISSUED_TOTAL.clone()))
        .expect("TOKENS_ISSUED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(TOKENS_CONSUMED_TOTAL.clone()))
        .expect("TOKENS_CONSUMED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ACTIVITIES_SENT_TOTAL.clone()))
        .expect("ACTIVITIES_SENT_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ACTIVITIES_RECEIVED_TOTAL.clone()))
        .expect("ACTIVITIES_RECEIVED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");
}
