//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (bridge backend has a node, names unique)
//! - Validate value ranges (intervals > 0, URLs parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: EngineConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::EngineConfig;
use crate::ledger::types::{Address, Network};

/// A single semantic problem in a config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut names = HashSet::new();
    for (i, node) in config.nodes.iter().enumerate() {
        let field = format!("nodes[{}]", i);
        if node.name.trim().is_empty() {
            errors.push(ValidationError::new(&field, "node name is empty"));
        } else if !names.insert(node.name.as_str()) {
            errors.push(ValidationError::new(&field, format!("duplicate node name '{}'", node.name)));
        }
        if let Err(e) = url::Url::parse(&node.url) {
            errors.push(ValidationError::new(&field, format!("invalid url '{}': {}", node.url, e)));
        }
    }

    let bridge = &config.bridge;
    if bridge.backend_network == Network::Bridge {
        errors.push(ValidationError::new(
            "bridge.backend_network",
            "the bridge cannot be its own backend",
        ));
    }
    if bridge.enabled {
        if config.node_for(Network::Bridge).is_none() {
            errors.push(ValidationError::new("bridge", "enabled but no bridge node configured"));
        }
        if config.node_for(bridge.backend_network).is_none() {
            errors.push(ValidationError::new(
                "bridge.backend_network",
                format!("no node configured for backend network {}", bridge.backend_network),
            ));
        }
    }
    for (i, address) in bridge.addresses.iter().enumerate() {
        if address.parse::<Address>().is_err() {
            errors.push(ValidationError::new(
                format!("bridge.addresses[{}]", i),
                format!("malformed address '{}'", address),
            ));
        }
    }

    let polling = &config.polling;
    if polling.interval_ms == 0 {
        errors.push(ValidationError::new("polling.interval_ms", "must be greater than zero"));
    }
    if polling.timeout_ms < polling.interval_ms {
        errors.push(ValidationError::new("polling.timeout_ms", "must be at least one interval"));
    }
    if polling.receipt_timeout_ms < polling.interval_ms {
        errors.push(ValidationError::new(
            "polling.receipt_timeout_ms",
            "must be at least one interval",
        ));
    }
    if polling.link_window == 0 {
        errors.push(ValidationError::new("polling.link_window", "must be greater than zero"));
    }

    if config.health_check.enabled && config.health_check.interval_secs == 0 {
        errors.push(ValidationError::new("health_check.interval_secs", "must be greater than zero"));
    }
    if config.rpc.timeout_secs == 0 {
        errors.push(ValidationError::new("rpc.timeout_secs", "must be greater than zero"));
    }
    if config.rpc.subscription_poll_ms == 0 {
        errors.push(ValidationError::new("rpc.subscription_poll_ms", "must be greater than zero"));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("not a socket address: '{}'", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
