// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy routing: exact match, prefix/suffix patterns, default.

use crate::supervisor::policy::Policy;
use std::collections::HashMap;
use std::sync::Arc;

/// Routes event types to policies. At most one policy per event.
#[derive(Default)]
pub struct PolicyRouter {
    exact: HashMap<String, Arc<dyn Policy>>,
    patterns: Vec<(String, Arc<dyn Policy>)>,
    default_policy: Option<Arc<dyn Policy>>,
}

impl PolicyRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a policy for an event type or a single-wildcard pattern
    /// (`task.*`, `*.completed`).
    pub fn register(&mut self, pattern: &str, policy: Arc<dyn Policy>) {
        if pattern.contains('*') {
            self.patterns.push((pattern.to_string(), policy));
        } else {
            self.exact.insert(pattern.to_string(), policy);
        }
    }

    pub fn register_default(&mut self, policy: Arc<dyn Policy>) {
        self.default_policy = Some(policy);
    }

    /// Resolve the policy for `event_type`: exact match first, then the
    /// first matching pattern in registration order, then the default.
    pub fn route(&self, event_type: &str) -> Option<Arc<dyn Policy>> {
        if let Some(policy) = self.exact.get(event_type) {
            return Some(Arc::clone(policy));
        }
        for (pattern, policy) in &self.patterns {
            if pattern_matches(event_type, pattern) {
                return Some(Arc::clone(policy));
            }
        }
        self.default_policy.as_ref().map(Arc::clone)
    }

    /// Registered patterns with policy names, for diagnostics.
    pub fn registered(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .exact
            .iter()
            .map(|(pattern, policy)| (pattern.clone(), policy.name().to_string()))
            .collect();
        out.extend(
            self.patterns
                .iter()
                .map(|(pattern, policy)| (pattern.clone(), policy.name().to_string())),
        );
        if let Some(default) = &self.default_policy {
            out.push(("__default__".to_string(), default.name().to_string()));
        }
        out.sort();
        out
    }
}

/// Leading or trailing single-wildcard match. Infix wildcards are not
/// supported.
fn pattern_matches(event_type: &str, pattern: &str) -> bool {
    if let Some(suffix) = pattern.strip_prefix('*') {
        return event_type.ends_with(suffix);
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return event_type.starts_with(prefix);
    }
    event_type == pattern
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
