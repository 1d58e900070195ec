// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Route plans: which tool provider a task should use, with fallbacks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a task was moved off its planned provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerouteReason {
    ProviderUnreachable,
    ProviderUnhealthy,
    ProviderNotConfigured,
}

impl RerouteReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RerouteReason::ProviderUnreachable => "provider_unreachable",
            RerouteReason::ProviderUnhealthy => "provider_unhealthy",
            RerouteReason::ProviderNotConfigured => "provider_not_configured",
        }
    }
}

impl fmt::Display for RerouteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stored routing decision for a task.
///
/// `primary` is the tool the planner chose; `fallback_chain` is tried in
/// order when the primary's health check fails at planning time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    pub primary: String,
    #[serde(default)]
    pub fallback_chain: Vec<String>,
    /// ISO-8601 UTC timestamp of the last verification against health.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<String>,
}

impl RoutePlan {
    pub fn new(primary: impl Into<String>, fallback_chain: Vec<String>) -> Self {
        Self {
            primary: primary.into(),
            fallback_chain,
            verified_at: None,
        }
    }

    /// Reroute onto the next fallback, returning the new plan.
    ///
    /// The old primary drops off the front; the chain shortens by one.
    pub fn rerouted(&self) -> Option<RoutePlan> {
        let (next, rest) = self.fallback_chain.split_first()?;
        Some(RoutePlan {
            primary: next.clone(),
            fallback_chain: rest.to_vec(),
            verified_at: None,
        })
    }
}

#[cfg(test)]
#[path = "route_tests.rs"]
mod tests;
