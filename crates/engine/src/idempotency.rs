// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotency layers: the LLM output cache and the tool-call ledger.

use crate::error::EngineError;
use fm_core::Clock;
use fm_storage::{Store, ToolLedgerEntry};
use sha2::{Digest, Sha256};
use std::future::Future;

/// Cache of generated model output keyed by content hash.
///
/// Best-effort: a cache read or write failure falls back to direct
/// generation and logs, it never fails the caller.
#[derive(Clone)]
pub struct LlmCache<C: Clock> {
    store: Store,
    clock: C,
}

impl<C: Clock> LlmCache<C> {
    pub fn new(store: Store, clock: C) -> Self {
        Self { store, clock }
    }

    /// Cache key over operation, model, canonicalised prompt, and the
    /// task-scoping salt.
    pub fn cache_key(operation_type: &str, model: &str, prompt: &str, scope: &str) -> String {
        let canonical_prompt = prompt.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut hasher = Sha256::new();
        hasher.update(operation_type.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(model.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(canonical_prompt.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(scope.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Return the cached output, or generate, store, and return it.
    pub async fn get_or_generate<F, Fut>(
        &self,
        operation_type: &str,
        model: &str,
        prompt: &str,
        scope: &str,
        generate: F,
    ) -> Result<String, EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, EngineError>>,
    {
        let key = Self::cache_key(operation_type, model, prompt, scope);
        match self.store.llm_cache_get(&key) {
            Ok(Some(cached)) => {
                tracing::debug!(operation = operation_type, "llm cache hit");
                return Ok(cached);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "llm cache read failed, generating directly");
            }
        }

        let output = generate().await?;
        if let Err(e) = self.store.llm_cache_put(
            &key,
            operation_type,
            model,
            &output,
            &self.clock.now_iso(),
        ) {
            tracing::warn!(error = %e, "llm cache write failed");
        }
        Ok(output)
    }
}

/// Replays identical tool calls within a task scope.
#[derive(Clone)]
pub struct ToolLedger<C: Clock> {
    store: Store,
    clock: C,
}

impl<C: Clock> ToolLedger<C> {
    pub fn new(store: Store, clock: C) -> Self {
        Self { store, clock }
    }

    /// Return the recorded result for `fingerprint`, or execute, record,
    /// and return. The boolean is true when the call was replayed.
    pub async fn execute_or_replay<F, Fut>(
        &self,
        task_id: &str,
        fingerprint: &str,
        execute: F,
    ) -> Result<(serde_json::Value, i32, bool), EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(serde_json::Value, i32), EngineError>>,
    {
        if let Some(entry) = self.store.tool_ledger_get(task_id, fingerprint)? {
            tracing::debug!(task = task_id, fingerprint, "tool call replayed from ledger");
            return Ok((entry.result, entry.exit_code, true));
        }

        let (result, exit_code) = execute().await?;
        self.store.tool_ledger_record(&ToolLedgerEntry {
            task_id: task_id.to_string(),
            fingerprint: fingerprint.to_string(),
            result: result.clone(),
            exit_code,
            ts: self.clock.now_iso(),
        })?;
        Ok((result, exit_code, false))
    }
}

#[cfg(test)]
#[path = "idempotency_tests.rs"]
mod tests;
