//! Provider rotation, failover mapping and usage counters.

use crate::api::{BUILTIN_PROVIDERS, ClipProvider, ProviderEndpoint, builtin_spec};
use crate::clip::ProviderId;
use crate::config::Config;
use crate::error::{FactoryError, FactoryResult};
use crate::logw;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct PoolEntry {
    pub id: ProviderId,
    /// Declared share of traffic. Not used by rotation yet.
    pub weight: f64,
    pub adapter: Arc<dyn ClipProvider>,
}

/// The configured provider set. Immutable once built.
#[derive(Clone)]
pub struct ProviderPool {
    entries: Vec<PoolEntry>,
    fallbacks: HashMap<ProviderId, ProviderId>,
}

impl std::fmt::Debug for ProviderPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderPool")
            .field("providers", &self.ids())
            .field("fallbacks", &self.fallbacks)
            .finish()
    }
}

impl ProviderPool {
    pub fn builder() -> ProviderPoolBuilder {
        ProviderPoolBuilder::default()
    }

    /// Build the pool from the built-in provider table, keeping only the
    /// providers that have credentials.
    pub fn from_config(cfg: &Config, client: reqwest::Client) -> FactoryResult<Self> {
        let mut builder = Self::builder();
        let timeout = Duration::from_secs(cfg.request_timeout_secs);

        for spec in BUILTIN_PROVIDERS {
            let Some(api_key) = cfg.api_key(spec.name) else {
                continue;
            };
            let endpoint = ProviderEndpoint {
                url: cfg
                    .endpoints
                    .get(spec.name)
                    .cloned()
                    .unwrap_or_else(|| spec.url.to_string()),
                api_key: api_key.to_string(),
                style: spec.style.to_string(),
                timeout,
            };
            let adapter = (spec.ctor)(ProviderId::new(spec.name), client.clone(), endpoint);
            builder = builder.provider(adapter, spec.weight);
        }

        for name in cfg.endpoints.keys() {
            if builtin_spec(name).is_none() {
                return Err(FactoryError::UnknownProvider(name.clone()));
            }
        }

        let configured: Vec<ProviderId> = builder.entries.iter().map(|e| e.id.clone()).collect();
        for id in &configured {
            if let Some(target) = cfg.fallbacks.get(id.as_str()) {
                builder = builder.fallback(id.clone(), ProviderId::new(target.as_str()));
            } else if let Some(spec) = builtin_spec(id.as_str()) {
                let target = ProviderId::new(spec.fallback);
                if configured.contains(&target) {
                    builder = builder.fallback(id.clone(), target);
                }
            }
        }

        builder.build()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<&ProviderId> {
        self.entries.iter().map(|e| &e.id).collect()
    }

    /// Round-robin assignment by 1-based clip ordinal.
    pub fn assign(&self, ordinal: usize) -> &ProviderId {
        let idx = ordinal.saturating_sub(1) % self.entries.len();
        &self.entries[idx].id
    }

    pub fn fallback_for<'a>(&'a self, id: &'a ProviderId) -> &'a ProviderId {
        self.fallbacks.get(id).unwrap_or(id)
    }

    /// Providers whose failover stage would retry the same provider.
    pub fn self_fallbacks(&self) -> Vec<&ProviderId> {
        self.entries
            .iter()
            .map(|e| &e.id)
            .filter(|id| self.fallback_for(id) == *id)
            .collect()
    }

    pub fn adapter(&self, id: &ProviderId) -> Option<&Arc<dyn ClipProvider>> {
        self.entries.iter().find(|e| &e.id == id).map(|e| &e.adapter)
    }

    pub fn weight(&self, id: &ProviderId) -> Option<f64> {
        self.entries.iter().find(|e| &e.id == id).map(|e| e.weight)
    }
}

#[derive(Default)]
pub struct ProviderPoolBuilder {
    entries: Vec<PoolEntry>,
    fallbacks: Vec<(ProviderId, ProviderId)>,
}

impl ProviderPoolBuilder {
    pub fn provider(mut self, adapter: Arc<dyn ClipProvider>, weight: f64) -> Self {
        self.entries.push(PoolEntry {
            id: adapter.id().clone(),
            weight,
            adapter,
        });
        self
    }

    pub fn fallback(mut self, from: ProviderId, to: ProviderId) -> Self {
        self.fallbacks.push((from, to));
        self
    }

    /// Providers without an explicit fallback fail over to the next
    /// provider in rotation order (themselves when alone).
    pub fn build(self) -> FactoryResult<ProviderPool> {
        if self.entries.is_empty() {
            return Err(FactoryError::NoProviders);
        }

        let mut seen = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            if seen.contains(&&entry.id) {
                return Err(FactoryError::DuplicateProvider(entry.id.to_string()));
            }
            seen.push(&entry.id);
        }

        let mut fallbacks = HashMap::new();
        for (from, to) in self.fallbacks {
            if !seen.contains(&&from) {
                return Err(FactoryError::UnknownProvider(from.to_string()));
            }
            if !seen.contains(&&to) {
                return Err(FactoryError::InvalidFallback {
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
            fallbacks.insert(from, to);
        }

        let n = self.entries.len();
        for (i, entry) in self.entries.iter().enumerate() {
            fallbacks
                .entry(entry.id.clone())
                .or_insert_with(|| self.entries[(i + 1) % n].id.clone());
        }

        let pool = ProviderPool {
            entries: self.entries,
            fallbacks,
        };
        for id in pool.self_fallbacks() {
            logw(format!(
                "Provider {} fails over to itself; the failover stage retries it",
                id
            ));
        }
        Ok(pool)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStats {
    pub successes: u32,
    pub failures: u32,
}

/// Per-provider call counters, threaded through a run as a value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderHealth {
    stats: BTreeMap<ProviderId, ProviderStats>,
}

impl ProviderHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy with one more call recorded against `provider`.
    #[must_use]
    pub fn record(&self, provider: &ProviderId, accepted: bool) -> Self {
        let mut next = self.clone();
        let entry = next.stats.entry(provider.clone()).or_default();
        if accepted {
            entry.successes += 1;
        } else {
            entry.failures += 1;
        }
        next
    }

    pub fn stats(&self, provider: &ProviderId) -> ProviderStats {
        self.stats.get(provider).copied().unwrap_or_default()
    }

    pub fn total_calls(&self) -> u32 {
        self.stats.values().map(|s| s.successes + s.failures).sum()
    }
}
