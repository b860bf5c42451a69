//! Copy-on-write provider configuration.
//!
//! Readers take an `Arc` snapshot once per fetch and never hold the lock
//! while calling providers. Writers clone the current list, modify it and
//! swap the `Arc`, so in-flight fetches keep the snapshot they started with
//! and the next fetch sees the update.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{info, warn};

use crate::models::ProviderConfig;

pub struct ProviderSettings {
    current: RwLock<Arc<Vec<ProviderConfig>>>,
}

impl ProviderSettings {
    pub fn new(configs: Vec<ProviderConfig>) -> Self {
        Self {
            current: RwLock::new(Arc::new(configs)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Arc<Vec<ProviderConfig>>> {
        self.current.read().unwrap_or_else(|poisoned| {
            warn!("Provider settings lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arc<Vec<ProviderConfig>>> {
        self.current.write().unwrap_or_else(|poisoned| {
            warn!("Provider settings lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// The full configuration list as of now.
    pub fn snapshot(&self) -> Arc<Vec<ProviderConfig>> {
        Arc::clone(&self.read())
    }

    /// Enabled providers, lowest priority value first.
    ///
    /// Ties are broken by source id so the order never depends on insertion.
    pub fn enabled_in_priority_order(&self) -> Vec<ProviderConfig> {
        let snapshot = self.snapshot();
        let mut enabled: Vec<ProviderConfig> =
            snapshot.iter().filter(|c| c.enabled).cloned().collect();
        enabled.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.source_id.cmp(&b.source_id))
        });
        enabled
    }

    pub fn get(&self, source_id: &str) -> Option<ProviderConfig> {
        self.read()
            .iter()
            .find(|c| c.source_id == source_id)
            .cloned()
    }

    /// Apply `f` to a private copy of the list and publish the result.
    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Vec<ProviderConfig>),
    {
        let mut guard = self.write();
        let mut next = guard.as_ref().clone();
        f(&mut next);
        *guard = Arc::new(next);
    }

    /// Enable or disable a provider. Returns false if it is unknown.
    pub fn set_enabled(&self, source_id: &str, enabled: bool) -> bool {
        let mut found = false;
        self.update(|configs| {
            if let Some(config) = configs.iter_mut().find(|c| c.source_id == source_id) {
                config.enabled = enabled;
                found = true;
            }
        });
        if found {
            info!(
                "Provider '{}' {}",
                source_id,
                if enabled { "enabled" } else { "disabled" }
            );
        }
        found
    }

    /// Insert a provider configuration or replace the one with the same id.
    pub fn upsert(&self, config: ProviderConfig) {
        info!("Updating provider configuration: {:?}", config);
        self.update(|configs| {
            match configs.iter_mut().find(|c| c.source_id == config.source_id) {
                Some(existing) => *existing = config,
                None => configs.push(config),
            }
        });
    }

    /// Replace the whole configuration list.
    pub fn replace(&self, configs: Vec<ProviderConfig>) {
        *self.write() = Arc::new(configs);
    }
}
