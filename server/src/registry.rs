//! Match registry: the single owner of every running match
//!
//! This module handles the lifecycle of match sessions, including:
//! - Opaque match handles issued on creation
//! - Capacity enforcement across concurrent matches
//! - Explicit teardown that waits for the session task to exit
//! - Cleanup of sessions whose task has already ended
//!
//! No component reaches into another match's state; everything goes through
//! the [`MatchHandle`] returned for that match.

use crate::config::{ConfigError, ServerConfig};
use crate::session::{MatchEvent, MatchHandle, MatchOptions, MatchSession};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Opaque identifier of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchId(u64);

impl MatchId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("match capacity of {0} reached")]
    CapacityReached(usize),

    #[error("unknown match {0}")]
    UnknownMatch(MatchId),

    #[error("session for match {0} is closed")]
    SessionClosed(MatchId),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Manages all running matches
///
/// The registry hands out a fresh [`MatchId`] per match, refuses new matches
/// once `max_matches` are running, and guarantees that a destroyed match's
/// session has fully stopped before `destroy` returns.
pub struct MatchRegistry {
    /// Running matches indexed by their id
    matches: HashMap<MatchId, MatchHandle>,
    /// Next id to issue
    next_id: u64,
    /// Shared, validated configuration
    config: Arc<ServerConfig>,
    /// Maximum number of concurrent matches
    max_matches: usize,
}

impl MatchRegistry {
    /// Creates an empty registry
    ///
    /// The configuration is validated here; an invalid configuration never
    /// produces a registry.
    pub fn new(config: ServerConfig) -> Result<Self, RegistryError> {
        config.validate()?;
        let max_matches = config.session.max_matches;
        Ok(Self {
            matches: HashMap::new(),
            next_id: 1,
            config: Arc::new(config),
            max_matches,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Spawns a new match session
    ///
    /// Returns the match id and the receiving end of its event stream. Fails
    /// when the registry is full or the options name an unknown difficulty.
    /// Must be called from within a tokio runtime.
    pub fn create_match(
        &mut self,
        options: &MatchOptions,
    ) -> Result<(MatchId, mpsc::UnboundedReceiver<MatchEvent>), RegistryError> {
        if self.matches.len() >= self.max_matches {
            return Err(RegistryError::CapacityReached(self.max_matches));
        }

        let id = MatchId::new(self.next_id);
        let (handle, events) = MatchSession::spawn(id, Arc::clone(&self.config), options)?;
        self.next_id += 1;

        info!(
            "Match {} created (opponent: {:?}, difficulty: {})",
            id, options.ai_slot, options.difficulty
        );
        self.matches.insert(id, handle);
        Ok((id, events))
    }

    pub fn get(&self, id: MatchId) -> Result<&MatchHandle, RegistryError> {
        self.matches.get(&id).ok_or(RegistryError::UnknownMatch(id))
    }

    /// Stops a match and waits for its session to exit
    pub async fn destroy(&mut self, id: MatchId) -> Result<(), RegistryError> {
        let handle = self
            .matches
            .remove(&id)
            .ok_or(RegistryError::UnknownMatch(id))?;
        handle.stop().await?;
        info!("Match {} destroyed", id);
        Ok(())
    }

    /// Drops handles of sessions whose task has already exited
    ///
    /// Returns the ids that were removed.
    pub fn reap_finished(&mut self) -> Vec<MatchId> {
        let finished: Vec<MatchId> = self
            .matches
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(id, _)| *id)
            .collect();

        for id in &finished {
            self.matches.remove(id);
            info!("Match {} reaped", id);
        }
        finished
    }

    /// Stops every match, waiting for each session to exit
    pub async fn shutdown_all(&mut self) {
        let ids: Vec<MatchId> = self.matches.keys().copied().collect();
        for id in ids {
            if let Err(e) = self.destroy(id).await {
                log::warn!("Failed to stop match {}: {}", id, e);
            }
        }
    }

    pub fn ids(&self) -> Vec<MatchId> {
        let mut ids: Vec<MatchId> = self.matches.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Returns the number of running matches
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Returns true if no match is running
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}
