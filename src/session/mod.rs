use std::collections::HashMap;

use crate::document::DocumentArtifact;
use crate::episodes::Episode;

/// Where an episode's download currently stands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DownloadState {
    #[default]
    Idle,
    Fetching,
    Ready(DocumentArtifact),
}

/// Per-episode download state, keyed by locator
#[derive(Debug, Default)]
pub struct DownloadBoard {
    states: HashMap<String, DownloadState>,
}

impl DownloadBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, episode: &Episode) -> &DownloadState {
        static IDLE: DownloadState = DownloadState::Idle;
        self.states.get(&episode.locator).unwrap_or(&IDLE)
    }

    /// Mark the episode as fetching. Returns false if it already is.
    pub fn begin(&mut self, episode: &Episode) -> bool {
        let state = self.states.entry(episode.locator.clone()).or_default();
        if *state == DownloadState::Fetching {
            return false;
        }
        *state = DownloadState::Fetching;
        true
    }

    pub fn complete(&mut self, episode: &Episode, artifact: DocumentArtifact) {
        self.states
            .insert(episode.locator.clone(), DownloadState::Ready(artifact));
    }

    pub fn reset(&mut self, episode: &Episode) {
        self.states.remove(&episode.locator);
    }

    /// Artifacts that are ready, in no particular order
    pub fn ready(&self) -> impl Iterator<Item = &DocumentArtifact> {
        self.states.values().filter_map(|state| match state {
            DownloadState::Ready(artifact) => Some(artifact),
            _ => None,
        })
    }
}
