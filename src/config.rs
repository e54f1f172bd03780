//! Serde-backed configuration, replacing the original's global option state
//! (`bow_argp`) with an explicit value threaded through [`crate::Session`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::smoothing::SmoothingMethod;

/// Event model for class-barrel construction (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventModel {
    Word,
    Document,
    DocumentThenWord,
}

/// Knobs that govern dictionary/PV/barrel behavior during a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Admit unseen terms into the dictionary on `intern`. Queries against a
    /// frozen vocabulary (pass 2 of prune-by-occurrence, or at query time)
    /// set this to `false`.
    pub admit_new_terms: bool,
    /// Reserve id 0 for an unknown-word bucket.
    pub reserve_unknown_bucket: bool,
    /// Total in-memory PV write-buffer bytes before a flush is triggered.
    pub pv_watermark_bytes: u64,
    /// Pseudo-length `L` used by the document-then-word event model.
    pub pseudo_document_length: f64,
    /// Hard cap on phrase/boolean query atoms (50 in the original).
    pub max_query_atoms: usize,
    pub event_model: EventModel,
    pub smoothing: SmoothingMethod,
    /// Random seed for the split/tag engine (§4.5) and the primary-class
    /// draw in list-file barrel construction.
    pub split_seed: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            admit_new_terms: true,
            reserve_unknown_bucket: false,
            pv_watermark_bytes: 128 * 1024 * 1024,
            pseudo_document_length: 1000.0,
            max_query_atoms: 50,
            event_model: EventModel::Word,
            smoothing: SmoothingMethod::Laplace,
            split_seed: 42,
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(s: &str) -> Result<Self, String> {
        serde_json::from_str(s).map_err(|e| format!("invalid session config: {e}"))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, String> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("reading config {}: {e}", path.display()))?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| format!("serializing config: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let cfg = SessionConfig::default();
        let json = cfg.to_json_string().unwrap();
        let back = SessionConfig::from_json_str(&json).unwrap();
        assert_eq!(back.pv_watermark_bytes, cfg.pv_watermark_bytes);
        assert_eq!(back.max_query_atoms, cfg.max_query_atoms);
    }
}
