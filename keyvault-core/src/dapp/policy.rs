//! Gate policy
//!
//! Site-specific allowances are data, loaded from configuration, never
//! branches in the gate.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A site whose network-mismatch prompt is not shown for one scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MismatchException {
    /// Exact origin, e.g. `https://opensea.io`
    pub origin: String,
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatePolicy {
    /// Sites that never see the network-mismatch prompt for a scope. The
    /// request still fails; only the prompt is suppressed.
    pub mismatch_exceptions: Vec<MismatchException>,
    /// Methods answered with an empty list instead of an error when the
    /// network does not match
    pub empty_result_methods: Vec<String>,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            mismatch_exceptions: Vec::new(),
            empty_result_methods: vec!["eth_requestAccounts".to_string()],
        }
    }
}

impl GatePolicy {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidInput(format!("Cannot read policy {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn suppresses_mismatch_prompt(&self, origin: &str, scope: Option<&str>) -> bool {
        let Some(scope) = scope else {
            return false;
        };
        self.mismatch_exceptions
            .iter()
            .any(|e| e.origin == origin && e.scope == scope)
    }

    pub fn is_empty_result_method(&self, method: &str) -> bool {
        self.empty_result_methods.iter().any(|m| m == method)
    }
}
