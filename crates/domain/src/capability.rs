// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-robot capability profiles (spec §3, §6: `capabilities_<id>.json`).

use std::collections::HashSet;

use serde::Deserialize;
use thiserror::Error;

use crate::action::ActionRegistry;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("malformed capabilities file: {0}")]
    Malformed(String),
    #[error("{0:?} is not a valid action")]
    UnknownAction(String),
}

#[derive(Deserialize)]
struct RawCapabilities {
    capabilities: Vec<String>,
}

/// The set of action names a robot may execute (spec §3: "capability
/// profile"). Immutable at runtime unless explicitly reconfigured (§9).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityProfile {
    actions: HashSet<String>,
}

impl CapabilityProfile {
    pub fn is_capable_to(&self, action_name: &str) -> bool {
        self.actions.contains(action_name)
    }

    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn from_names(
        names: impl IntoIterator<Item = String>,
        registry: &ActionRegistry,
    ) -> Result<Self, CapabilityError> {
        let mut actions = HashSet::new();
        for name in names {
            if !registry.has_action(&name) {
                return Err(CapabilityError::UnknownAction(name));
            }
            actions.insert(name);
        }
        Ok(Self { actions })
    }

    /// Parse a `{"capabilities": ["chop", "fry", ...]}` document.
    pub fn from_json(raw: &str, registry: &ActionRegistry) -> Result<Self, CapabilityError> {
        let parsed: RawCapabilities =
            serde_json::from_str(raw).map_err(|e| CapabilityError::Malformed(e.to_string()))?;
        Self::from_names(parsed.capabilities, registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::tool::RobotTool;

    fn registry() -> ActionRegistry {
        ActionRegistry::from_pairs([("chop", Action::Autonomous { tool: RobotTool::Cutter, duration: 1 })])
    }

    #[test]
    fn parses_known_capabilities() {
        let json = r#"{"capabilities": ["chop"]}"#;
        let profile = CapabilityProfile::from_json(json, &registry()).unwrap();
        assert!(profile.is_capable_to("chop"));
        assert!(!profile.is_capable_to("fry"));
    }

    #[test]
    fn unknown_action_is_rejected() {
        let json = r#"{"capabilities": ["whisk"]}"#;
        let err = CapabilityProfile::from_json(json, &registry()).unwrap_err();
        assert_eq!(err, CapabilityError::UnknownAction("whisk".into()));
    }
}
