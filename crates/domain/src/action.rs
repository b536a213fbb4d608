// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The process-wide action registry (spec §3): every action name a recipe
//! or capability file can reference must resolve here.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

use crate::tool::RobotTool;

/// How an action's duration is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Fixed duration regardless of recipe; a recipe must not override it.
    Autonomous { tool: RobotTool, duration: u32 },
    /// Duration is supplied by the recipe instruction at parse time.
    RecipeTimed { tool: RobotTool },
}

impl Action {
    pub fn tool(&self) -> RobotTool {
        match self {
            Self::Autonomous { tool, .. } | Self::RecipeTimed { tool } => *tool,
        }
    }

    pub fn is_autonomous(&self) -> bool {
        matches!(self, Self::Autonomous { .. })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionCatalogError {
    #[error("malformed action catalog: {0}")]
    Malformed(String),
    #[error("action {0:?} names an unknown tool {1:?}")]
    UnknownTool(String, String),
}

#[derive(Deserialize)]
struct RawAction {
    tool: String,
    #[serde(default)]
    kind: RawKind,
    #[serde(default)]
    duration: Option<u32>,
}

#[derive(Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum RawKind {
    #[default]
    Autonomous,
    RecipeTimed,
}

/// Process-wide, read-only action lookup table (spec §3: "action registry").
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Action>,
}

impl ActionRegistry {
    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    /// Parse a catalog of the shape `{"chop": {"tool": "CUTTER", "kind":
    /// "autonomous", "duration": 3}, "sear": {"tool": "PAN", "kind":
    /// "recipe_timed"}}`.
    pub fn from_json(raw: &str) -> Result<Self, ActionCatalogError> {
        let parsed: HashMap<String, RawAction> = serde_json::from_str(raw)
            .map_err(|e| ActionCatalogError::Malformed(e.to_string()))?;
        let mut actions = HashMap::with_capacity(parsed.len());
        for (name, entry) in parsed {
            let tool = entry.tool.parse::<RobotTool>().map_err(|_| {
                ActionCatalogError::UnknownTool(name.clone(), entry.tool.clone())
            })?;
            let action = match entry.kind {
                RawKind::Autonomous => Action::Autonomous {
                    tool,
                    duration: entry.duration.unwrap_or_default(),
                },
                RawKind::RecipeTimed => Action::RecipeTimed { tool },
            };
            actions.insert(name, action);
        }
        Ok(Self { actions })
    }

    #[cfg(test)]
    pub fn from_pairs(pairs: impl IntoIterator<Item = (&'static str, Action)>) -> Self {
        Self { actions: pairs.into_iter().map(|(k, v)| (k.to_owned(), v)).collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_autonomous_and_recipe_timed_entries() {
        let json = r#"{
            "chop": {"tool": "CUTTER", "kind": "autonomous", "duration": 3},
            "fry": {"tool": "PAN", "kind": "recipe_timed"}
        }"#;
        let registry = ActionRegistry::from_json(json).unwrap();
        assert!(registry.has_action("chop"));
        assert_eq!(
            registry.get("chop"),
            Some(&Action::Autonomous { tool: RobotTool::Cutter, duration: 3 })
        );
        assert_eq!(registry.get("fry"), Some(&Action::RecipeTimed { tool: RobotTool::Pan }));
    }

    #[test]
    fn unknown_tool_is_rejected() {
        let json = r#"{"chop": {"tool": "SPATULA", "kind": "autonomous", "duration": 1}}"#;
        let err = ActionRegistry::from_json(json).unwrap_err();
        assert!(matches!(err, ActionCatalogError::UnknownTool(_, _)));
    }
}
