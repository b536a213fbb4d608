// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recipe catalog parsing and validation (spec §3, §6: `recipes.json`).

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

use crate::action::ActionRegistry;
use crate::tool::RobotTool;

pub type RecipeId = u32;

/// One step of a recipe's action list, fully resolved against the action
/// registry (tool and duration are known, not just the action name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeStep {
    pub name: String,
    pub tool: RobotTool,
    pub ingredients: String,
    pub duration: u32,
}

/// An immutable, fully-validated recipe (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub recipe_id: RecipeId,
    pub dish_name: String,
    pub actions: Vec<RecipeStep>,
    pub cooking_time: u32,
    pub retooling_time: u32,
}

impl Recipe {
    pub fn overall_time(&self) -> u32 {
        self.cooking_time + self.retooling_time
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecipeError {
    #[error("malformed recipes catalog: {0}")]
    Malformed(String),
    #[error("recipe {0} has no instructions")]
    Empty(RecipeId),
    #[error("there is a missing action for recipe_id {0}")]
    MissingAction(RecipeId),
    #[error("there is no entry for the action {0:?}")]
    UnknownAction(String),
    #[error("the action {action:?} in recipe id {recipe_id} is autonomous and must not contain a duration")]
    AutonomousWithDuration { recipe_id: RecipeId, action: String },
    #[error("the action {action:?} in recipe id {recipe_id} is recipe timed and must contain a duration")]
    RecipeTimedWithoutDuration { recipe_id: RecipeId, action: String },
    #[error("there are no ingredients given for the {action:?} action in recipe id {recipe_id}")]
    MissingIngredients { recipe_id: RecipeId, action: String },
}

#[derive(Deserialize)]
struct RawRecipe {
    name: String,
    instructions: Vec<RawInstruction>,
}

#[derive(Deserialize)]
struct RawInstruction {
    action: Option<String>,
    ingredients: Option<String>,
    duration: Option<u32>,
}

/// Process-wide, read-only recipe lookup table, parsed once at startup
/// against the [`ActionRegistry`] (spec §3: "global registries").
#[derive(Debug, Clone, Default)]
pub struct RecipeCatalog {
    recipes: HashMap<RecipeId, Recipe>,
}

impl RecipeCatalog {
    pub fn get(&self, recipe_id: RecipeId) -> Option<&Recipe> {
        self.recipes.get(&recipe_id)
    }

    pub fn recipe_ids(&self) -> impl Iterator<Item = RecipeId> + '_ {
        self.recipes.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Choose a recipe id uniformly at random (spec §4.5: "`place_random_order`
    /// chooses a recipe uniformly at random from the catalog").
    pub fn random_id(&self) -> Option<RecipeId> {
        use rand::seq::IteratorRandom;
        self.recipes.keys().copied().choose(&mut rand::rng())
    }

    /// Parse `recipes.json`, keyed by decimal recipe id (spec §6).
    pub fn from_json(raw: &str, registry: &ActionRegistry) -> Result<Self, RecipeError> {
        let parsed: HashMap<String, RawRecipe> =
            serde_json::from_str(raw).map_err(|e| RecipeError::Malformed(e.to_string()))?;

        let mut recipes = HashMap::with_capacity(parsed.len());
        for (id_str, raw_recipe) in parsed {
            let recipe_id: RecipeId = id_str
                .parse()
                .map_err(|_| RecipeError::Malformed(format!("non-numeric recipe id {id_str:?}")))?;
            if raw_recipe.instructions.is_empty() {
                return Err(RecipeError::Empty(recipe_id));
            }

            let mut actions = Vec::with_capacity(raw_recipe.instructions.len());
            let mut cooking_time = 0u32;
            let mut retooling_time = 0u32;
            let mut last_tool: Option<RobotTool> = None;

            for instruction in raw_recipe.instructions {
                let name = instruction
                    .action
                    .ok_or(RecipeError::MissingAction(recipe_id))?;
                let action = registry
                    .get(&name)
                    .ok_or_else(|| RecipeError::UnknownAction(name.clone()))?;

                match (action.is_autonomous(), instruction.duration) {
                    (true, Some(_)) => {
                        return Err(RecipeError::AutonomousWithDuration {
                            recipe_id,
                            action: name,
                        })
                    }
                    (false, None) => {
                        return Err(RecipeError::RecipeTimedWithoutDuration {
                            recipe_id,
                            action: name,
                        })
                    }
                    _ => {}
                }

                let ingredients = instruction.ingredients.ok_or_else(|| {
                    RecipeError::MissingIngredients { recipe_id, action: name.clone() }
                })?;

                let duration = match action {
                    crate::action::Action::Autonomous { duration, .. } => *duration,
                    crate::action::Action::RecipeTimed { .. } => instruction.duration.unwrap_or(0),
                };
                let tool = action.tool();

                cooking_time += duration;
                if let Some(prev) = last_tool {
                    if prev != tool {
                        retooling_time += crate::clock::RETOOL_COST;
                    }
                }
                last_tool = Some(tool);

                actions.push(RecipeStep { name, tool, ingredients, duration });
            }

            recipes.insert(
                recipe_id,
                Recipe { recipe_id, dish_name: raw_recipe.name, actions, cooking_time, retooling_time },
            );
        }

        Ok(Self { recipes })
    }
}

#[cfg(test)]
mod recipe_tests;
