// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::action::Action;

fn registry() -> ActionRegistry {
    ActionRegistry::from_pairs([
        ("chop", Action::Autonomous { tool: RobotTool::Cutter, duration: 3 }),
        ("fry", Action::RecipeTimed { tool: RobotTool::Pan }),
        ("serve", Action::Autonomous { tool: RobotTool::Pan, duration: 1 }),
    ])
}

#[test]
fn parses_valid_recipe_and_computes_times() {
    let json = r#"{
        "1": {
            "name": "Stir Fry",
            "instructions": [
                {"action": "chop", "ingredients": "veg"},
                {"action": "fry", "ingredients": "veg", "duration": 5}
            ]
        }
    }"#;
    let catalog = RecipeCatalog::from_json(json, &registry()).unwrap();
    let recipe = catalog.get(1).unwrap();
    assert_eq!(recipe.dish_name, "Stir Fry");
    assert_eq!(recipe.cooking_time, 8);
    assert_eq!(recipe.retooling_time, 1);
    assert_eq!(recipe.overall_time(), 9);
}

#[test]
fn no_retooling_when_tools_repeat() {
    let json = r#"{
        "1": {
            "name": "Veg",
            "instructions": [
                {"action": "fry", "ingredients": "veg", "duration": 2},
                {"action": "serve", "ingredients": "veg"}
            ]
        }
    }"#;
    let catalog = RecipeCatalog::from_json(json, &registry()).unwrap();
    assert_eq!(catalog.get(1).unwrap().retooling_time, 0);
}

#[test]
fn missing_action_key_is_rejected() {
    let json = r#"{"1": {"name": "X", "instructions": [{"ingredients": "veg"}]}}"#;
    let err = RecipeCatalog::from_json(json, &registry()).unwrap_err();
    assert_eq!(err, RecipeError::MissingAction(1));
}

#[test]
fn unknown_action_is_rejected() {
    let json = r#"{"1": {"name": "X", "instructions": [{"action": "whisk", "ingredients": "x"}]}}"#;
    let err = RecipeCatalog::from_json(json, &registry()).unwrap_err();
    assert_eq!(err, RecipeError::UnknownAction("whisk".into()));
}

#[test]
fn autonomous_action_with_duration_is_rejected() {
    let json =
        r#"{"1": {"name": "X", "instructions": [{"action": "chop", "ingredients": "veg", "duration": 9}]}}"#;
    let err = RecipeCatalog::from_json(json, &registry()).unwrap_err();
    assert_eq!(
        err,
        RecipeError::AutonomousWithDuration { recipe_id: 1, action: "chop".into() }
    );
}

#[test]
fn recipe_timed_action_without_duration_is_rejected() {
    let json = r#"{"1": {"name": "X", "instructions": [{"action": "fry", "ingredients": "veg"}]}}"#;
    let err = RecipeCatalog::from_json(json, &registry()).unwrap_err();
    assert_eq!(
        err,
        RecipeError::RecipeTimedWithoutDuration { recipe_id: 1, action: "fry".into() }
    );
}

#[test]
fn missing_ingredients_is_rejected() {
    let json = r#"{"1": {"name": "X", "instructions": [{"action": "chop"}]}}"#;
    let err = RecipeCatalog::from_json(json, &registry()).unwrap_err();
    assert_eq!(
        err,
        RecipeError::MissingIngredients { recipe_id: 1, action: "chop".into() }
    );
}

#[test]
fn empty_instructions_is_rejected() {
    let json = r#"{"1": {"name": "X", "instructions": []}}"#;
    let err = RecipeCatalog::from_json(json, &registry()).unwrap_err();
    assert_eq!(err, RecipeError::Empty(1));
}

#[test]
fn random_id_always_picks_a_known_recipe() {
    let json = r#"{
        "1": {"name": "A", "instructions": [{"action": "chop", "ingredients": "veg"}]},
        "2": {"name": "B", "instructions": [{"action": "serve", "ingredients": "veg"}]}
    }"#;
    let catalog = RecipeCatalog::from_json(json, &registry()).unwrap();
    for _ in 0..20 {
        let id = catalog.random_id().unwrap();
        assert!(id == 1 || id == 2);
    }
}

#[test]
fn random_id_on_empty_catalog_is_none() {
    assert_eq!(RecipeCatalog::default().random_id(), None);
}
