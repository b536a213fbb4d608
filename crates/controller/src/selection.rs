// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `find_suitable_robot` (spec §4.4): the Controller's robot-selection
//! algorithm, independent of transport so it can be unit-tested directly.

use kitchen_domain::{Recipe, RemoteRobotView};

/// How many of `recipe`'s remaining actions (starting at `processed_steps`)
/// `robot` could execute without another handover.
fn usable_prefix_len(recipe: &Recipe, processed_steps: u32, robot: &RemoteRobotView) -> u32 {
    recipe.actions[processed_steps as usize..]
        .iter()
        .take_while(|action| robot.is_capable_of(&action.name))
        .count() as u32
}

/// Select the best robot to continue `recipe` from `processed_steps`
/// (spec §4.4):
///
/// 1. The minimally-acceptable robot must be capable of the very next
///    action.
/// 2. Among capable robots, pick the one maximizing usable prefix length.
/// 3. Ties break by (a) lower `overall_time`, then (b) greater position.
/// 4. If no capable robot exists, return `None` — the caller replies with
///    `position=0, endpoint=""` and the order is dropped.
pub fn find_suitable_robot(
    recipe: &Recipe,
    processed_steps: u32,
    candidates: &[RemoteRobotView],
) -> Option<&RemoteRobotView> {
    let next_action = recipe.actions.get(processed_steps as usize)?;

    candidates
        .iter()
        .filter(|robot| robot.is_capable_of(&next_action.name))
        .max_by(|a, b| {
            let prefix_a = usable_prefix_len(recipe, processed_steps, a);
            let prefix_b = usable_prefix_len(recipe, processed_steps, b);
            prefix_a
                .cmp(&prefix_b)
                .then_with(|| b.overall_time.cmp(&a.overall_time))
                .then_with(|| a.position.cmp(&b.position))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kitchen_domain::RobotTool;

    fn recipe(steps: &[(&str, RobotTool)]) -> Recipe {
        Recipe {
            recipe_id: 1,
            dish_name: "Test".into(),
            actions: steps
                .iter()
                .map(|(name, tool)| kitchen_domain::RecipeStep {
                    name: name.to_string(),
                    tool: *tool,
                    ingredients: "x".into(),
                    duration: 1,
                })
                .collect(),
            cooking_time: steps.len() as u32,
            retooling_time: 0,
        }
    }

    fn robot(position: u32, caps: &[&str], overall_time: u32) -> RemoteRobotView {
        let mut view = RemoteRobotView::new(format!("http://r{position}"), position, caps.iter().map(|s| s.to_string()).collect());
        view.overall_time = overall_time;
        view
    }

    #[test]
    fn prefers_longer_usable_prefix() {
        let recipe = recipe(&[("chop", RobotTool::Cutter), ("fry", RobotTool::Pan), ("serve", RobotTool::Pan)]);
        let short = robot(1, &["chop"], 0);
        let long = robot(2, &["chop", "fry", "serve"], 0);
        let chosen = find_suitable_robot(&recipe, 0, &[short, long]).unwrap();
        assert_eq!(chosen.position, 2);
    }

    #[test]
    fn ties_break_on_lower_overall_time_then_higher_position() {
        let recipe = recipe(&[("chop", RobotTool::Cutter)]);
        let busy = robot(1, &["chop"], 10);
        let idle = robot(2, &["chop"], 0);
        let chosen = find_suitable_robot(&recipe, 0, &[busy, idle]).unwrap();
        assert_eq!(chosen.position, 2);

        let tied_a = robot(1, &["chop"], 5);
        let tied_b = robot(3, &["chop"], 5);
        let chosen = find_suitable_robot(&recipe, 0, &[tied_a, tied_b]).unwrap();
        assert_eq!(chosen.position, 3);
    }

    #[test]
    fn no_capable_robot_returns_none() {
        let recipe = recipe(&[("whisk", RobotTool::Whisk)]);
        let robot = robot(1, &["chop"], 0);
        assert!(find_suitable_robot(&recipe, 0, std::slice::from_ref(&robot)).is_none());
    }
}
