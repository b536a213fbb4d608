// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional MAPE-K adaptation hook (spec §9: "Adaptive control"). Not part
//! of the specified core selection algorithm — the controller runs with
//! `strategy: None` unless a caller installs one via
//! [`ControllerService::with_strategy`], in which case every
//! `choose_next_robot` round consults it instead of [`crate::selection::find_suitable_robot`]
//! directly.

use kitchen_domain::{Recipe, RemoteRobotView};

/// What a [`Strategy`] wants to happen for one pending recipe.
#[derive(Debug, Clone, Default)]
pub struct StrategyDecision {
    /// The robot to hand the order to, if any (`None` drops the order the
    /// same way an empty `find_suitable_robot` result would).
    pub chosen: Option<(u32, String)>,
    /// Two ring positions the strategy wants the membership map to treat as
    /// swapped before the next round. Not wired to any live robot mutation —
    /// position is a robot-reported attribute, not something the controller
    /// can push — so this is surfaced for a future strategy to act on
    /// through a richer RPC, and is only logged for now.
    pub swap_request: Option<(u32, u32)>,
    /// A robot position and the capability list a strategy wants it
    /// reconfigured to. Same caveat as `swap_request`: no RPC exists yet for
    /// the controller to push a capability change to a robot.
    pub reconfigure_request: Option<(u32, Vec<String>)>,
}

/// A pluggable replacement for the §4.4 selection algorithm (spec §9).
pub trait Strategy: Send + Sync {
    fn on_new_order(
        &self,
        membership: &[RemoteRobotView],
        recipe: &Recipe,
        processed_steps: u32,
    ) -> StrategyDecision;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysDrop;

    impl Strategy for AlwaysDrop {
        fn on_new_order(&self, _: &[RemoteRobotView], _: &Recipe, _: u32) -> StrategyDecision {
            StrategyDecision::default()
        }
    }

    #[test]
    fn a_strategy_can_unconditionally_drop_an_order() {
        let recipe = Recipe {
            recipe_id: 1,
            dish_name: "Test".into(),
            actions: vec![],
            cooking_time: 0,
            retooling_time: 0,
        };
        let decision = AlwaysDrop.on_new_order(&[], &recipe, 0);
        assert!(decision.chosen.is_none());
    }
}
