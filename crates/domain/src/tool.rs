// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The fixed set of tools a robot can hold.

use std::fmt;
use std::str::FromStr;

/// A tool a robot can equip. `current_tool`/`last_equipped_tool` on the wire
/// carry this as its `u32` discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RobotTool {
    Fryer,
    Pan,
    Pot,
    Peeler,
    Cutter,
    Crusher,
    Masher,
    Mixer,
    Stirrer,
    IngredientDispenser,
    LayeringDispenser,
    Oven,
    Whisk,
}

impl RobotTool {
    pub const ALL: [RobotTool; 13] = [
        Self::Fryer,
        Self::Pan,
        Self::Pot,
        Self::Peeler,
        Self::Cutter,
        Self::Crusher,
        Self::Masher,
        Self::Mixer,
        Self::Stirrer,
        Self::IngredientDispenser,
        Self::LayeringDispenser,
        Self::Oven,
        Self::Whisk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fryer => "FRYER",
            Self::Pan => "PAN",
            Self::Pot => "POT",
            Self::Peeler => "PEELER",
            Self::Cutter => "CUTTER",
            Self::Crusher => "CRUSHER",
            Self::Masher => "MASHER",
            Self::Mixer => "MIXER",
            Self::Stirrer => "STIRRER",
            Self::IngredientDispenser => "INGREDIENT_DISPENSER",
            Self::LayeringDispenser => "LAYERING_DISPENSER",
            Self::Oven => "OVEN",
            Self::Whisk => "WHISK",
        }
    }

    /// Discriminant used on the wire for `current_tool`/`last_equipped_tool`.
    pub fn as_u32(&self) -> u32 {
        match self {
            Self::Fryer => 0,
            Self::Pan => 1,
            Self::Pot => 2,
            Self::Peeler => 3,
            Self::Cutter => 4,
            Self::Crusher => 5,
            Self::Masher => 6,
            Self::Mixer => 7,
            Self::Stirrer => 8,
            Self::IngredientDispenser => 9,
            Self::LayeringDispenser => 10,
            Self::Oven => 11,
            Self::Whisk => 12,
        }
    }

    pub fn from_u32(n: u32) -> Option<Self> {
        Self::ALL.get(n as usize).copied()
    }
}

impl fmt::Display for RobotTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RobotTool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown robot tool {s:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_wire_discriminant() {
        for tool in RobotTool::ALL {
            assert_eq!(RobotTool::from_u32(tool.as_u32()), Some(tool));
        }
    }

    #[test]
    fn parses_from_display_name() {
        assert_eq!("WHISK".parse::<RobotTool>().unwrap(), RobotTool::Whisk);
        assert!("SPATULA".parse::<RobotTool>().is_err());
    }
}
