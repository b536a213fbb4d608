// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `kitchen-domain`: the shared vocabulary of the cyber-physical kitchen
//! simulation — recipes, actions, capabilities, plates, and the other
//! domain types every agent crate builds on. Nothing in here depends on
//! gRPC, tokio, or any particular transport.

pub mod action;
pub mod capability;
pub mod clock;
pub mod counters;
pub mod order;
pub mod plate;
pub mod recipe;
pub mod remote;
pub mod tool;

pub use action::{Action, ActionCatalogError, ActionRegistry};
pub use capability::{CapabilityError, CapabilityProfile};
pub use counters::KitchenCounters;
pub use order::RobotOrder;
pub use plate::{Plate, PlateId, OUTPUT_POSITION};
pub use recipe::{Recipe, RecipeCatalog, RecipeError, RecipeId, RecipeStep};
pub use remote::RemoteRobotView;
pub use tool::RobotTool;
