//! Deterministic rotation-resolution engine for a three-member action RPG team.
//!
//! The crate loads a definition catalog (skills, buffs, weapons, echoes,
//! character constants), assembles a team from a setup file, and replays a
//! fixed rotation step by step while tracking buffs, resource gauges,
//! cooldowns and passive damage procs.

pub mod cli;
pub mod combat;
pub mod data;
pub mod error;
pub mod logging;
pub mod parallel;
pub mod server;
