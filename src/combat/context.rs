//! Run-scoped state shared by the engine stages.

use std::collections::BTreeMap;

use crate::combat::modifiers::ModifierTable;
use crate::data::team::CharacterStats;

/// Opener until the first member uses an outro, loop afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum Phase {
    #[default]
    Opener,
    Loop,
}

#[derive(Debug, Clone, Default)]
pub struct SimulationContext {
    /// Raised by the outro flag skill, cleared when its outro buff expires.
    pub outro_flag: bool,
    /// Latest stack count of the tracked stacking buff.
    pub tracked_stacks: f64,
    /// Most recent aggregated table per character; passive sources re-snapshot
    /// from their owner's entry.
    pub last_known: BTreeMap<String, ModifierTable>,
    /// Next time each energy grant may fire, by buff name.
    pub energy_ready: BTreeMap<String, f64>,
    chains: BTreeMap<String, u32>,
    pub phase: Phase,
}

impl SimulationContext {
    pub fn new(members: &[CharacterStats]) -> Self {
        Self {
            chains: members
                .iter()
                .map(|member| (member.name.clone(), member.chain))
                .collect(),
            ..Self::default()
        }
    }

    pub fn chain(&self, character: &str) -> u32 {
        self.chains.get(character).copied().unwrap_or(0)
    }

    pub fn energy_ready_at(&self, buff: &str) -> f64 {
        self.energy_ready.get(buff).copied().unwrap_or(0.0)
    }
}
