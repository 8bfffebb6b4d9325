//! Per-character Forte, Concerto and Resonance gauges.

use serde::Serialize;
use tracing::debug;

use crate::combat::special_cases::{cost_effects, CostEffect};
use crate::data::definitions::Gauge;
use crate::data::team::CharacterStats;

/// Starting Resonance when a run begins with full gauges.
pub const FULL_RESONANCE: f64 = 200.0;
/// Share of a Resonance gain received by characters not acting.
pub const OFF_FIELD_SHARE: f64 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GaugeValues {
    pub forte: f64,
    pub concerto: f64,
    pub resonance: f64,
}

impl GaugeValues {
    pub fn get(&self, gauge: Gauge) -> f64 {
        match gauge {
            Gauge::Forte => self.forte,
            Gauge::Concerto => self.concerto,
            Gauge::Resonance => self.resonance,
        }
    }

    fn slot(&mut self, gauge: Gauge) -> &mut f64 {
        match gauge {
            Gauge::Forte => &mut self.forte,
            Gauge::Concerto => &mut self.concerto,
            Gauge::Resonance => &mut self.resonance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub character: String,
    pub gauges: GaugeValues,
    /// Largest shortfall seen per gauge.
    pub initial_deficit: GaugeValues,
    pub max_forte: f64,
    pub energy_regen: f64,
}

/// Who is paying and what is known about their buffs.
#[derive(Debug, Clone, Copy)]
pub struct DeltaSource<'a> {
    pub character: &'a str,
    pub action: &'a str,
    /// The acting character's personal buff summary.
    pub buff_summary: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaOutcome {
    pub note: Option<String>,
    pub illegal: bool,
    /// Specific bonus granted instead of paying the cost.
    pub specific_bonus: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceLedger {
    entries: Vec<LedgerEntry>,
}

impl ResourceLedger {
    pub fn new(members: &[CharacterStats], full_resonance: bool) -> Self {
        let resonance = if full_resonance { FULL_RESONANCE } else { 0.0 };
        Self {
            entries: members
                .iter()
                .map(|member| LedgerEntry {
                    character: member.name.clone(),
                    gauges: GaugeValues {
                        resonance,
                        ..GaugeValues::default()
                    },
                    initial_deficit: GaugeValues::default(),
                    max_forte: member.max_forte,
                    energy_regen: member.energy_regen(),
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn get(&self, character: &str, gauge: Gauge) -> f64 {
        self.entry(character).map_or(0.0, |entry| entry.gauges.get(gauge))
    }

    fn entry(&self, character: &str) -> Option<&LedgerEntry> {
        self.entries.iter().find(|entry| entry.character == character)
    }

    fn entry_mut(&mut self, character: &str) -> Option<&mut LedgerEntry> {
        self.entries.iter_mut().find(|entry| entry.character == character)
    }

    /// Adds without caps or sharing.
    pub fn add_raw(&mut self, character: &str, gauge: Gauge, amount: f64) {
        if let Some(entry) = self.entry_mut(character) {
            *entry.gauges.slot(gauge) += amount;
        }
    }

    /// Resonance gains land on every member, scaled by each member's energy
    /// regen and halved off-field.
    pub fn share_resonance(&mut self, active: &str, amount: f64) {
        for entry in &mut self.entries {
            let share = if entry.character == active {
                1.0
            } else {
                OFF_FIELD_SHARE
            };
            entry.gauges.resonance += amount * (1.0 + entry.energy_regen) * share;
        }
    }

    pub fn apply_delta(&mut self, gauge: Gauge, value: f64, source: DeltaSource<'_>) -> DeltaOutcome {
        if value == 0.0 {
            return DeltaOutcome::default();
        }
        if value > 0.0 {
            self.gain(source.character, gauge, value);
            return DeltaOutcome::default();
        }
        self.spend(gauge, -value, source)
    }

    fn gain(&mut self, character: &str, gauge: Gauge, value: f64) {
        match gauge {
            Gauge::Resonance => self.share_resonance(character, value),
            Gauge::Forte => {
                if let Some(entry) = self.entry_mut(character) {
                    entry.gauges.forte = (entry.gauges.forte + value).min(entry.max_forte);
                }
            }
            Gauge::Concerto => self.add_raw(character, gauge, value),
        }
    }

    fn spend(&mut self, gauge: Gauge, cost: f64, source: DeltaSource<'_>) -> DeltaOutcome {
        let effects = cost_effects(source.character, gauge, source.action, source.buff_summary);
        let Some(entry) = self.entry_mut(source.character) else {
            return DeltaOutcome::default();
        };
        let current = entry.gauges.get(gauge);
        let mut outcome = DeltaOutcome::default();

        if effects.contains(&CostEffect::Waive) {
            outcome.note = Some(format!(
                "An active buff covered the {cost} {} cost of this action",
                gauge.name()
            ));
            return outcome;
        }

        if current - cost < 0.0 {
            if gauge != Gauge::Resonance && effects.contains(&CostEffect::SilentDeficit) {
                debug!(character = source.character, gauge = gauge.name(), "shortfall ignored");
                return outcome;
            }
            outcome.illegal = true;
            let shortfall = cost - current;
            let recorded = entry.initial_deficit.slot(gauge);
            *recorded = recorded.max(shortfall);
            if gauge == Gauge::Resonance {
                let base = current / (1.0 + entry.energy_regen);
                let mut note = format!(
                    "Illegal rotation! At this point, you have {current:.2} out of the required {cost} Resonance"
                );
                if base > 0.0 {
                    let needed = (cost / base - entry.energy_regen - 1.0) * 100.0;
                    note.push_str(&format!(" (Requires an additional {needed:.1}% ERR)"));
                }
                outcome.note = Some(note);
            } else {
                outcome.note = Some(format!(
                    "Illegal rotation! At this point, you have {current:.2} out of the required {cost} {}",
                    gauge.name()
                ));
            }
            debug!(character = source.character, gauge = gauge.name(), shortfall, "resource deficit");
        } else {
            outcome.note = Some(format!(
                "At this point, you have generated {current:.2} out of the required {cost} {}",
                gauge.name()
            ));
        }

        let bonus = effects.iter().find_map(|effect| match effect {
            CostEffect::SpecificBonus(bonus) => Some(*bonus),
            _ => None,
        });
        let slot = entry.gauges.slot(gauge);
        if effects.contains(&CostEffect::ConsumeAll) {
            *slot = 0.0;
        } else if let Some(bonus) = bonus {
            outcome.specific_bonus = bonus;
        } else {
            *slot = (current - cost).max(0.0);
        }
        outcome
    }
}
