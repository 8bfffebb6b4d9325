//! Per-step trace rows and run-level aggregates.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::combat::context::Phase;
use crate::combat::formula::{compute_damage, DamageInputs};
use crate::combat::ledger::{GaugeValues, ResourceLedger};
use crate::combat::modifiers::{Modifier, SNAPSHOT_LEN};
use crate::data::classification::{Tag, TagSet};

/// Window the weighted throughput is normalized to.
pub const WEIGHTED_WINDOW: f64 = 120.0;

/// Perturbations used for stat sensitivity.
pub const SENSITIVITY_STEPS: [(&str, Modifier, f64); 10] = [
    ("Attack", Modifier::Attack, 0.086),
    ("Health", Modifier::Health, 0.086),
    ("Defense", Modifier::Defense, 0.109),
    ("Crit", Modifier::Crit, 0.081),
    ("Crit Dmg", Modifier::CritDmg, 0.162),
    ("Normal", Modifier::Normal, 0.086),
    ("Heavy", Modifier::Heavy, 0.086),
    ("Skill", Modifier::Skill, 0.086),
    ("Liberation", Modifier::Liberation, 0.086),
    ("Flat Attack", Modifier::FlatAttack, 40.0),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub character: String,
    pub skill: String,
    pub time: f64,
    pub cast_time: f64,
    /// Wait inserted before this step.
    pub wait: f64,
    pub personal_buffs: String,
    pub team_buffs: String,
    pub resonance: f64,
    pub concerto: f64,
    pub modifiers: Vec<f64>,
    pub damage: f64,
    pub annotation: Option<String>,
    /// Latest proc summary per passive source declared at this step.
    pub proc_notes: BTreeMap<String, String>,
    pub highlight: bool,
}

impl StepRecord {
    pub fn new(index: usize, character: &str, skill: &str, time: f64, cast_time: f64) -> Self {
        Self {
            index,
            character: character.to_string(),
            skill: skill.to_string(),
            time,
            cast_time,
            wait: 0.0,
            personal_buffs: String::new(),
            team_buffs: String::new(),
            resonance: 0.0,
            concerto: 0.0,
            modifiers: vec![0.0; SNAPSHOT_LEN],
            damage: 0.0,
            annotation: None,
            proc_notes: BTreeMap::new(),
            highlight: false,
        }
    }

    pub fn annotate(&mut self, note: impl Into<String>) {
        let note = note.into();
        self.annotation = Some(match self.annotation.take() {
            Some(existing) => format!("{existing}\n{note}"),
            None => note,
        });
    }

    /// Annotation followed by the proc summaries, one per line.
    pub fn full_annotation(&self) -> String {
        self.annotation
            .iter()
            .chain(self.proc_notes.values())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Damage by action category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DamageBreakdown {
    pub normal: f64,
    pub heavy: f64,
    pub skill: f64,
    pub liberation: f64,
    pub intro: f64,
    pub outro: f64,
    pub echo: f64,
}

impl DamageBreakdown {
    /// Intro/Outro-named actions credit only that category; otherwise every
    /// matching classification code is credited in order.
    pub fn credit(&mut self, name: &str, tags: &TagSet, damage: f64) {
        if name.contains("Intro") {
            self.intro += damage;
            return;
        }
        if name.contains("Outro") {
            self.outro += damage;
            return;
        }
        for tag in tags.iter() {
            let slot = match tag {
                Tag::Normal => &mut self.normal,
                Tag::Heavy => &mut self.heavy,
                Tag::Skill => &mut self.skill,
                Tag::Liberation => &mut self.liberation,
                Tag::Echo => &mut self.echo,
                Tag::Intro => {
                    self.intro += damage;
                    break;
                }
                Tag::Outro => {
                    self.outro += damage;
                    break;
                }
                _ => continue,
            };
            *slot += damage;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeReport {
    pub character: String,
    pub initial_deficit: GaugeValues,
    pub final_gauges: GaugeValues,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub opener_damage: f64,
    pub opener_time: f64,
    pub opener_dps: f64,
    pub loop_damage: f64,
    pub loop_time: f64,
    pub loop_dps: f64,
    pub final_time: f64,
    pub total_damage: f64,
    /// Opener plus as many loops as fit the 120-second window, per second.
    pub weighted_dps: f64,
    pub breakdown: DamageBreakdown,
    pub damage_by_character: BTreeMap<String, f64>,
    /// Normalized marginal gain per stat, per character.
    pub sensitivity: Option<BTreeMap<String, BTreeMap<String, f64>>>,
    pub gauges: Vec<GaugeReport>,
    pub skipped_definitions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub steps: Vec<StepRecord>,
    pub summary: RunSummary,
}

/// Collects damage events while a run is in progress.
#[derive(Debug, Clone, Default)]
pub struct RunAccumulator {
    pub opener_damage: f64,
    pub loop_damage: f64,
    pub breakdown: DamageBreakdown,
    pub by_character: BTreeMap<String, f64>,
    sensitivity: Option<BTreeMap<String, BTreeMap<String, f64>>>,
}

impl RunAccumulator {
    pub fn new(track_sensitivity: bool) -> Self {
        Self {
            sensitivity: track_sensitivity.then(BTreeMap::new),
            ..Self::default()
        }
    }

    /// Records `count` identical damage events of `per_event` each.
    pub fn credit(
        &mut self,
        name: &str,
        inputs: &DamageInputs<'_>,
        per_event: f64,
        count: u32,
        phase: Phase,
    ) {
        let character = inputs.character.name.clone();
        let damage = per_event * f64::from(count);
        match phase {
            Phase::Opener => self.opener_damage += damage,
            Phase::Loop => self.loop_damage += damage,
        }
        *self.by_character.entry(character.clone()).or_default() += damage;
        self.breakdown.credit(name, inputs.tags, damage);

        let Some(sensitivity) = self.sensitivity.as_mut() else {
            return;
        };
        if damage <= 0.0 {
            return;
        }
        let gains = sensitivity.entry(character).or_default();
        for (label, stat, step) in SENSITIVITY_STEPS {
            let mut table = inputs.table.clone();
            table.add(stat, step);
            let perturbed = DamageInputs {
                table: &table,
                ..*inputs
            };
            let gain = (compute_damage(&perturbed) - per_event) * f64::from(count);
            *gains.entry(label.to_string()).or_default() += gain;
        }
    }

    pub fn finish(
        self,
        steps: Vec<StepRecord>,
        opener_time: f64,
        ledger: &ResourceLedger,
        skipped_definitions: usize,
    ) -> RunReport {
        // the last step's start, not its end
        let final_time = steps.last().map_or(0.0, |step| step.time);
        let loop_time = final_time - opener_time;
        let opener_dps = if opener_time > 0.0 {
            self.opener_damage / opener_time
        } else {
            0.0
        };
        let loop_dps = if loop_time > 0.0 {
            self.loop_damage / loop_time
        } else {
            0.0
        };
        let loops = if loop_time > 0.0 {
            (WEIGHTED_WINDOW - opener_time) / loop_time
        } else {
            0.0
        };
        let weighted_dps = (self.opener_damage + self.loop_damage * loops) / WEIGHTED_WINDOW;

        let sensitivity = self.sensitivity.map(|mut all| {
            for (character, gains) in all.iter_mut() {
                let total = self.by_character.get(character).copied().unwrap_or(0.0);
                for gain in gains.values_mut() {
                    *gain = if total > 0.0 { *gain / total } else { 0.0 };
                }
            }
            all
        });
        let gauges = ledger
            .entries()
            .iter()
            .map(|entry| GaugeReport {
                character: entry.character.clone(),
                initial_deficit: entry.initial_deficit,
                final_gauges: entry.gauges,
            })
            .collect();

        RunReport {
            summary: RunSummary {
                opener_damage: self.opener_damage,
                opener_time,
                opener_dps,
                loop_damage: self.loop_damage,
                loop_time,
                loop_dps,
                final_time,
                total_damage: self.opener_damage + self.loop_damage,
                weighted_dps,
                breakdown: self.breakdown,
                damage_by_character: self.by_character,
                sensitivity,
                gauges,
                skipped_definitions,
            },
            steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_time_is_the_last_step_start() {
        let steps = vec![
            StepRecord::new(0, "Encore", "Basic Attack", 0.0, 1.0),
            StepRecord::new(1, "Encore", "Outro: Encore", 2.0, 1.0),
            StepRecord::new(2, "Sanhua", "Intro: Sanhua", 5.0, 3.0),
        ];
        let accumulator = RunAccumulator {
            opener_damage: 100.0,
            loop_damage: 30.0,
            ..RunAccumulator::default()
        };
        let report = accumulator.finish(steps, 2.0, &ResourceLedger::new(&[], false), 0);

        assert_eq!(report.summary.final_time, 5.0);
        assert_eq!(report.summary.loop_time, 3.0);
        assert_eq!(report.summary.loop_dps, 10.0);
        let loops = (WEIGHTED_WINDOW - 2.0) / 3.0;
        let expected = (100.0 + 30.0 * loops) / WEIGHTED_WINDOW;
        assert!((report.summary.weighted_dps - expected).abs() < 1e-9);
    }
}
