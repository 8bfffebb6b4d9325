//! Skill cooldowns with charges.

use std::collections::BTreeMap;

use crate::data::definitions::SkillDefinition;

/// Shortfalls up to this many seconds become an inserted wait.
pub const SOFT_LIMIT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CooldownRecord {
    pub charges: u32,
    pub max_charges: u32,
    pub last_used: f64,
    pub next_valid: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CooldownOutcome {
    Ready,
    /// The skill is usable after waiting `wait` seconds.
    SoftWait { wait: f64, ready_at: f64 },
    /// The skill is used anyway and the step is marked illegal.
    Violation { ready_at: f64 },
}

impl CooldownOutcome {
    pub fn note(&self) -> Option<String> {
        match *self {
            CooldownOutcome::Ready => None,
            CooldownOutcome::SoftWait { wait, ready_at } => Some(format!(
                "This skill is on cooldown until {ready_at:.2}. A waiting time of {wait:.2} seconds was added to accommodate."
            )),
            CooldownOutcome::Violation { ready_at } => Some(format!(
                "Illegal rotation! This skill is on cooldown until {ready_at:.2}"
            )),
        }
    }
}

/// Records keyed by the skill's shared cooldown name.
#[derive(Debug, Clone, Default)]
pub struct CooldownTracker {
    records: BTreeMap<String, CooldownRecord>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, skill: &SkillDefinition) -> Option<&CooldownRecord> {
        self.records.get(skill.cooldown_key())
    }

    pub fn use_skill(&mut self, skill: &SkillDefinition, now: f64) -> CooldownOutcome {
        if skill.cooldown <= 0.0 {
            return CooldownOutcome::Ready;
        }
        let max_charges = skill.max_charges.max(1);
        let record = self
            .records
            .entry(skill.cooldown_key().to_string())
            .or_insert(CooldownRecord {
                charges: max_charges,
                max_charges,
                last_used: now,
                next_valid: now,
            });

        let elapsed = now - record.last_used;
        let restored = ((elapsed / skill.cooldown).floor().max(0.0) as u32).min(record.max_charges);
        if restored > 0 {
            record.charges = (record.charges + restored).min(record.max_charges);
            record.last_used += f64::from(restored) * skill.cooldown;
        }
        record.next_valid = record.last_used + skill.cooldown;

        if record.charges > 0 {
            if record.charges == record.max_charges {
                record.last_used = now;
            }
            record.charges -= 1;
            return CooldownOutcome::Ready;
        }

        let shortfall = record.next_valid - now;
        if shortfall <= SOFT_LIMIT {
            CooldownOutcome::SoftWait {
                wait: shortfall,
                ready_at: record.next_valid,
            }
        } else {
            CooldownOutcome::Violation {
                ready_at: record.next_valid,
            }
        }
    }
}
