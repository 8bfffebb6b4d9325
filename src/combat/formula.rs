//! Damage formula. Pure functions of the modifier table, the acting
//! character's stats and the enemy parameters.

use crate::combat::modifiers::{Modifier, ModifierTable};
use crate::combat::special_cases::NULLIFY_WEAPON;
use crate::data::classification::{Tag, TagSet};
use crate::data::team::{CharacterStats, RunSettings};

pub const EPSILON: f64 = 1e-9;

/// Resistance at and above which the diminishing branch applies.
pub const HIGH_RESISTANCE: f64 = 0.8;

/// `base * (1 + modifier) + flat`, the shape every scaled stat takes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatTotals {
    pub base: f64,
    pub modifier: f64,
    pub flat: f64,
}

impl StatTotals {
    pub fn compose(self) -> f64 {
        self.base * (1.0 + self.modifier) + self.flat
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalingStat {
    Attack,
    Health,
    Defense,
}

impl ScalingStat {
    pub fn for_tags(tags: &TagSet) -> ScalingStat {
        if tags.contains(Tag::DefenseScaling) {
            ScalingStat::Defense
        } else if tags.contains(Tag::HealthScaling) {
            ScalingStat::Health
        } else {
            ScalingStat::Attack
        }
    }
}

/// Enemy-side inputs shared by every damage event of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyProfile {
    pub level_cap: u32,
    pub enemy_level: f64,
    pub base_resistance: f64,
}

impl EnemyProfile {
    pub fn from_settings(settings: &RunSettings) -> Self {
        Self {
            level_cap: settings.level_cap,
            enemy_level: settings.enemy_level,
            base_resistance: settings.enemy_resistance,
        }
    }

    pub fn base_defense(&self) -> f64 {
        792.0 + 8.0 * self.enemy_level
    }
}

/// One damage event.
#[derive(Debug, Clone, Copy)]
pub struct DamageInputs<'a> {
    /// Base ratio after skill-level scaling and additive bonuses.
    pub ratio: f64,
    pub tags: &'a TagSet,
    pub character: &'a CharacterStats,
    pub table: &'a ModifierTable,
    pub enemy: EnemyProfile,
    /// Added to the combined damage multiplier.
    pub extra_multiplier: f64,
}

pub fn scaled_stat(stat: ScalingStat, character: &CharacterStats, table: &ModifierTable) -> f64 {
    let totals = match stat {
        ScalingStat::Attack => StatTotals {
            base: character.base_attack + character.weapon.attack,
            modifier: table.get(Modifier::Attack) + character.external.attack,
            flat: table.get(Modifier::FlatAttack),
        },
        ScalingStat::Health => StatTotals {
            base: character.base_health,
            modifier: table.get(Modifier::Health) + character.external.health,
            flat: table.get(Modifier::FlatHealth),
        },
        ScalingStat::Defense => StatTotals {
            base: character.base_defense,
            modifier: table.get(Modifier::Defense) + character.external.defense,
            flat: table.get(Modifier::FlatDefense),
        },
    };
    totals.compose()
}

pub fn crit_multiplier(character: &CharacterStats, table: &ModifierTable) -> f64 {
    let rate = (character.crit + table.get(Modifier::Crit)).clamp(0.0, 1.0);
    let damage = character.crit_dmg + table.get(Modifier::CritDmg);
    (1.0 - rate) + rate * damage
}

pub fn resistance_multiplier(resistance: f64) -> f64 {
    if resistance <= 0.0 {
        1.0 - resistance / 2.0
    } else if resistance < HIGH_RESISTANCE {
        1.0 - resistance
    } else {
        1.0 / (1.0 + 5.0 * resistance)
    }
}

pub fn defense_multiplier(enemy: &EnemyProfile, ignore_defense: f64) -> f64 {
    let level_term = 800.0 + 8.0 * f64::from(enemy.level_cap);
    level_term / (enemy.base_defense() * (1.0 - ignore_defense) + level_term)
}

/// Bonus, multiplier, deepen, resistance and defense terms combined.
pub fn damage_multiplier(tags: &TagSet, table: &ModifierTable, enemy: &EnemyProfile) -> f64 {
    let mut bonus = 1.0 + table.get(Modifier::Specific);
    let mut deepen = table.get(Modifier::Deepen);
    for modifier in tags.iter().filter_map(Modifier::for_tag) {
        bonus += table.get(modifier);
        if let Some(deepen_key) = modifier.deepen() {
            deepen += table.get(deepen_key);
        }
    }
    let resistance = enemy.base_resistance - table.get(Modifier::Resistance);
    bonus
        * (1.0 + table.get(Modifier::Multiplier))
        * (1.0 + deepen)
        * resistance_multiplier(resistance)
        * defense_multiplier(enemy, table.get(Modifier::IgnoreDefense))
}

pub fn compute_damage(inputs: &DamageInputs<'_>) -> f64 {
    if inputs.character.weapon.name == NULLIFY_WEAPON {
        return 0.0;
    }
    let scale = scaled_stat(ScalingStat::for_tags(inputs.tags), inputs.character, inputs.table);
    let multiplier = damage_multiplier(inputs.tags, inputs.table, &inputs.enemy) + inputs.extra_multiplier;
    inputs.ratio * scale * crit_multiplier(inputs.character, inputs.table) * multiplier
}
