//! Named character and skill exceptions.
//!
//! Every hardcoded name rule lives in one of the tables below and is consulted
//! from a fixed extension point in the engine.

use crate::combat::context::SimulationContext;
use crate::data::classification::Tag;
use crate::data::definitions::{Gauge, SkillDefinition};

/// How a resource cost is settled for a matching action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CostEffect {
    /// The cost is covered by an active buff; nothing is consumed.
    Waive,
    /// The gauge is emptied instead of reduced by the cost.
    ConsumeAll,
    /// A shortfall is neither annotated nor recorded, and the gauge is left
    /// as it was.
    SilentDeficit,
    /// The gauge is left untouched and the action gains a damage bonus.
    SpecificBonus(f64),
}

#[derive(Debug, Clone, Copy)]
pub struct CostRule {
    pub character: Option<&'static str>,
    pub gauge: Option<Gauge>,
    pub skill_prefix: Option<&'static str>,
    pub skill_contains: Option<&'static str>,
    /// Substring that must appear in the character's active buff summary.
    pub buff_present: Option<&'static str>,
    pub effect: CostEffect,
}

impl CostRule {
    const fn any(effect: CostEffect) -> Self {
        Self {
            character: None,
            gauge: None,
            skill_prefix: None,
            skill_contains: None,
            buff_present: None,
            effect,
        }
    }

    fn matches(&self, character: &str, gauge: Gauge, skill: &str, buff_summary: &str) -> bool {
        self.character.map_or(true, |c| c == character)
            && self.gauge.map_or(true, |g| g == gauge)
            && self.skill_prefix.map_or(true, |p| skill.starts_with(p))
            && self.skill_contains.map_or(true, |s| skill.contains(s))
            && self.buff_present.map_or(true, |b| buff_summary.contains(b))
    }
}

pub const COST_RULES: [CostRule; 7] = [
    CostRule {
        character: Some("Jinhsi"),
        gauge: Some(Gauge::Concerto),
        buff_present: Some("Unison"),
        ..CostRule::any(CostEffect::Waive)
    },
    CostRule {
        character: Some("Jiyan"),
        skill_contains: Some("Windqueller"),
        ..CostRule::any(CostEffect::SilentDeficit)
    },
    CostRule {
        character: Some("Zhezhi"),
        skill_contains: Some("Depiction"),
        ..CostRule::any(CostEffect::SilentDeficit)
    },
    CostRule {
        character: Some("Danjin"),
        ..CostRule::any(CostEffect::ConsumeAll)
    },
    CostRule {
        skill_prefix: Some("Outro"),
        ..CostRule::any(CostEffect::ConsumeAll)
    },
    CostRule {
        skill_prefix: Some("Liberation"),
        ..CostRule::any(CostEffect::ConsumeAll)
    },
    CostRule {
        character: Some("Jiyan"),
        skill_contains: Some("Windqueller"),
        buff_present: Some("Qingloong Mode"),
        ..CostRule::any(CostEffect::SpecificBonus(0.2))
    },
];

pub fn cost_effects(
    character: &str,
    gauge: Gauge,
    skill: &str,
    buff_summary: &str,
) -> Vec<CostEffect> {
    COST_RULES
        .iter()
        .filter(|rule| rule.matches(character, gauge, skill, buff_summary))
        .map(|rule| rule.effect)
        .collect()
}

/// Extra crit rate assumed by the build allocator for a character at or above
/// a chain level.
pub const CONDITIONAL_CRIT: [(&str, u32, f64); 1] = [("Changli", 2, 0.25)];

pub fn conditional_crit(character: &str, chain: u32) -> Option<f64> {
    CONDITIONAL_CRIT
        .iter()
        .find(|(name, min_chain, _)| *name == character && chain >= *min_chain)
        .map(|(_, _, value)| *value)
}

/// Stack gain replaced outright when a buff is activated by a skill prefix.
pub const STACK_OVERRIDES: [(&str, &str, f64); 1] = [("Resolution", "Intro: Tactical Strike", 15.0)];

pub fn stack_override(buff: &str, skill: &str) -> Option<f64> {
    STACK_OVERRIDES
        .iter()
        .find(|(name, prefix, _)| *name == buff && skill.starts_with(prefix))
        .map(|(_, _, stacks)| *stacks)
}

/// Buff-name prefix whose stack interval shrinks while the outro flag is set.
pub const OUTRO_INTERVAL_PREFIX: &str = "Incandescence";
pub const OUTRO_INTERVAL: f64 = 1.0;
/// Skill whose use raises the outro flag, and the buff whose expiry clears it.
pub const OUTRO_FLAG_SKILL: &str = "Temporal Bender";
pub const OUTRO_FLAG_BUFF: &str = "Outro: Temporal Bender";

pub fn effective_stack_interval(buff: &str, interval: f64, ctx: &SimulationContext) -> f64 {
    if buff.starts_with(OUTRO_INTERVAL_PREFIX) && ctx.outro_flag {
        OUTRO_INTERVAL
    } else {
        interval
    }
}

pub fn raises_outro_flag(skill: &str) -> bool {
    skill.contains(OUTRO_FLAG_SKILL)
}

pub fn clears_outro_flag(expired_buff: &str) -> bool {
    expired_buff == OUTRO_FLAG_BUFF
}

/// Echo actions never activate these buffs.
pub fn activation_vetoed(buff: &str, skill: &SkillDefinition) -> bool {
    buff.starts_with(OUTRO_INTERVAL_PREFIX) && skill.tags.contains(Tag::Echo)
}

/// Proc-granted passive stacks are doubled for these buffs.
pub fn proc_stack_multiplier(buff: &str, trigger: &str) -> f64 {
    if trigger.contains("Passive") && buff.starts_with(OUTRO_INTERVAL_PREFIX) {
        2.0
    } else {
        1.0
    }
}

/// Buff whose stack count feeds a damage multiplier on another source.
pub const TRACKED_STACK_BUFF: &str = "Rythmic Vibrato";

/// Damage sources with a chain-gated crit damage bonus on their snapshot.
pub const SNAPSHOT_CRIT_DMG: [(&str, &str, u32, f64); 1] = [("Marcato", "Mortefi", 3, 0.3)];

pub fn snapshot_crit_dmg(source: &str, ctx: &SimulationContext) -> f64 {
    SNAPSHOT_CRIT_DMG
        .iter()
        .filter(|(name, character, min_chain, _)| {
            source.contains(name) && ctx.chain(character) >= *min_chain
        })
        .map(|(_, _, _, bonus)| bonus)
        .sum()
}

/// Extra damage multiplier per stack of [TRACKED_STACK_BUFF].
pub const TRACKED_STACK_MULTIPLIER: (&str, f64) = ("Marcato", 0.015);

pub fn extra_damage_multiplier(source: &str, ctx: &SimulationContext) -> f64 {
    let (name, per_stack) = TRACKED_STACK_MULTIPLIER;
    if source.contains(name) {
        ctx.tracked_stacks * per_stack
    } else {
        0.0
    }
}

/// Damage sources whose ratio ignores the skill-level multiplier.
pub const UNSCALED_PREFIXES: [&str; 1] = ["Jué"];

pub fn skill_level_exempt(source: &str) -> bool {
    UNSCALED_PREFIXES.iter().any(|prefix| source.starts_with(prefix))
}

/// Tick-over-time sources that tick as soon as they are declared.
pub const IMMEDIATE_TICK: [&str; 1] = ["Inklet"];

pub fn ticks_immediately(source: &str) -> bool {
    IMMEDIATE_TICK.iter().any(|name| source.contains(name))
}

/// Buffs with this marker only last for the step they land on and only count
/// for outro and swap actions.
pub const OFF_FIELD_MARKER: &str = "Off-Field";

pub fn is_off_field(buff: &str) -> bool {
    buff.contains(OFF_FIELD_MARKER)
}

pub fn off_field_nullified(buff: &str, skill: &str) -> bool {
    is_off_field(buff) && !skill.contains("Outro") && !skill.contains("Swap")
}

/// Weapon whose passive-proc owner loses its attack bonus while off-field.
pub const OFF_FIELD_WEAPON: &str = "Stringmaster";
/// Owner exempt from the penalty until this long after they last acted.
pub const OFF_FIELD_GRACE: (&str, f64) = ("Yinlin", 5.0);

/// Attack modifier applied to a passive proc while its owner is off-field.
/// `since_seen` is the time between the proc and the owner's last action.
pub fn off_field_attack_penalty(weapon: &str, owner: &str, rank_index: usize, since_seen: f64) -> f64 {
    if !weapon.contains(OFF_FIELD_WEAPON) {
        return 0.0;
    }
    let (exempt, grace) = OFF_FIELD_GRACE;
    if owner == exempt && since_seen <= grace {
        return 0.0;
    }
    -(0.12 + rank_index as f64 * 0.03) * 2.0
}

/// Weapon that deals no damage.
pub const NULLIFY_WEAPON: &str = "Nullify Damage";
