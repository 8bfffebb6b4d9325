//! Builds the step's modifier table from stats and live buffs.

use tracing::debug;

use crate::combat::buffs::ActiveBuffInstance;
use crate::combat::context::SimulationContext;
use crate::combat::ledger::ResourceLedger;
use crate::combat::modifiers::{Modifier, ModifierTable, SkillBonusKind, ACTION_TYPES, ELEMENTS};
use crate::combat::special_cases::{off_field_nullified, TRACKED_STACK_BUFF};
use crate::data::classification::translate_code;
use crate::data::definitions::{BuffKind, EffectType, Gauge, SkillDefinition};
use crate::data::team::CharacterStats;

/// Cap used for additive entries whose buff declares no stack limit.
const UNCAPPED_ADDITIVE: f64 = 99_999.0;

/// Fresh table with the weapon main stat and the character's bonus list.
pub fn base_table(character: &CharacterStats) -> ModifierTable {
    let mut table = ModifierTable::new();
    if let Some(stat) = character.weapon.main_stat_modifier() {
        table.add(stat, character.weapon.main_stat_amount);
    }
    for (stat, value) in character.bonus.iter() {
        table.add(stat, value);
    }
    table
}

/// The acting skill and character a table is being built for.
#[derive(Debug, Clone, Copy)]
pub struct AggregationTarget<'a> {
    pub skill: &'a SkillDefinition,
    pub active: &'a str,
    pub now: f64,
}

/// Folds one set of live buffs into `table`. Energy grants fire here.
pub fn fold_buffs(
    table: &mut ModifierTable,
    set: &[ActiveBuffInstance],
    target: AggregationTarget<'_>,
    ctx: &mut SimulationContext,
    ledger: &mut ResourceLedger,
) {
    for instance in set {
        let buff = &instance.definition;
        if buff.name == TRACKED_STACK_BUFF {
            ctx.tracked_stacks = instance.stacks;
        }
        if buff.kind == BuffKind::EnergyGrant {
            grant_energy(instance, target, ctx, ledger);
            continue;
        }
        if off_field_nullified(&buff.name, &target.skill.name) {
            continue;
        }
        let stacking = buff.kind == BuffKind::StackingBuff;
        let amount = if stacking {
            buff.amount * instance.stacks
        } else {
            buff.amount
        };
        let scale = gauge_scale(ledger, target.active, buff.scale_by);
        match buff.effect {
            EffectType::Stat(stat) => {
                if stat_applies(&buff.classification, target.skill) {
                    table.add(stat, amount * scale);
                }
            }
            EffectType::Plain | EffectType::TickOverTime | EffectType::Gauge(_) => {}
            effect => apply_category_effect(
                table,
                &buff.classification,
                effect,
                amount * scale,
                buff.amount * buff.stack_limit,
                target.skill,
            ),
        }
    }
}

fn grant_energy(
    instance: &ActiveBuffInstance,
    target: AggregationTarget<'_>,
    ctx: &mut SimulationContext,
    ledger: &mut ResourceLedger,
) {
    let buff = &instance.definition;
    let EffectType::Gauge(gauge) = buff.effect else {
        return;
    };
    if target.now < ctx.energy_ready_at(&buff.name) {
        return;
    }
    ctx.energy_ready
        .insert(buff.name.clone(), target.now + buff.stack_interval);
    let amount = buff.amount * instance.stacks.max(1.0);
    debug!(buff = %buff.name, character = target.active, gauge = gauge.name(), amount, "energy granted");
    ledger.add_raw(target.active, gauge, amount);
}

/// Plain stats apply for `All`, a classification code of the skill, or a
/// fragment of the skill's name.
fn stat_applies(classification: &str, skill: &SkillDefinition) -> bool {
    classification == "All"
        || (classification.len() == 2 && skill.tags.contains_code(classification))
        || skill.name.contains(classification)
}

fn category_matches(category: &str, skill: &SkillDefinition) -> bool {
    if category.len() == 2 {
        skill.tags.contains_code(category)
    } else {
        skill.name.contains(category)
    }
}

pub fn apply_category_effect(
    table: &mut ModifierTable,
    classification: &str,
    effect: EffectType,
    amount: f64,
    cap: f64,
    skill: &SkillDefinition,
) {
    match (classification, effect) {
        ("All", EffectType::Bonus) => ACTION_TYPES.iter().for_each(|m| table.add(*m, amount)),
        ("All", EffectType::Deepen) => ACTION_TYPES
            .iter()
            .filter_map(|m| m.deepen())
            .for_each(|m| table.add(m, amount)),
        ("AllEle", EffectType::Bonus) => ELEMENTS.iter().for_each(|m| table.add(*m, amount)),
        ("All" | "AllEle", EffectType::Additive) => {}
        ("All" | "AllEle", effect) => {
            if let Some(global) = global_modifier(effect) {
                table.add(global, amount);
            }
        }
        (list, effect) => {
            for category in list.split(',').map(str::trim).filter(|c| !c.is_empty()) {
                apply_single(table, category, effect, amount, cap, skill);
            }
        }
    }
}

fn global_modifier(effect: EffectType) -> Option<Modifier> {
    match effect {
        EffectType::Bonus => Some(Modifier::Specific),
        EffectType::Deepen => Some(Modifier::Deepen),
        EffectType::Multiplier => Some(Modifier::Multiplier),
        EffectType::Resistance => Some(Modifier::Resistance),
        EffectType::IgnoreDefense => Some(Modifier::IgnoreDefense),
        _ => None,
    }
}

fn apply_single(
    table: &mut ModifierTable,
    category: &str,
    effect: EffectType,
    amount: f64,
    cap: f64,
    skill: &SkillDefinition,
) {
    let key = translate_code(category);
    let base_key = key.split(" (").next().unwrap_or(&key).to_string();
    let known = Modifier::from_name(&base_key);
    match effect {
        EffectType::Additive => {
            let cap = if cap > 0.0 { cap } else { UNCAPPED_ADDITIVE };
            let value = match table.skill_value(&base_key, SkillBonusKind::Additive) {
                Some(current) => (current + amount).min(cap),
                None => amount,
            };
            table.set_skill_value(&base_key, SkillBonusKind::Additive, value);
        }
        EffectType::Resistance | EffectType::IgnoreDefense => {
            if category_matches(category, skill) {
                if let Some(global) = global_modifier(effect) {
                    table.add(global, amount);
                }
            }
        }
        EffectType::Deepen if !known.is_some_and(Modifier::is_action_type) => {
            if category_matches(category, skill) {
                table.add(Modifier::Deepen, amount);
            }
        }
        _ => {
            let target = match (effect, known) {
                (EffectType::Deepen, Some(action)) => action.deepen(),
                (_, known) => known,
            };
            if let Some(existing) = target {
                table.add(existing, amount);
            } else if skill.name.contains(base_key.as_str()) {
                if let Some(global) = global_modifier(effect) {
                    table.add(global, amount);
                }
            } else {
                let kind = if effect == EffectType::Bonus {
                    SkillBonusKind::Specific
                } else {
                    SkillBonusKind::Multiplier
                };
                table.set_skill_value(&base_key, kind, amount);
            }
        }
    }
}

/// The 25 leading categories with the character's own attack, health,
/// defense and crit folded in.
pub fn step_snapshot(table: &ModifierTable, character: &CharacterStats) -> [f64; 25] {
    let mut values = table.snapshot();
    values[Modifier::Attack.index()] += character.external.attack;
    values[Modifier::Health.index()] += character.external.health;
    values[Modifier::Defense.index()] += character.external.defense;
    values[Modifier::Crit.index()] += character.crit;
    values[Modifier::CritDmg.index()] += character.crit_dmg;
    values
}

/// Current gauge value used for a `*Gauge` scaled amount.
pub fn gauge_scale(ledger: &ResourceLedger, active: &str, gauge: Option<Gauge>) -> f64 {
    gauge.map_or(1.0, |gauge| ledger.get(active, gauge))
}
