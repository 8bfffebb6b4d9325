//! Decides whether a buff activates on the acting skill.
//!
//! A trigger is a comma-OR list of tokens. Evaluation stops at the first
//! matching token; tokens evaluated before it may still attach the buff to
//! passive damage sources declared this step.

use std::sync::Arc;

use crate::combat::buffs::{ActiveBuffInstance, BuffLedger};
use crate::combat::ledger::ResourceLedger;
use crate::combat::passive::PassiveDamageInstance;
use crate::combat::special_cases::activation_vetoed;
use crate::data::classification::Tag;
use crate::data::definitions::{
    BuffDefinition, BuffKind, EffectType, Scope, SkillDefinition, SpecialCondition, TriggerToken,
};

/// What the evaluator sees of the current step.
#[derive(Debug, Clone, Copy)]
pub struct StepView<'a> {
    pub skill: &'a SkillDefinition,
    pub active: &'a str,
    pub now: f64,
    /// A healing buff already activated this step.
    pub heal_found: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Activation {
    /// Gauge value read by a passing `Gauge>=value` gate.
    pub gate_value: Option<f64>,
}

pub fn evaluate(
    buff: &Arc<BuffDefinition>,
    view: StepView<'_>,
    ledger: &ResourceLedger,
    buffs: &BuffLedger,
    pending: &mut [PassiveDamageInstance],
) -> Option<Activation> {
    let gate_value = special_gate(buff, view, ledger, buffs)?;
    if let Some(filter) = &buff.filter {
        if !filter.matches(view.skill) {
            return None;
        }
    }

    let implicit;
    let tokens: &[TriggerToken] = if buff.trigger.is_blank() && buff.is_intro_or_outro() {
        implicit = [TriggerToken::Name(buff.name.clone())];
        &implicit
    } else {
        &buff.trigger.tokens
    };

    let matched = tokens
        .iter()
        .any(|token| token_matches(token, buff, view, buffs, pending));
    if !matched || activation_vetoed(&buff.name, view.skill) {
        return None;
    }
    Some(Activation { gate_value })
}

/// `None` blocks activation; `Some(value)` passes, carrying any gauge read.
fn special_gate(
    buff: &BuffDefinition,
    view: StepView<'_>,
    ledger: &ResourceLedger,
    buffs: &BuffLedger,
) -> Option<Option<f64>> {
    let special = match &buff.special {
        Some(SpecialCondition::OnCast) | None => return Some(None),
        Some(special) => special,
    };
    if !buff.can_activate.admits(view.active) {
        return Some(None);
    }
    match special {
        SpecialCondition::AtLeast {
            gauge: Some(gauge),
            value,
        } => {
            let current = ledger.get(view.active, *gauge);
            (current >= *value).then_some(Some(current))
        }
        SpecialCondition::BuffPresent(name) => {
            let scope = target_scope(buff);
            buffs
                .set(&scope, view.active)
                .iter()
                .any(|live| live.name() == name)
                .then_some(None)
        }
        _ => None,
    }
}

/// Buffs land on the team set or on the acting character.
pub fn target_scope(buff: &BuffDefinition) -> Scope {
    if buff.applies_to == Scope::Team {
        Scope::Team
    } else {
        Scope::Active
    }
}

fn token_matches(
    token: &TriggerToken,
    buff: &Arc<BuffDefinition>,
    view: StepView<'_>,
    buffs: &BuffLedger,
    pending: &mut [PassiveDamageInstance],
) -> bool {
    let skill = view.skill;
    match token {
        TriggerToken::Any => name_matches(&skill.name, buff, view, pending),
        TriggerToken::Name(name) if name.len() > 2 => name_matches(name, buff, view, pending),
        TriggerToken::Name(fragment) => {
            attach_by_code(fragment, buff, view, pending);
            skill.tags.to_code_string().contains(fragment.as_str())
                && buff.can_activate.admits(view.active)
        }
        TriggerToken::Swap => name_matches("Swap", buff, view, pending),
        TriggerToken::Code(tag) => {
            attach_by_code(&tag.code(), buff, view, pending);
            (skill.tags.contains(*tag) || (*tag == Tag::Heal && view.heal_found))
                && buff.can_activate.admits(view.active)
        }
        TriggerToken::Unconditional => {
            attach_by_code("", buff, view, pending);
            buff.can_activate.admits(view.active)
        }
        TriggerToken::BuffPresent(name) => {
            let scope_labels = buffs
                .personal(view.active)
                .iter()
                .chain(buffs.team())
                .map(ActiveBuffInstance::label);
            scope_labels.into_iter().any(|label| label.contains(name.as_str()))
        }
    }
}

fn name_matches(
    token: &str,
    buff: &Arc<BuffDefinition>,
    view: StepView<'_>,
    pending: &mut [PassiveDamageInstance],
) -> bool {
    let skill = view.skill;
    let owner_acting = skill.owner == view.active;
    attach_by_name(token, buff, view, pending);

    let applies = buff.applies_to.is_character(view.active)
        || matches!(buff.applies_to, Scope::Team | Scope::Active)
        || buff.is_intro_or_outro()
        || owner_acting;

    if token == "Swap" && !skill.name.starts_with("Intro") {
        if skill.cast_time == 0.0 || skill.name.contains("(Swap)") {
            return applies
                && (buff.can_activate.admits(view.active)
                    || (owner_acting && buff.is_intro_or_outro()));
        }
        return false;
    }

    (skill.name.contains(token) || token.contains(skill.name.as_str()))
        && applies
        && (buff.can_activate.admits(view.active)
            || (owner_acting && buff.applies_to == Scope::Next))
}

fn proc_copy(buff: &Arc<BuffDefinition>, now: f64) -> ActiveBuffInstance {
    if buff.kind == BuffKind::StackingBuff {
        ActiveBuffInstance::stacking(Arc::clone(buff), now, 1.0)
    } else {
        ActiveBuffInstance::new(Arc::clone(buff), now)
    }
}

fn attach_by_name(
    token: &str,
    buff: &Arc<BuffDefinition>,
    view: StepView<'_>,
    pending: &mut [PassiveDamageInstance],
) {
    let generic_passive = token == "Passive"
        && buff.stack_limit != 1.0
        && buff.effect != EffectType::TickOverTime
        && buff.can_activate != Scope::Active;
    for source in pending.iter_mut() {
        let named = source.name().contains(token) || token.contains(source.name());
        let allowed = buff.can_activate.is_character(&source.owner)
            || matches!(buff.can_activate, Scope::Team | Scope::Active);
        if (named || generic_passive) && allowed {
            source.attach(proc_copy(buff, view.now));
        }
    }
}

fn attach_by_code(
    code: &str,
    buff: &Arc<BuffDefinition>,
    view: StepView<'_>,
    pending: &mut [PassiveDamageInstance],
) {
    for source in pending.iter_mut() {
        if source.definition.classification.contains(code)
            && buff.can_activate.admits(&source.owner)
        {
            source.attach(proc_copy(buff, view.now));
        }
    }
}
