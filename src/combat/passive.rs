//! Passive damage sources: declared by a damage-source buff, then proc on
//! later skills that match their proc trigger.

use std::sync::Arc;

use tracing::debug;

use crate::combat::buffs::ActiveBuffInstance;
use crate::combat::context::SimulationContext;
use crate::combat::modifiers::{Modifier, ModifierTable, SkillBonusKind};
use crate::combat::special_cases::{
    effective_stack_interval, proc_stack_multiplier, snapshot_crit_dmg, ticks_immediately,
};
use crate::data::classification::{Tag, TagSet};
use crate::data::definitions::{BuffDefinition, EffectType, SkillDefinition};

/// Tolerance on the proc interval.
pub const PROC_EPSILON: f64 = 0.01;
/// Last-proc time of a source that has never procced.
pub const NEVER: f64 = -999.0;

#[derive(Debug, Clone)]
pub struct PassiveDamageInstance {
    pub definition: Arc<BuffDefinition>,
    pub tags: TagSet,
    pub owner: String,
    /// Step that declared the source; its damage is credited there.
    pub slot: usize,
    pub start_time: f64,
    pub last_proc: f64,
    pub proc_count: u32,
    pub snapshot: ModifierTable,
    pub proccable: Vec<ActiveBuffInstance>,
    pub activated: bool,
    pub total_damage: f64,
}

impl PassiveDamageInstance {
    pub fn declare(definition: Arc<BuffDefinition>, owner: &str, slot: usize, now: f64) -> Self {
        let last_proc = if definition.effect == EffectType::TickOverTime
            && !ticks_immediately(&definition.name)
        {
            now
        } else {
            NEVER
        };
        let tags = TagSet::parse(&definition.classification).unwrap_or_default();
        Self {
            tags,
            owner: owner.to_string(),
            slot,
            start_time: now,
            last_proc,
            proc_count: 0,
            snapshot: ModifierTable::new(),
            proccable: Vec::new(),
            activated: false,
            total_damage: 0.0,
            definition,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn is_tick(&self) -> bool {
        self.definition.effect == EffectType::TickOverTime
    }

    pub fn ratio(&self) -> f64 {
        self.definition.amount
    }

    pub fn limit(&self) -> f64 {
        self.definition.stack_limit
    }

    pub fn interval(&self) -> f64 {
        self.definition.stack_interval
    }

    pub fn attach(&mut self, buff: ActiveBuffInstance) {
        debug!(source = self.name(), buff = buff.name(), "proc buff attached");
        self.proccable.push(buff);
    }

    pub fn can_proc(&self, now: f64, cast_time: f64) -> bool {
        now + cast_time - self.last_proc >= self.interval() - PROC_EPSILON
    }

    pub fn matches_skill(&self, skill: &SkillDefinition) -> bool {
        let Some(trigger) = self.definition.proc_trigger.as_deref() else {
            return false;
        };
        if trigger.is_empty() {
            return false;
        }
        if (self.activated && self.is_tick()) || trigger == "Any" {
            return true;
        }
        trigger.split(',').map(str::trim).any(|token| match token.len() {
            0 => false,
            2 => skill.tags.contains_code(token),
            _ => skill.name.contains(token) || token.contains(skill.name.as_str()),
        })
    }

    /// Refreshes the snapshot from the owner's latest table, folding in
    /// entries scoped to this source.
    pub fn resnapshot(&mut self, latest: &ModifierTable, ctx: &SimulationContext) {
        let mut table = latest.clone();
        for modifier in [Modifier::Specific, Modifier::Deepen, Modifier::Multiplier] {
            table.set(modifier, 0.0);
        }
        for (name, kind, value) in latest.skill_entries() {
            match kind {
                SkillBonusKind::Specific if name.contains(self.name()) => {
                    table.add(Modifier::Specific, value);
                }
                SkillBonusKind::Multiplier if name.contains(self.name()) => {
                    table.add(Modifier::Multiplier, value);
                }
                SkillBonusKind::Deepen => {
                    let element = Tag::from_category_name(name);
                    if element.is_some_and(|tag| self.tags.contains(tag)) {
                        table.add(Modifier::Deepen, value);
                    }
                }
                _ => {}
            }
        }
        table.add(Modifier::CritDmg, snapshot_crit_dmg(self.name(), ctx));
        self.snapshot = table;
    }

    /// Counts procs for a skill and returns the proc-raised buffs to queue.
    pub fn handle_procs(
        &mut self,
        now: f64,
        skill: &SkillDefinition,
        ctx: &SimulationContext,
    ) -> (u32, Vec<ActiveBuffInstance>) {
        self.activated = true;
        let interval = self.interval();
        let active_time = skill.active_time();
        let mut procs: u32 = 0;
        if interval > 0.0 {
            if self.is_tick() {
                let mut tick = if self.last_proc < 0.0 {
                    now
                } else {
                    self.last_proc + interval
                };
                while tick <= now {
                    procs += 1;
                    self.last_proc = tick;
                    tick += interval;
                }
            } else {
                let spacing = active_time / f64::from(skill.hits.max(2) - 1);
                for hit in 0..skill.hits {
                    let hit_time = now + spacing * f64::from(hit);
                    if hit_time - self.last_proc >= interval {
                        procs += 1;
                        self.last_proc = hit_time;
                    }
                }
            }
        } else {
            procs = skill.hits;
        }
        if self.limit() > 0.0 {
            let remaining = (self.limit() - f64::from(self.proc_count)).max(0.0) as u32;
            procs = procs.min(remaining);
        }
        self.proc_count += procs;

        let mut raised = Vec::new();
        if procs > 0 {
            let trigger = self.definition.proc_trigger.as_deref().unwrap_or_default();
            for buff in &self.proccable {
                let mut copy = buff.clone();
                if copy.is_stacking() {
                    let definition = &copy.definition;
                    let interval =
                        effective_stack_interval(&definition.name, definition.stack_interval, ctx);
                    let mut gain = 1.0;
                    if interval < active_time {
                        let max = if interval == 0.0 {
                            f64::from(skill.hits)
                        } else {
                            (active_time / interval).floor()
                        };
                        gain = max.min(f64::from(skill.hits));
                    }
                    let multiplier = proc_stack_multiplier(&definition.name, trigger);
                    copy.stacks = (gain * multiplier).min(definition.stack_limit);
                }
                copy.stack_time = self.last_proc;
                copy.start_time = self.last_proc;
                raised.push(copy);
            }
        }
        (procs, raised)
    }

    pub fn can_remove(&self, now: f64, consume_filter: Option<&str>) -> bool {
        let limit = self.limit();
        (limit > 0.0 && f64::from(self.proc_count) >= limit)
            || now - self.start_time > self.definition.duration
            || consume_filter.is_some_and(|filter| self.name().contains(filter))
    }

    pub fn note(&self, procs: u32, damage: f64, ratio: f64) -> String {
        if self.limit() == 1.0 {
            format!(
                "This skill triggered an additional damage effect: {}, dealing {damage:.2} DMG (Base Ratio: {:.2}% x {ratio:.2}).",
                self.name(),
                self.ratio() * 100.0
            )
        } else if self.is_tick() {
            format!(
                "This skill triggered a passive DOT effect: {}, which has ticked {procs} times for {damage:.2} DMG in total (Base Ratio: {:.2}% x {ratio:.2}).",
                self.name(),
                self.ratio() * 100.0
            )
        } else {
            format!(
                "This skill triggered a passive damage effect: {}, which has procced {procs} times for {damage:.2} DMG in total (Base Ratio: {:.2}% x {ratio:.2}).",
                self.name(),
                self.ratio() * 100.0
            )
        }
    }
}

/// Live passive sources, at most one per name.
#[derive(Debug, Clone, Default)]
pub struct PassiveDamageRegistry {
    instances: Vec<PassiveDamageInstance>,
}

impl PassiveDamageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersedes any live source with the same name.
    pub fn register(&mut self, instance: PassiveDamageInstance) {
        self.instances.retain(|live| live.name() != instance.name());
        debug!(source = instance.name(), owner = %instance.owner, "passive source registered");
        self.instances.push(instance);
    }

    pub fn retain_live(&mut self, now: f64, consume_filter: Option<&str>) {
        self.instances.retain(|instance| !instance.can_remove(now, consume_filter));
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PassiveDamageInstance> {
        self.instances.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&PassiveDamageInstance> {
        self.instances.iter().find(|instance| instance.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::definitions::{BuffContext, ResourceDeltas};
    use crate::data::records::BuffRecord;

    fn source(name: &str, effect: &str, limit: f64, interval: f64) -> Arc<BuffDefinition> {
        let record = BuffRecord {
            name: name.into(),
            kind: "Dmg".into(),
            classification: "SkFu".into(),
            effect: effect.into(),
            amount: 0.5.into(),
            duration: 20.0.into(),
            trigger: format!("{name};No,Heavy"),
            stack_limit: limit.into(),
            stack_interval: interval.into(),
            applies_to: "Encore".into(),
            ..BuffRecord::default()
        };
        Arc::new(BuffDefinition::from_record(&record, BuffContext::generic(None)).unwrap())
    }

    fn skill(name: &str, tags: &str, hits: u32, cast_time: f64) -> SkillDefinition {
        SkillDefinition {
            name: name.into(),
            ratio: 1.0,
            cast_time,
            freeze_time: 0.0,
            hits,
            tags: TagSet::parse(tags).unwrap(),
            owner: "Encore".into(),
            deltas: ResourceDeltas::default(),
            cooldown: 0.0,
            max_charges: 1,
        }
    }

    #[test]
    fn proc_trigger_matches_codes_and_names() {
        let instance = PassiveDamageInstance::declare(source("Ember Burst", "", 0.0, 0.0), "Encore", 0, 0.0);
        assert!(instance.matches_skill(&skill("Basic Attack", "No", 1, 1.0)));
        assert!(instance.matches_skill(&skill("Heavy Attack", "He", 1, 1.0)));
        assert!(!instance.matches_skill(&skill("Resonance Skill: Flare", "Sk", 1, 1.0)));
    }

    #[test]
    fn hits_are_spaced_across_the_active_time() {
        let ctx = SimulationContext::default();
        let mut instance = PassiveDamageInstance::declare(source("Ember Burst", "", 0.0, 1.0), "Encore", 0, 0.0);
        let (procs, _) = instance.handle_procs(4.0, &skill("Basic Attack", "No", 3, 2.0), &ctx);
        assert_eq!(procs, 3);
        assert_eq!(instance.last_proc, 6.0);

        let mut sparse = PassiveDamageInstance::declare(source("Ember Burst", "", 0.0, 1.5), "Encore", 0, 0.0);
        let (procs, _) = sparse.handle_procs(4.0, &skill("Basic Attack", "No", 3, 2.0), &ctx);
        assert_eq!(procs, 2);
    }

    #[test]
    fn proc_budget_clamps_and_retires_the_source() {
        let ctx = SimulationContext::default();
        let mut instance = PassiveDamageInstance::declare(source("Ember Burst", "", 2.0, 0.0), "Encore", 0, 0.0);
        let basic = skill("Basic Attack", "No", 3, 1.0);
        assert_eq!(instance.handle_procs(1.0, &basic, &ctx).0, 2);
        assert_eq!(instance.handle_procs(2.0, &basic, &ctx).0, 0);
        assert_eq!(instance.proc_count, 2);
        assert!(instance.can_remove(2.0, None));
    }

    #[test]
    fn tick_sources_step_from_the_last_tick() {
        let ctx = SimulationContext::default();
        let mut instance =
            PassiveDamageInstance::declare(source("Smolder", "TickOverTime", 0.0, 2.0), "Encore", 0, 0.0);
        assert_eq!(instance.last_proc, 0.0);
        let basic = skill("Basic Attack", "No", 1, 1.0);

        assert_eq!(instance.handle_procs(5.0, &basic, &ctx).0, 2);
        assert_eq!(instance.last_proc, 4.0);
        assert_eq!(instance.handle_procs(6.0, &basic, &ctx).0, 1);
        assert!(instance.matches_skill(&skill("Resonance Skill: Flare", "Sk", 1, 1.0)));
    }

    #[test]
    fn raised_buffs_start_at_the_last_proc() {
        let ctx = SimulationContext::default();
        let mut instance = PassiveDamageInstance::declare(source("Ember Burst", "", 0.0, 1.0), "Encore", 0, 0.0);
        let record = BuffRecord {
            name: "Kindling".into(),
            kind: "Buff".into(),
            classification: "Fu".into(),
            effect: "Bonus".into(),
            amount: 0.1.into(),
            duration: 5.0.into(),
            applies_to: "Encore".into(),
            ..BuffRecord::default()
        };
        let kindling = BuffDefinition::from_record(&record, BuffContext::generic(None)).unwrap();
        instance.attach(ActiveBuffInstance::new(Arc::new(kindling), 0.0));

        let (_, raised) = instance.handle_procs(3.0, &skill("Basic Attack", "No", 2, 1.0), &ctx);
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].start_time, 4.0);
    }

    #[test]
    fn registering_a_name_supersedes_the_live_source() {
        let mut registry = PassiveDamageRegistry::new();
        registry.register(PassiveDamageInstance::declare(source("Ember Burst", "", 0.0, 0.0), "Encore", 0, 0.0));
        registry.register(PassiveDamageInstance::declare(source("Ember Burst", "", 0.0, 0.0), "Encore", 3, 2.0));
        registry.register(PassiveDamageInstance::declare(source("Smolder", "", 0.0, 0.0), "Encore", 4, 2.5));

        assert_eq!(registry.len(), 2);
        let ember = registry.get("Ember Burst").expect("latest source is live");
        assert_eq!(ember.slot, 3);
        assert_eq!(ember.start_time, 2.0);

        registry.retain_live(30.0, None);
        assert!(registry.is_empty());
    }
}
