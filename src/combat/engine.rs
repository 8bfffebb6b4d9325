//! Rotation driver: replays a prepared rotation one step at a time.
//!
//! Each step runs, in order: swap wait, cooldown gate, personal prune,
//! next-character and proc queue delivery, team prune, the trigger scan,
//! instant consumes, aggregation, resource deltas, passive procs, primary
//! damage and deferred consumes.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::combat::aggregator::{base_table, fold_buffs, step_snapshot, AggregationTarget};
use crate::combat::buffs::{ActiveBuffInstance, BuffLedger, PruneReport};
use crate::combat::context::{Phase, SimulationContext};
use crate::combat::cooldown::{CooldownOutcome, CooldownTracker};
use crate::combat::formula::{compute_damage, DamageInputs, EnemyProfile};
use crate::combat::ledger::{DeltaOutcome, DeltaSource, ResourceLedger};
use crate::combat::modifiers::{Modifier, ModifierTable};
use crate::combat::passive::{PassiveDamageInstance, PassiveDamageRegistry};
use crate::combat::report::{RunAccumulator, RunReport, StepRecord};
use crate::combat::special_cases::{
    clears_outro_flag, effective_stack_interval, extra_damage_multiplier, off_field_attack_penalty,
    raises_outro_flag, skill_level_exempt, stack_override,
};
use crate::combat::trigger::{self, target_scope, Activation, StepView};
use crate::data::classification::Tag;
use crate::data::definitions::{
    BuffDefinition, BuffKind, Gauge, Scope, SkillDefinition, SpecialCondition,
};
use crate::data::team::{PreparedTeam, ScheduledEntry};

/// Minimum idle time before a swapped-in character may act.
pub const SWAP_WINDOW: f64 = 1.0;
/// Last-seen value after a liberation breaks swap timing.
const TIMING_RESET: f64 = -1.0;
pub const UNRESOLVED_NOTE: &str =
    "Unknown character or skill; this step was skipped and deals no damage";

pub fn run_rotation(team: &PreparedTeam) -> RunReport {
    RotationDriver::new(team).run()
}

/// Consumes and removals collected during the trigger scan.
#[derive(Debug, Default)]
struct StepEffects {
    heal_found: bool,
    instant_removals: Vec<String>,
    deferred_removal: Option<String>,
    declared: Vec<PassiveDamageInstance>,
}

pub struct RotationDriver<'a> {
    team: &'a PreparedTeam,
    enemy: EnemyProfile,
    ctx: SimulationContext,
    ledger: ResourceLedger,
    buffs: BuffLedger,
    cooldowns: CooldownTracker,
    passives: PassiveDamageRegistry,
    accumulator: RunAccumulator,
    steps: Vec<StepRecord>,
    last_seen: BTreeMap<String, f64>,
    bonus_time: f64,
    previous: Option<String>,
    opener_time: f64,
}

impl<'a> RotationDriver<'a> {
    pub fn new(team: &'a PreparedTeam) -> Self {
        let mut buffs = BuffLedger::new(team.members.iter().map(|member| member.name.as_str()));
        let first = team
            .members
            .first()
            .map(|member| member.name.as_str())
            .unwrap_or_default();
        for startup in &team.startup {
            let definition = Arc::clone(&startup.definition);
            let instance = if definition.kind == BuffKind::StackingBuff {
                ActiveBuffInstance::stacking(definition, 0.0, startup.stacks)
            } else {
                ActiveBuffInstance::new(definition, 0.0)
            };
            let scope = instance.applies_to.clone();
            buffs.insert(&scope, first, instance);
        }

        Self {
            team,
            enemy: EnemyProfile::from_settings(&team.settings),
            ctx: SimulationContext::new(&team.members),
            ledger: ResourceLedger::new(&team.members, team.settings.start_full_resonance),
            buffs,
            cooldowns: CooldownTracker::new(),
            passives: PassiveDamageRegistry::new(),
            accumulator: RunAccumulator::new(team.settings.stat_sensitivity),
            steps: Vec::with_capacity(team.rotation.len()),
            last_seen: BTreeMap::new(),
            bonus_time: 0.0,
            previous: None,
            opener_time: 0.0,
        }
    }

    pub fn run(mut self) -> RunReport {
        for (index, entry) in self.team.rotation.iter().enumerate() {
            self.step(index, entry);
        }
        let report = self.accumulator.finish(
            self.steps,
            self.opener_time,
            &self.ledger,
            self.team.malformed.len(),
        );
        info!(
            steps = report.steps.len(),
            total_damage = report.summary.total_damage,
            weighted_dps = report.summary.weighted_dps,
            "rotation resolved"
        );
        report
    }

    fn step(&mut self, index: usize, entry: &ScheduledEntry) {
        let team = self.team;
        let (Some(skill), Some(character)) =
            (team.skills.get(&entry.skill), team.member(&entry.character))
        else {
            warn!(
                index,
                character = %entry.character,
                skill = %entry.skill,
                "unresolved rotation entry skipped"
            );
            let mut record = StepRecord::new(
                index,
                &entry.character,
                &entry.skill,
                entry.time + self.bonus_time,
                0.0,
            );
            record.annotate(UNRESOLVED_NOTE);
            record.highlight = true;
            self.steps.push(record);
            return;
        };
        let active = character.name.as_str();
        let mut now = entry.time + self.bonus_time;
        let swapped = self.previous.as_deref().is_some_and(|prev| prev != active);
        let mut record = StepRecord::new(index, active, &skill.name, now, skill.cast_time);

        if swapped && !skill.is_intro_or_outro() {
            if let Some(seen) = self.last_seen.get(active) {
                let wait = SWAP_WINDOW - (now - seen);
                if wait > 0.0 {
                    self.insert_wait(&mut now, &mut record, wait);
                }
            }
        }
        if raises_outro_flag(&skill.name) {
            self.ctx.outro_flag = true;
        }

        let outcome = self.cooldowns.use_skill(skill, now);
        if let Some(note) = outcome.note() {
            record.annotate(note);
        }
        match outcome {
            CooldownOutcome::SoftWait { wait, .. } => self.insert_wait(&mut now, &mut record, wait),
            CooldownOutcome::Violation { ready_at } => {
                warn!(index, skill = %skill.name, ready_at, "skill used while on cooldown");
                record.highlight = true;
            }
            CooldownOutcome::Ready => {}
        }
        record.time = now;
        self.last_seen
            .insert(active.to_string(), now + skill.cast_time - skill.freeze_time);
        if skill.is_liberation() {
            self.last_seen.values_mut().for_each(|seen| *seen = TIMING_RESET);
        }

        let pruned = self.buffs.prune_personal(active, now, swapped);
        self.note_expiry(&pruned);
        if swapped {
            self.buffs.flush_next_queue(active, now, &self.ctx);
        }
        self.previous = Some(active.to_string());
        let mut effects = StepEffects {
            instant_removals: self.buffs.flush_proc_queue(active, &self.ctx),
            ..StepEffects::default()
        };
        let pruned = self.buffs.prune_team(now, active, swapped);
        self.note_expiry(&pruned);

        for buff in &team.buffs {
            let view = StepView {
                skill,
                active,
                now,
                heal_found: effects.heal_found,
            };
            let Some(activation) = trigger::evaluate(
                buff,
                view,
                &self.ledger,
                &self.buffs,
                &mut effects.declared,
            ) else {
                continue;
            };
            debug!(index, buff = %buff.name, character = active, "buff activated");
            if buff.classification.contains(Tag::Heal.code().as_str()) {
                effects.heal_found = true;
            }
            let multiplier = self.activate(buff, activation, skill, active, index, now, &mut effects);
            self.apply_deltas(buff.deltas.iter(), multiplier, active, &skill.name, &mut record, None);
        }

        for filter in &effects.instant_removals {
            self.buffs.remove_matching(active, filter);
        }
        record.personal_buffs = self.buffs.personal_summary(active);
        record.team_buffs = self.buffs.team_summary();

        let target = AggregationTarget { skill, active, now };
        let mut table = base_table(character);
        fold_buffs(
            &mut table,
            self.buffs.personal(active),
            target,
            &mut self.ctx,
            &mut self.ledger,
        );
        for mut declared in effects.declared.drain(..) {
            declared.resnapshot(&table, &self.ctx);
            self.passives.register(declared);
        }
        fold_buffs(
            &mut table,
            self.buffs.team(),
            target,
            &mut self.ctx,
            &mut self.ledger,
        );
        self.ctx.last_known.insert(active.to_string(), table.clone());
        record.modifiers = step_snapshot(&table, character).to_vec();
        self.passives
            .retain_live(now, effects.deferred_removal.as_deref());

        self.apply_deltas(
            skill.deltas.iter(),
            1.0,
            active,
            &skill.name,
            &mut record,
            Some(&mut table),
        );

        if skill.ratio > 0.0 {
            self.resolve_procs(index, skill, active, now, &mut record);
        }
        record.resonance = self.ledger.get(active, Gauge::Resonance);
        record.concerto = self.ledger.get(active, Gauge::Concerto);

        let level_scale = if skill.tags.contains(Tag::Echo) {
            1.0
        } else {
            team.settings.skill_level_multiplier
        };
        let inputs = DamageInputs {
            ratio: skill.ratio * level_scale + table.additive_for(&skill.name),
            tags: &skill.tags,
            character,
            table: &table,
            enemy: self.enemy,
            extra_multiplier: 0.0,
        };
        let damage = compute_damage(&inputs);
        record.damage += damage;
        self.accumulator
            .credit(&skill.name, &inputs, damage, 1, self.ctx.phase);

        let opens_loop = team
            .members
            .first()
            .is_some_and(|first| first.name == active)
            && skill.name.starts_with("Outro");
        if self.ctx.phase == Phase::Opener && opens_loop {
            self.ctx.phase = Phase::Loop;
            self.opener_time = now;
            debug!(index, time = now, "opener complete");
        }

        if let Some(filter) = &effects.deferred_removal {
            self.buffs.remove_matching(active, filter);
        }
        self.steps.push(record);
    }

    fn insert_wait(&mut self, now: &mut f64, record: &mut StepRecord, wait: f64) {
        self.bonus_time += wait;
        *now += wait;
        record.wait += wait;
    }

    fn note_expiry(&mut self, report: &PruneReport) {
        if report.expired.iter().any(|name| clears_outro_flag(name)) {
            self.ctx.outro_flag = false;
        }
    }

    /// Applies one activation and returns the multiplier for its deltas.
    #[allow(clippy::too_many_arguments)]
    fn activate(
        &mut self,
        buff: &Arc<BuffDefinition>,
        activation: Activation,
        skill: &SkillDefinition,
        active: &str,
        index: usize,
        now: f64,
        effects: &mut StepEffects,
    ) -> f64 {
        let scope = target_scope(buff);
        match buff.kind {
            BuffKind::ConsumeBuffInstant => {
                effects.instant_removals.push(buff.classification.clone());
                1.0
            }
            BuffKind::ConsumeBuff => {
                effects.deferred_removal = Some(buff.classification.clone());
                1.0
            }
            BuffKind::ResetBuff => {
                let present = self
                    .buffs
                    .personal(active)
                    .iter()
                    .chain(self.buffs.team())
                    .any(|live| live.name() == buff.name);
                if !present {
                    self.buffs
                        .insert(&scope, active, ActiveBuffInstance::new(Arc::clone(buff), now));
                }
                1.0
            }
            BuffKind::DamageSource => {
                effects.declared.push(PassiveDamageInstance::declare(
                    Arc::clone(buff),
                    active,
                    index,
                    now,
                ));
                1.0
            }
            BuffKind::StackingBuff => {
                let interval = effective_stack_interval(&buff.name, buff.stack_interval, &self.ctx);
                let gain = stack_gain(buff, activation, skill, interval);
                let Some(set) = self.buffs.set_mut(&scope, active) else {
                    return gain;
                };
                match set.iter_mut().find(|live| live.same_source(buff)) {
                    Some(existing) => {
                        existing.gain_stacks(now, gain, interval);
                    }
                    None => {
                        let mut instance = ActiveBuffInstance::stacking(
                            Arc::clone(buff),
                            now,
                            gain.min(buff.stack_limit),
                        );
                        instance.stacks_to_add = gain;
                        set.push(instance);
                    }
                }
                gain
            }
            BuffKind::Buff | BuffKind::BuffUntilSwap | BuffKind::EnergyGrant => {
                if buff.name.contains("Outro") || buff.applies_to == Scope::Next {
                    self.buffs
                        .next_queue
                        .push(ActiveBuffInstance::new(Arc::clone(buff), now));
                    return 1.0;
                }
                let start = now + skill.cast_time;
                let Some(set) = self.buffs.set_mut(&scope, active) else {
                    return 1.0;
                };
                match set.iter_mut().find(|live| live.same_source(buff)) {
                    Some(existing) => existing.start_time = start,
                    None => {
                        let mut instance = ActiveBuffInstance::new(Arc::clone(buff), start);
                        if buff.kind != BuffKind::EnergyGrant {
                            instance.available_in = now + buff.stack_interval;
                        }
                        set.push(instance);
                    }
                }
                1.0
            }
        }
    }

    fn apply_deltas(
        &mut self,
        deltas: impl Iterator<Item = (Gauge, f64)>,
        multiplier: f64,
        active: &str,
        action: &str,
        record: &mut StepRecord,
        mut table: Option<&mut ModifierTable>,
    ) {
        let summary = self.buffs.personal_summary(active);
        for (gauge, value) in deltas {
            let outcome: DeltaOutcome = self.ledger.apply_delta(
                gauge,
                value * multiplier,
                DeltaSource {
                    character: active,
                    action,
                    buff_summary: &summary,
                },
            );
            if let Some(note) = outcome.note {
                record.annotate(note);
            }
            if outcome.illegal {
                warn!(character = active, action, gauge = gauge.name(), "resource deficit");
                record.highlight = true;
            }
            if let Some(table) = table.as_deref_mut() {
                table.add(Modifier::Specific, outcome.specific_bonus);
            }
        }
    }

    fn resolve_procs(
        &mut self,
        index: usize,
        skill: &SkillDefinition,
        active: &str,
        now: f64,
        record: &mut StepRecord,
    ) {
        let team = self.team;
        for source in self.passives.iter_mut() {
            if !(source.can_proc(now, skill.cast_time) && source.matches_skill(skill)) {
                continue;
            }
            if let Some(latest) = self.ctx.last_known.get(&source.owner) {
                source.resnapshot(latest, &self.ctx);
            }
            let (procs, raised) = source.handle_procs(now, skill, &self.ctx);
            self.buffs.proc_queue.extend(raised);
            if procs == 0 {
                continue;
            }

            let summary = self.buffs.personal_summary(active);
            for (gauge, value) in source.definition.deltas.iter().filter(|(_, v)| *v > 0.0) {
                self.ledger.apply_delta(
                    gauge,
                    value * f64::from(procs),
                    DeltaSource {
                        character: active,
                        action: &skill.name,
                        buff_summary: &summary,
                    },
                );
            }

            let Some(owner) = team.member(&source.owner) else {
                continue;
            };
            let level_scale = if skill_level_exempt(source.name()) {
                1.0
            } else {
                team.settings.skill_level_multiplier
            };
            let ratio = source.ratio() * level_scale + source.snapshot.additive_for(source.name());
            let mut table = source.snapshot.clone();
            if active != source.owner {
                let since_seen = self
                    .last_seen
                    .get(&source.owner)
                    .map_or(f64::INFINITY, |seen| source.last_proc - seen);
                table.add(
                    Modifier::Attack,
                    off_field_attack_penalty(
                        &owner.weapon.name,
                        &owner.name,
                        owner.weapon.rank_index,
                        since_seen,
                    ),
                );
            }
            let inputs = DamageInputs {
                ratio,
                tags: &source.tags,
                character: owner,
                table: &table,
                enemy: self.enemy,
                extra_multiplier: extra_damage_multiplier(source.name(), &self.ctx),
            };
            let per_proc = compute_damage(&inputs);
            let total = per_proc * f64::from(procs);
            source.total_damage += total;
            self.accumulator
                .credit(source.name(), &inputs, per_proc, procs, self.ctx.phase);

            let note = source.note(source.proc_count, source.total_damage, ratio);
            debug!(index, source = source.name(), procs, damage = total, "passive proc");
            let slot = if source.slot == index {
                &mut *record
            } else {
                match self.steps.get_mut(source.slot) {
                    Some(slot) => slot,
                    None => continue,
                }
            };
            slot.damage += total;
            slot.proc_notes.insert(source.name().to_string(), note);
            slot.highlight = true;
        }
    }
}

fn stack_gain(
    buff: &BuffDefinition,
    activation: Activation,
    skill: &SkillDefinition,
    interval: f64,
) -> f64 {
    let active_time = skill.active_time();
    let hits = f64::from(skill.hits);
    let mut gain = 1.0;
    if interval < active_time {
        let max = if interval == 0.0 {
            hits
        } else {
            (active_time / interval).floor()
        };
        gain = max.min(hits);
    }
    if buff.special == Some(SpecialCondition::OnCast) {
        gain = 1.0;
    }
    if let Some(stacks) = stack_override(&buff.name, &skill.name) {
        gain = stacks;
    }
    if let Some(cap) = activation.gate_value.filter(|value| *value > 0.0) {
        gain = gain.min(cap);
    }
    gain
}

/// Share of the total damage dealt by each named member.
pub fn damage_share<S: AsRef<str>>(report: &RunReport, members: &[S]) -> Vec<(String, f64)> {
    let total = report.summary.total_damage;
    members
        .iter()
        .map(|member| {
            let name = member.as_ref();
            let damage = report
                .summary
                .damage_by_character
                .get(name)
                .copied()
                .unwrap_or(0.0);
            let share = if total > 0.0 { damage / total } else { 0.0 };
            (name.to_string(), share)
        })
        .collect()
}
