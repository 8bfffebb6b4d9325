//! Live buff instances and the sets that hold them.
//!
//! Each character has a personal set; the team shares one. Two queues carry
//! instances across steps: the next-character queue (outros and `Next`
//! scoped buffs, delivered on the next swap) and the proc queue (buffs raised
//! by passive damage, delivered at the start of the next step).

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::combat::context::SimulationContext;
use crate::combat::special_cases::{effective_stack_interval, is_off_field};
use crate::data::definitions::{BuffDefinition, BuffKind, Scope};

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveBuffInstance {
    pub definition: Arc<BuffDefinition>,
    pub start_time: f64,
    /// Time of the last stack gain; stacking buffs expire from here.
    pub stack_time: f64,
    pub stacks: f64,
    /// Stacks gained by the activation that produced this instance.
    pub stacks_to_add: f64,
    /// Resolved landing scope.
    pub applies_to: Scope,
    pub available_in: f64,
}

impl ActiveBuffInstance {
    pub fn new(definition: Arc<BuffDefinition>, start_time: f64) -> Self {
        let applies_to = definition.applies_to.clone();
        Self {
            definition,
            start_time,
            stack_time: start_time,
            stacks: 0.0,
            stacks_to_add: 1.0,
            applies_to,
            available_in: 0.0,
        }
    }

    pub fn stacking(definition: Arc<BuffDefinition>, start_time: f64, stacks: f64) -> Self {
        Self {
            stacks,
            ..Self::new(definition, start_time)
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn is_stacking(&self) -> bool {
        self.definition.kind == BuffKind::StackingBuff
    }

    pub fn same_source(&self, other: &BuffDefinition) -> bool {
        self.definition.name == other.name && self.definition.trigger == other.trigger
    }

    pub fn end_time(&self) -> f64 {
        let anchor = if self.is_stacking() {
            self.stack_time
        } else {
            self.start_time
        };
        anchor + self.definition.duration
    }

    /// Clone with `Next`/`Active` bound to the character now acting.
    pub fn resolved_for(&self, active: &str) -> ActiveBuffInstance {
        let mut copy = self.clone();
        if matches!(copy.applies_to, Scope::Next | Scope::Active) {
            copy.applies_to = Scope::Character(active.to_string());
        }
        copy
    }

    pub fn label(&self) -> String {
        if self.is_stacking() {
            format!("{} x{}", self.name(), self.stacks)
        } else {
            self.name().to_string()
        }
    }

    /// Adds stacks if the minimum interval since the last gain has passed.
    pub fn gain_stacks(&mut self, now: f64, amount: f64, interval: f64) -> bool {
        if now - self.stack_time < interval {
            return false;
        }
        self.stacks = (self.stacks + amount).min(self.definition.stack_limit);
        self.stack_time = now;
        true
    }
}

/// What a prune removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PruneReport {
    pub expired: Vec<String>,
    /// Classification filters of expired reset buffs.
    pub reset_filters: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BuffLedger {
    personal: BTreeMap<String, Vec<ActiveBuffInstance>>,
    team: Vec<ActiveBuffInstance>,
    pub next_queue: Vec<ActiveBuffInstance>,
    pub proc_queue: Vec<ActiveBuffInstance>,
}

impl BuffLedger {
    pub fn new<'a>(members: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            personal: members
                .into_iter()
                .map(|name| (name.to_string(), Vec::new()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn personal(&self, character: &str) -> &[ActiveBuffInstance] {
        self.personal.get(character).map_or(&[], Vec::as_slice)
    }

    pub fn team(&self) -> &[ActiveBuffInstance] {
        &self.team
    }

    /// The set `scope` lands in when `active` is acting.
    pub fn set_mut(&mut self, scope: &Scope, active: &str) -> Option<&mut Vec<ActiveBuffInstance>> {
        match scope {
            Scope::Team => Some(&mut self.team),
            Scope::Character(name) => self.personal.get_mut(name),
            Scope::Next | Scope::Active => self.personal.get_mut(active),
        }
    }

    pub fn set(&self, scope: &Scope, active: &str) -> &[ActiveBuffInstance] {
        match scope {
            Scope::Team => &self.team,
            Scope::Character(name) => self.personal(name),
            Scope::Next | Scope::Active => self.personal(active),
        }
    }

    pub fn insert(&mut self, scope: &Scope, active: &str, instance: ActiveBuffInstance) {
        match self.set_mut(scope, active) {
            Some(set) => set.push(instance),
            None => debug!(buff = instance.name(), "buff target not in team; dropped"),
        }
    }

    /// Drops expired personal buffs of `character` (swap-bound ones on a
    /// swap, off-field ones always), then cascades expired reset buffs.
    pub fn prune_personal(&mut self, character: &str, now: f64, swapped: bool) -> PruneReport {
        let mut report = PruneReport::default();
        if let Some(set) = self.personal.get_mut(character) {
            prune(set, now, swapped, true, &mut report);
        }
        self.cascade_resets(character, &report.reset_filters);
        report
    }

    /// Team-wide swap-bound buffs end on any swap.
    pub fn prune_team(&mut self, now: f64, active: &str, swapped: bool) -> PruneReport {
        let mut report = PruneReport::default();
        prune(&mut self.team, now, swapped, false, &mut report);
        self.cascade_resets(active, &report.reset_filters);
        report
    }

    fn cascade_resets(&mut self, character: &str, filters: &[String]) {
        for filter in filters {
            self.remove_matching(character, filter);
        }
    }

    /// Removes buffs whose names contain `filter` from the character's
    /// personal set and from the team set.
    pub fn remove_matching(&mut self, character: &str, filter: &str) {
        if let Some(set) = self.personal.get_mut(character) {
            set.retain(|buff| !buff.name().contains(filter));
        }
        self.team.retain(|buff| !buff.name().contains(filter));
    }

    /// Delivers queued next-character buffs to `active`, anchored at `now`.
    pub fn flush_next_queue(&mut self, active: &str, now: f64, ctx: &SimulationContext) {
        let queued = std::mem::take(&mut self.next_queue);
        for queued in queued {
            let mut copy = queued.resolved_for(active);
            let interval =
                effective_stack_interval(copy.name(), copy.definition.stack_interval, ctx);
            let scope = copy.applies_to.clone();
            let Some(set) = self.set_mut(&scope, active) else {
                continue;
            };
            match set.iter_mut().find(|buff| buff.same_source(&copy.definition)) {
                Some(existing) if existing.is_stacking() => {
                    existing.gain_stacks(now, copy.stacks_to_add, interval);
                }
                Some(existing) => existing.start_time = now,
                None => {
                    copy.start_time = now;
                    copy.stack_time = now;
                    debug!(buff = copy.name(), character = active, "queued buff delivered");
                    set.push(copy);
                }
            }
        }
    }

    /// Delivers proc-raised buffs. Consume kinds are returned as removal
    /// filters instead of being inserted.
    pub fn flush_proc_queue(&mut self, active: &str, ctx: &SimulationContext) -> Vec<String> {
        let mut removals = Vec::new();
        let queued = std::mem::take(&mut self.proc_queue);
        for queued in queued {
            if queued.definition.kind.is_consume() {
                removals.push(queued.definition.classification.clone());
                continue;
            }
            let copy = queued.resolved_for(active);
            let interval =
                effective_stack_interval(copy.name(), copy.definition.stack_interval, ctx);
            let scope = copy.applies_to.clone();
            let Some(set) = self.set_mut(&scope, active) else {
                continue;
            };
            match set.iter_mut().find(|buff| buff.same_source(&copy.definition)) {
                Some(existing) if existing.is_stacking() => {
                    existing.gain_stacks(copy.stack_time, copy.stacks, interval);
                }
                Some(existing) => existing.start_time = existing.start_time.max(copy.start_time),
                None => set.push(copy),
            }
        }
        removals
    }

    /// `(N) a, b xK` for a set, `(0)` when empty.
    pub fn summary(set: &[ActiveBuffInstance]) -> String {
        if set.is_empty() {
            return "(0)".to_string();
        }
        let labels: Vec<String> = set.iter().map(ActiveBuffInstance::label).collect();
        format!("({}) {}", set.len(), labels.join(", "))
    }

    pub fn personal_summary(&self, character: &str) -> String {
        Self::summary(self.personal(character))
    }

    pub fn team_summary(&self) -> String {
        Self::summary(&self.team)
    }
}

fn prune(
    set: &mut Vec<ActiveBuffInstance>,
    now: f64,
    swapped: bool,
    drop_off_field: bool,
    report: &mut PruneReport,
) {
    set.retain(|buff| {
        if buff.definition.kind == BuffKind::BuffUntilSwap && swapped {
            report.expired.push(buff.name().to_string());
            return false;
        }
        if drop_off_field && is_off_field(buff.name()) {
            report.expired.push(buff.name().to_string());
            return false;
        }
        let keep = buff.definition.kind == BuffKind::BuffUntilSwap || now <= buff.end_time();
        if !keep {
            report.expired.push(buff.name().to_string());
            if buff.definition.kind == BuffKind::ResetBuff {
                report
                    .reset_filters
                    .push(buff.definition.classification.clone());
            }
        }
        keep
    });
}
