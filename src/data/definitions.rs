//! Typed, immutable definitions normalized from raw catalog records.

use serde::Serialize;

use crate::combat::modifiers::Modifier;
use crate::data::classification::{Tag, TagSet};
use crate::data::records::{BuffRecord, CellValue, CharacterRecord, EchoRecord, SkillRecord, WeaponRecord};
use crate::error::MalformedDefinition;

/// Duration given to buffs declared `Passive`.
pub const PERSISTENT_DURATION: f64 = 9999.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Gauge {
    Forte,
    Concerto,
    Resonance,
}

impl Gauge {
    pub const ALL: [Gauge; 3] = [Gauge::Forte, Gauge::Concerto, Gauge::Resonance];

    pub const fn name(self) -> &'static str {
        match self {
            Gauge::Forte => "Forte",
            Gauge::Concerto => "Concerto",
            Gauge::Resonance => "Resonance",
        }
    }

    pub fn from_name(name: &str) -> Option<Gauge> {
        Gauge::ALL.into_iter().find(|gauge| gauge.name() == name.trim())
    }
}

/// Gauge changes applied once per activation, in Forte, Concerto, Resonance
/// order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResourceDeltas {
    pub forte: f64,
    pub concerto: f64,
    pub resonance: f64,
}

impl ResourceDeltas {
    pub fn get(&self, gauge: Gauge) -> f64 {
        match gauge {
            Gauge::Forte => self.forte,
            Gauge::Concerto => self.concerto,
            Gauge::Resonance => self.resonance,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Gauge, f64)> + '_ {
        Gauge::ALL.into_iter().map(move |gauge| (gauge, self.get(gauge)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillDefinition {
    pub name: String,
    pub ratio: f64,
    pub cast_time: f64,
    pub freeze_time: f64,
    pub hits: u32,
    pub tags: TagSet,
    pub owner: String,
    pub deltas: ResourceDeltas,
    pub cooldown: f64,
    pub max_charges: u32,
}

impl SkillDefinition {
    pub fn from_record(record: &SkillRecord) -> Result<SkillDefinition, MalformedDefinition> {
        let malformed = |reason: String| MalformedDefinition::new("skill", &record.name, reason);
        if record.name.trim().is_empty() {
            return Err(malformed("missing name".into()));
        }
        let tags = TagSet::parse(&record.classification).map_err(malformed)?;
        let concerto = if record.name.starts_with("Outro") {
            -100.0
        } else {
            record.concerto
        };
        Ok(SkillDefinition {
            name: record.name.clone(),
            ratio: record.damage,
            cast_time: record.cast_time,
            freeze_time: record.freeze_time,
            hits: count(record.hits),
            tags,
            owner: record.owner.clone(),
            deltas: ResourceDeltas {
                forte: record.forte,
                concerto,
                resonance: record.resonance,
            },
            cooldown: record.cooldown,
            max_charges: record.max_charges.map(count).filter(|c| *c > 0).unwrap_or(1),
        })
    }

    /// An equipped echo acts as a skill owned by its wearer.
    pub fn from_echo(echo: &EchoDefinition, wearer: &str) -> SkillDefinition {
        SkillDefinition {
            name: echo.name.clone(),
            ratio: echo.ratio,
            cast_time: echo.cast_time,
            freeze_time: 0.0,
            hits: echo.hits,
            tags: echo.tags.clone(),
            owner: wearer.to_string(),
            deltas: ResourceDeltas {
                forte: 0.0,
                concerto: echo.concerto,
                resonance: echo.resonance,
            },
            cooldown: echo.cooldown,
            max_charges: 1,
        }
    }

    pub fn is_intro_or_outro(&self) -> bool {
        self.name.starts_with("Intro") || self.name.starts_with("Outro")
    }

    pub fn is_liberation(&self) -> bool {
        self.name.contains("Liberation") || self.tags.contains(Tag::Liberation)
    }

    /// Skills sharing a cooldown share the name before any `" ("` suffix.
    pub fn cooldown_key(&self) -> &str {
        self.name
            .split_once(" (")
            .map_or(self.name.as_str(), |(key, _)| key)
    }

    /// Time the acting character is busy, excluding hit-stop.
    pub fn active_time(&self) -> f64 {
        self.cast_time - self.freeze_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BuffKind {
    Buff,
    StackingBuff,
    BuffUntilSwap,
    ConsumeBuff,
    ConsumeBuffInstant,
    ResetBuff,
    DamageSource,
    EnergyGrant,
}

impl BuffKind {
    pub fn from_name(name: &str) -> Option<BuffKind> {
        match name.trim() {
            "Buff" => Some(BuffKind::Buff),
            "StackingBuff" => Some(BuffKind::StackingBuff),
            "BuffUntilSwap" => Some(BuffKind::BuffUntilSwap),
            "ConsumeBuff" => Some(BuffKind::ConsumeBuff),
            "ConsumeBuffInstant" => Some(BuffKind::ConsumeBuffInstant),
            "ResetBuff" => Some(BuffKind::ResetBuff),
            "Dmg" | "DamageSource" => Some(BuffKind::DamageSource),
            "BuffEnergy" | "EnergyGrant" => Some(BuffKind::EnergyGrant),
            _ => None,
        }
    }

    pub fn is_consume(self) -> bool {
        matches!(self, BuffKind::ConsumeBuff | BuffKind::ConsumeBuffInstant)
    }
}

/// Who a buff lands on, or who may activate it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Scope {
    Team,
    /// The next character swapped in.
    Next,
    /// Whoever is acting when the effect lands.
    Active,
    Character(String),
}

impl Scope {
    pub fn parse(raw: &str) -> Scope {
        match raw.trim() {
            "Team" => Scope::Team,
            "Next" => Scope::Next,
            "Active" => Scope::Active,
            name => Scope::Character(name.to_string()),
        }
    }

    pub fn is_character(&self, name: &str) -> bool {
        matches!(self, Scope::Character(character) if character == name)
    }

    /// `Team` or exactly `name`.
    pub fn admits(&self, name: &str) -> bool {
        matches!(self, Scope::Team) || self.is_character(name)
    }
}

/// The category a buff's amount feeds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum EffectType {
    /// A plain stat (`Attack`, `Crit Dmg`, `Flat Attack`, `Energy Regen`, ...).
    Stat(Modifier),
    Bonus,
    Deepen,
    Multiplier,
    Additive,
    Resistance,
    IgnoreDefense,
    /// Damage source that ticks on a fixed cadence once activated.
    TickOverTime,
    /// Energy grant target.
    Gauge(Gauge),
    /// No stat contribution.
    Plain,
}

impl EffectType {
    /// Parses `Type` or `Type*Gauge` (amount scaled by the acting character's
    /// gauge at aggregation time).
    pub fn parse(raw: &str) -> Result<(EffectType, Option<Gauge>), String> {
        let (base, scale) = match raw.split_once('*') {
            Some((base, gauge)) => {
                let gauge = Gauge::from_name(gauge)
                    .ok_or_else(|| format!("unknown scaling gauge '{gauge}'"))?;
                (base.trim(), Some(gauge))
            }
            None => (raw.trim(), None),
        };
        let effect = match base {
            "" => EffectType::Plain,
            "Bonus" => EffectType::Bonus,
            "Deepen" => EffectType::Deepen,
            "Multiplier" => EffectType::Multiplier,
            "Additive" => EffectType::Additive,
            "Resistance" => EffectType::Resistance,
            "Ignore Defense" => EffectType::IgnoreDefense,
            "TickOverTime" => EffectType::TickOverTime,
            other => {
                if let Some(gauge) = Gauge::from_name(other) {
                    EffectType::Gauge(gauge)
                } else if let Some(stat) = Modifier::from_name(other).filter(|m| m.is_stat()) {
                    EffectType::Stat(stat)
                } else {
                    return Err(format!("unknown effect type '{other}'"));
                }
            }
        };
        Ok((effect, scale))
    }
}

/// One comma-separated alternative of a trigger expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TriggerToken {
    /// Two-letter classification code.
    Code(Tag),
    /// Skill-name substring.
    Name(String),
    /// `Buff:<name>`: the named buff is currently active.
    BuffPresent(String),
    /// A swap-out action.
    Swap,
    /// Whatever skill is acting.
    Any,
    /// Blank token; matches every skill.
    Unconditional,
}

impl TriggerToken {
    pub fn parse(raw: &str) -> TriggerToken {
        let token = raw.trim();
        if token.is_empty() {
            return TriggerToken::Unconditional;
        }
        if let Some((_, name)) = token.split_once("Buff:") {
            return TriggerToken::BuffPresent(name.to_string());
        }
        match token {
            "Any" => TriggerToken::Any,
            "Swap" => TriggerToken::Swap,
            code if code.len() == 2 => match Tag::from_code(code) {
                Some(tag) => TriggerToken::Code(tag),
                None => TriggerToken::Name(code.to_string()),
            },
            name => TriggerToken::Name(name.to_string()),
        }
    }
}

/// A comma-OR list of trigger tokens.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerExpr {
    raw: String,
    pub tokens: Vec<TriggerToken>,
}

impl TriggerExpr {
    pub fn parse(raw: &str) -> TriggerExpr {
        TriggerExpr {
            raw: raw.to_string(),
            tokens: raw.split(',').map(TriggerToken::parse).collect(),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_blank(&self) -> bool {
        self.raw.trim().is_empty()
    }

    pub fn checks_buff_presence(&self) -> bool {
        self.raw.contains("Buff:")
    }
}

/// Gate evaluated before the trigger tokens.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SpecialCondition {
    /// `Gauge>=value`; also caps the stacks a stacking buff gains.
    AtLeast { gauge: Option<Gauge>, value: f64 },
    /// `Buff:<name>` present in the buff's target set.
    BuffPresent(String),
    /// Not a gate; the stacking buff gains exactly one stack per activation.
    OnCast,
    /// Unrecognized gate text; never passes.
    Unhandled(String),
}

impl SpecialCondition {
    pub fn parse(raw: &str) -> SpecialCondition {
        if raw.contains("OnCast") {
            return SpecialCondition::OnCast;
        }
        if let Some((key, value)) = raw.split_once(">=") {
            return match value.trim().parse::<f64>() {
                Ok(value) => SpecialCondition::AtLeast {
                    gauge: Gauge::from_name(key),
                    value,
                },
                Err(_) => SpecialCondition::Unhandled(raw.to_string()),
            };
        }
        if let Some((key, value)) = raw.split_once(':') {
            if key.contains("Buff") {
                return SpecialCondition::BuffPresent(value.to_string());
            }
        }
        SpecialCondition::Unhandled(raw.to_string())
    }
}

/// Secondary `&` filter: the acting skill must match at least one entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillFilter {
    entries: Vec<String>,
}

impl SkillFilter {
    pub fn parse(raw: &str) -> SkillFilter {
        SkillFilter {
            entries: raw.split(',').map(str::to_string).collect(),
        }
    }

    pub fn matches(&self, skill: &SkillDefinition) -> bool {
        self.entries.iter().any(|entry| {
            if entry.len() == 2 {
                skill.tags.contains_code(entry)
            } else {
                skill.name.contains(entry.as_str())
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BuffOrigin {
    Generic,
    Weapon,
    Echo,
}

impl BuffOrigin {
    pub const fn table(self) -> &'static str {
        match self {
            BuffOrigin::Generic => "buff",
            BuffOrigin::Weapon => "weapon buff",
            BuffOrigin::Echo => "echo buff",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuffDefinition {
    pub name: String,
    pub kind: BuffKind,
    /// Filter text: `All`, a classification code list, or a name fragment.
    /// Consume and reset kinds match buff names against it.
    pub classification: String,
    pub effect: EffectType,
    pub scale_by: Option<Gauge>,
    pub amount: f64,
    pub duration: f64,
    pub persistent: bool,
    pub trigger: TriggerExpr,
    /// Second half of a damage source's trigger (`activation;proc`).
    pub proc_trigger: Option<String>,
    pub special: Option<SpecialCondition>,
    pub filter: Option<SkillFilter>,
    pub stack_limit: f64,
    pub stack_interval: f64,
    pub applies_to: Scope,
    pub can_activate: Scope,
    pub deltas: ResourceDeltas,
    pub origin: BuffOrigin,
}

/// Context needed to resolve a record into a definition.
#[derive(Debug, Clone, Copy)]
pub struct BuffContext<'a> {
    pub origin: BuffOrigin,
    /// Zero-based weapon rank for slash-delimited values.
    pub rank: usize,
    /// The character carrying the weapon or echo.
    pub wielder: Option<&'a str>,
    /// Owner of a skill with the same name, if any.
    pub skill_owner: Option<&'a str>,
}

impl<'a> BuffContext<'a> {
    pub fn generic(skill_owner: Option<&'a str>) -> Self {
        Self {
            origin: BuffOrigin::Generic,
            rank: 0,
            wielder: None,
            skill_owner,
        }
    }
}

impl BuffDefinition {
    pub fn from_record(
        record: &BuffRecord,
        ctx: BuffContext<'_>,
    ) -> Result<BuffDefinition, MalformedDefinition> {
        let malformed =
            |reason: String| MalformedDefinition::new(ctx.origin.table(), &record.name, reason);
        if record.name.trim().is_empty() {
            return Err(malformed("missing name".into()));
        }
        let kind = BuffKind::from_name(&record.kind)
            .ok_or_else(|| malformed(format!("unknown kind '{}'", record.kind)))?;
        let (effect, scale_by) = match EffectType::parse(&record.effect) {
            Ok(parsed) => parsed,
            // damage sources only distinguish tick-over-time from everything else
            Err(_) if kind == BuffKind::DamageSource => (EffectType::Plain, None),
            Err(reason) => return Err(malformed(reason)),
        };

        let amount = record.amount.ranked(ctx.rank).map_err(malformed)?;
        let stack_limit = record.stack_limit.ranked(ctx.rank).map_err(malformed)?;
        let stack_interval = record.stack_interval.ranked(ctx.rank).map_err(malformed)?;
        let persistent = record.duration.is_passive()
            || (ctx.origin == BuffOrigin::Weapon
                && matches!(record.duration, CellValue::Number(value) if value == 0.0));
        let duration = if persistent {
            PERSISTENT_DURATION
        } else {
            record.duration.ranked(ctx.rank).map_err(malformed)?
        };

        let (activation, proc_trigger, special) = if kind == BuffKind::DamageSource {
            match record.trigger.split_once(';') {
                Some((activation, proc)) => (activation, Some(proc.to_string()), None),
                None => (record.trigger.as_str(), None, None),
            }
        } else {
            match record.trigger.split_once(';') {
                Some((activation, special)) => {
                    (activation, None, Some(SpecialCondition::parse(special)))
                }
                None => (record.trigger.as_str(), None, None),
            }
        };
        let (activation, filter) = match activation.split_once('&') {
            Some((trigger, filter)) => (trigger, Some(SkillFilter::parse(filter))),
            None => (activation, None),
        };

        let applies_to = match (record.applies_to.trim(), ctx.wielder) {
            ("Self", Some(wielder)) => Scope::Character(wielder.to_string()),
            (raw, _) => Scope::parse(raw),
        };
        let can_activate = match (ctx.wielder, ctx.skill_owner, record.can_activate.as_deref()) {
            (Some(wielder), _, _) => Scope::Character(wielder.to_string()),
            (None, Some(owner), _) => Scope::Character(owner.to_string()),
            (None, None, Some(raw)) if !raw.trim().is_empty() => Scope::parse(raw),
            _ => applies_to.clone(),
        };

        Ok(BuffDefinition {
            name: record.name.clone(),
            kind,
            classification: record.classification.clone(),
            effect,
            scale_by,
            amount,
            duration,
            persistent,
            trigger: TriggerExpr::parse(activation),
            proc_trigger,
            special,
            filter,
            stack_limit,
            stack_interval,
            applies_to,
            can_activate,
            deltas: ResourceDeltas {
                forte: record.forte,
                concerto: record.concerto,
                resonance: record.resonance,
            },
            origin: ctx.origin,
        })
    }

    /// Passive buffs are applied once before the first step.
    pub fn is_startup_passive(&self) -> bool {
        self.trigger.raw() == "Passive" && self.persistent && self.special.is_none()
    }

    pub fn is_intro_or_outro(&self) -> bool {
        self.name.contains("Intro") || self.name.contains("Outro")
    }

    /// Damage and heal effects are evaluated first, `Buff:` triggers last.
    pub fn evaluation_rank(&self) -> u8 {
        if self.kind == BuffKind::DamageSource || self.classification.contains("Hl") {
            0
        } else if self.trigger.checks_buff_presence() {
            2
        } else {
            1
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterConstant {
    pub name: String,
    pub base_health: f64,
    pub base_attack: f64,
    pub base_defense: f64,
    pub minor_fortes: [String; 2],
    pub element: String,
    pub max_forte: f64,
}

impl CharacterConstant {
    pub fn from_record(record: &CharacterRecord) -> Result<CharacterConstant, MalformedDefinition> {
        if record.name.trim().is_empty() {
            return Err(MalformedDefinition::new("character", "", "missing name"));
        }
        Ok(CharacterConstant {
            name: record.name.clone(),
            base_health: record.base_health,
            base_attack: record.base_attack,
            base_defense: record.base_defense,
            minor_fortes: [record.minor_forte_1.clone(), record.minor_forte_2.clone()],
            element: record.element.clone(),
            max_forte: record.max_forte,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeaponDefinition {
    pub name: String,
    pub weapon_type: String,
    pub base_attack: f64,
    pub main_stat: String,
    pub main_stat_amount: f64,
    pub buff: String,
}

impl WeaponDefinition {
    pub fn from_record(record: &WeaponRecord) -> Result<WeaponDefinition, MalformedDefinition> {
        if record.name.trim().is_empty() {
            return Err(MalformedDefinition::new("weapon", "", "missing name"));
        }
        Ok(WeaponDefinition {
            name: record.name.clone(),
            weapon_type: record.weapon_type.clone(),
            base_attack: record.base_attack,
            main_stat: record.main_stat.clone(),
            main_stat_amount: record.main_stat_amount,
            buff: record.buff.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EchoDefinition {
    pub name: String,
    pub ratio: f64,
    pub cast_time: f64,
    pub echo_set: String,
    pub tags: TagSet,
    pub hits: u32,
    pub has_buff: bool,
    pub cooldown: f64,
    pub concerto: f64,
    pub resonance: f64,
}

impl EchoDefinition {
    pub fn from_record(record: &EchoRecord) -> Result<EchoDefinition, MalformedDefinition> {
        let malformed = |reason: String| MalformedDefinition::new("echo", &record.name, reason);
        if record.name.trim().is_empty() {
            return Err(malformed("missing name".into()));
        }
        Ok(EchoDefinition {
            name: record.name.clone(),
            ratio: record.damage,
            cast_time: record.cast_time,
            echo_set: record.echo_set.clone(),
            tags: TagSet::parse(&record.classification).map_err(malformed)?,
            hits: count(record.hits),
            has_buff: record.has_buff,
            cooldown: record.cooldown,
            concerto: record.concerto,
            resonance: record.resonance,
        })
    }
}

fn count(raw: f64) -> u32 {
    if raw.is_finite() && raw > 0.0 {
        raw.round() as u32
    } else {
        0
    }
}
