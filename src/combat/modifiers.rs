//! Step-scoped modifier table.
//!
//! Every recognized category is a [Modifier] variant; meta-categories
//! (`All`, `AllEle`) expand through fixed tables, and bonuses scoped to a
//! named skill live under a structured `(name, SkillBonusKind)` key.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::data::classification::Tag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Modifier {
    Attack,
    Health,
    Defense,
    Crit,
    CritDmg,
    Normal,
    Heavy,
    Skill,
    Liberation,
    NormalDeepen,
    HeavyDeepen,
    SkillDeepen,
    LiberationDeepen,
    Physical,
    Glacio,
    Fusion,
    Electro,
    Aero,
    Spectro,
    Havoc,
    Specific,
    Deepen,
    Multiplier,
    Resistance,
    IgnoreDefense,
    FlatAttack,
    FlatHealth,
    FlatDefense,
    EnergyRegen,
}

pub const MODIFIER_COUNT: usize = 29;

/// Number of leading categories exposed in per-step snapshots.
pub const SNAPSHOT_LEN: usize = 25;

pub const ALL_MODIFIERS: [Modifier; MODIFIER_COUNT] = [
    Modifier::Attack,
    Modifier::Health,
    Modifier::Defense,
    Modifier::Crit,
    Modifier::CritDmg,
    Modifier::Normal,
    Modifier::Heavy,
    Modifier::Skill,
    Modifier::Liberation,
    Modifier::NormalDeepen,
    Modifier::HeavyDeepen,
    Modifier::SkillDeepen,
    Modifier::LiberationDeepen,
    Modifier::Physical,
    Modifier::Glacio,
    Modifier::Fusion,
    Modifier::Electro,
    Modifier::Aero,
    Modifier::Spectro,
    Modifier::Havoc,
    Modifier::Specific,
    Modifier::Deepen,
    Modifier::Multiplier,
    Modifier::Resistance,
    Modifier::IgnoreDefense,
    Modifier::FlatAttack,
    Modifier::FlatHealth,
    Modifier::FlatDefense,
    Modifier::EnergyRegen,
];

/// Expansion of the `All` meta-category.
pub const ACTION_TYPES: [Modifier; 4] = [
    Modifier::Normal,
    Modifier::Heavy,
    Modifier::Skill,
    Modifier::Liberation,
];

/// Expansion of the `AllEle` meta-category. Physical is not included.
pub const ELEMENTS: [Modifier; 6] = [
    Modifier::Glacio,
    Modifier::Fusion,
    Modifier::Electro,
    Modifier::Aero,
    Modifier::Spectro,
    Modifier::Havoc,
];

impl Modifier {
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Modifier::Attack => "Attack",
            Modifier::Health => "Health",
            Modifier::Defense => "Defense",
            Modifier::Crit => "Crit",
            Modifier::CritDmg => "Crit Dmg",
            Modifier::Normal => "Normal",
            Modifier::Heavy => "Heavy",
            Modifier::Skill => "Skill",
            Modifier::Liberation => "Liberation",
            Modifier::NormalDeepen => "Normal (Deepen)",
            Modifier::HeavyDeepen => "Heavy (Deepen)",
            Modifier::SkillDeepen => "Skill (Deepen)",
            Modifier::LiberationDeepen => "Liberation (Deepen)",
            Modifier::Physical => "Physical",
            Modifier::Glacio => "Glacio",
            Modifier::Fusion => "Fusion",
            Modifier::Electro => "Electro",
            Modifier::Aero => "Aero",
            Modifier::Spectro => "Spectro",
            Modifier::Havoc => "Havoc",
            Modifier::Specific => "Specific",
            Modifier::Deepen => "Deepen",
            Modifier::Multiplier => "Multiplier",
            Modifier::Resistance => "Resistance",
            Modifier::IgnoreDefense => "Ignore Defense",
            Modifier::FlatAttack => "Flat Attack",
            Modifier::FlatHealth => "Flat Health",
            Modifier::FlatDefense => "Flat Defense",
            Modifier::EnergyRegen => "Energy Regen",
        }
    }

    pub fn from_name(name: &str) -> Option<Modifier> {
        ALL_MODIFIERS
            .iter()
            .copied()
            .find(|modifier| modifier.name() == name)
    }

    /// The deepen counterpart of an action-type bonus.
    pub const fn deepen(self) -> Option<Modifier> {
        match self {
            Modifier::Normal => Some(Modifier::NormalDeepen),
            Modifier::Heavy => Some(Modifier::HeavyDeepen),
            Modifier::Skill => Some(Modifier::SkillDeepen),
            Modifier::Liberation => Some(Modifier::LiberationDeepen),
            _ => None,
        }
    }

    pub fn is_action_type(self) -> bool {
        ACTION_TYPES.contains(&self)
    }

    /// The damage-bonus category a classification tag feeds into.
    pub const fn for_tag(tag: Tag) -> Option<Modifier> {
        match tag {
            Tag::Normal => Some(Modifier::Normal),
            Tag::Heavy => Some(Modifier::Heavy),
            Tag::Skill => Some(Modifier::Skill),
            Tag::Liberation => Some(Modifier::Liberation),
            Tag::Physical => Some(Modifier::Physical),
            Tag::Glacio => Some(Modifier::Glacio),
            Tag::Fusion => Some(Modifier::Fusion),
            Tag::Electro => Some(Modifier::Electro),
            Tag::Aero => Some(Modifier::Aero),
            Tag::Spectro => Some(Modifier::Spectro),
            Tag::Havoc => Some(Modifier::Havoc),
            _ => None,
        }
    }

    /// Plain stats that a buff can raise directly (`Attack`, `Crit Dmg`, ...).
    pub fn is_stat(self) -> bool {
        matches!(
            self,
            Modifier::Attack
                | Modifier::Health
                | Modifier::Defense
                | Modifier::Crit
                | Modifier::CritDmg
                | Modifier::FlatAttack
                | Modifier::FlatHealth
                | Modifier::FlatDefense
                | Modifier::EnergyRegen
        )
    }
}

/// What a skill-scoped entry contributes once its skill is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SkillBonusKind {
    Specific,
    Deepen,
    Multiplier,
    Additive,
}

impl SkillBonusKind {
    /// The global category this kind folds into when its skill is acting.
    pub const fn global(self) -> Option<Modifier> {
        match self {
            SkillBonusKind::Specific => Some(Modifier::Specific),
            SkillBonusKind::Deepen => Some(Modifier::Deepen),
            SkillBonusKind::Multiplier => Some(Modifier::Multiplier),
            SkillBonusKind::Additive => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModifierTable {
    values: [f64; MODIFIER_COUNT],
    skill_specific: BTreeMap<(String, SkillBonusKind), f64>,
}

impl Default for ModifierTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ModifierTable {
    pub fn new() -> Self {
        Self {
            values: [0.0; MODIFIER_COUNT],
            skill_specific: BTreeMap::new(),
        }
    }

    pub fn get(&self, modifier: Modifier) -> f64 {
        self.values[modifier.index()]
    }

    pub fn set(&mut self, modifier: Modifier, value: f64) {
        self.values[modifier.index()] = value;
    }

    pub fn add(&mut self, modifier: Modifier, amount: f64) {
        self.values[modifier.index()] += amount;
    }

    pub fn skill_value(&self, name: &str, kind: SkillBonusKind) -> Option<f64> {
        self.skill_specific
            .get(&(name.to_string(), kind))
            .copied()
    }

    pub fn set_skill_value(&mut self, name: &str, kind: SkillBonusKind, value: f64) {
        self.skill_specific.insert((name.to_string(), kind), value);
    }

    pub fn skill_entries(&self) -> impl Iterator<Item = (&str, SkillBonusKind, f64)> {
        self.skill_specific
            .iter()
            .map(|((name, kind), value)| (name.as_str(), *kind, *value))
    }

    /// The additive ratio bonus recorded for `name`, or zero.
    pub fn additive_for(&self, name: &str) -> f64 {
        self.skill_value(name, SkillBonusKind::Additive).unwrap_or(0.0)
    }

    /// First [SNAPSHOT_LEN] categories in declaration order.
    pub fn snapshot(&self) -> [f64; SNAPSHOT_LEN] {
        let mut out = [0.0; SNAPSHOT_LEN];
        out.copy_from_slice(&self.values[..SNAPSHOT_LEN]);
        out
    }
}
