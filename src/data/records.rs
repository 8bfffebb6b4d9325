//! Raw catalog records as stored on disk (JSON) or imported from a workbook.
//!
//! Records keep the loose shapes of the source tables: numbers that may be
//! slash-delimited per weapon rank, durations that may read `Passive`, and
//! free-form trigger strings. [crate::data::definitions] normalizes them.

use serde::{Deserialize, Serialize};

/// A cell that is either a number or text (`"Passive"`, `"0.12/0.15/0.18"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Number(0.0)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl CellValue {
    pub fn is_passive(&self) -> bool {
        matches!(self, CellValue::Text(text) if text.trim() == "Passive")
    }

    pub fn is_ranked(&self) -> bool {
        matches!(self, CellValue::Text(text) if text.contains('/'))
    }

    /// Resolves the value for a zero-based weapon rank. Slash-delimited text
    /// picks the `rank`-th entry (the last one when out of range); blank text
    /// reads as zero.
    pub fn ranked(&self, rank: usize) -> Result<f64, String> {
        match self {
            CellValue::Number(value) => Ok(*value),
            CellValue::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Ok(0.0);
                }
                let parts: Vec<&str> = trimmed.split('/').collect();
                let index = rank.min(parts.len() - 1);
                let part = parts[index].trim();
                part.parse::<f64>()
                    .map_err(|_| format!("'{part}' is not a number"))
            }
        }
    }

    pub fn number(&self) -> Result<f64, String> {
        self.ranked(0)
    }
}

/// One row of the skill table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillRecord {
    pub name: String,
    pub damage: f64,
    pub cast_time: f64,
    pub classification: String,
    pub hits: f64,
    pub owner: String,
    pub forte: f64,
    pub concerto: f64,
    pub resonance: f64,
    pub freeze_time: f64,
    pub cooldown: f64,
    pub max_charges: Option<f64>,
}

/// One row of the generic, weapon or echo buff tables. Weapon rows may use
/// slash-delimited ranked values in `amount`, `duration`, `stack_limit` and
/// `stack_interval`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuffRecord {
    pub name: String,
    pub kind: String,
    pub classification: String,
    pub effect: String,
    pub amount: CellValue,
    pub duration: CellValue,
    pub trigger: String,
    pub stack_limit: CellValue,
    pub stack_interval: CellValue,
    pub applies_to: String,
    pub can_activate: Option<String>,
    pub forte: f64,
    pub concerto: f64,
    pub resonance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterRecord {
    pub name: String,
    pub weapon_type: String,
    pub base_health: f64,
    pub base_attack: f64,
    pub base_defense: f64,
    pub minor_forte_1: String,
    pub minor_forte_2: String,
    pub element: String,
    pub max_forte: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponRecord {
    pub name: String,
    pub weapon_type: String,
    pub base_attack: f64,
    pub main_stat: String,
    pub main_stat_amount: f64,
    pub buff: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoRecord {
    pub name: String,
    pub damage: f64,
    pub cast_time: f64,
    pub echo_set: String,
    pub classification: String,
    pub hits: f64,
    pub has_buff: bool,
    pub cooldown: f64,
    pub concerto: f64,
    pub resonance: f64,
}

/// Root of a catalog JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogFile {
    pub skills: Vec<SkillRecord>,
    pub buffs: Vec<BuffRecord>,
    pub weapon_buffs: Vec<BuffRecord>,
    pub echo_buffs: Vec<BuffRecord>,
    pub characters: Vec<CharacterRecord>,
    pub weapons: Vec<WeaponRecord>,
    pub echoes: Vec<EchoRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranked_values_pick_rank_or_last() {
        let cell = CellValue::from("0.12/0.15/0.18");
        assert_eq!(cell.ranked(0).unwrap(), 0.12);
        assert_eq!(cell.ranked(2).unwrap(), 0.18);
        assert_eq!(cell.ranked(7).unwrap(), 0.18);
    }

    #[test]
    fn blank_and_numeric_cells() {
        assert_eq!(CellValue::from("").number().unwrap(), 0.0);
        assert_eq!(CellValue::Number(3.0).ranked(4).unwrap(), 3.0);
        assert!(CellValue::from("abc").number().is_err());
        assert!(CellValue::from(" Passive ").is_passive());
    }

    #[test]
    fn cells_deserialize_from_numbers_or_text() {
        let parsed: Vec<CellValue> = serde_json::from_str(r#"[1.5, "Passive", "1/2"]"#).unwrap();
        assert_eq!(parsed[0], CellValue::Number(1.5));
        assert!(parsed[1].is_passive());
        assert!(parsed[2].is_ranked());
    }
}
