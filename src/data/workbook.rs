//! Workbook import: reads the source spreadsheet's tables into a raw
//! [CatalogFile] using the sheet names and column layouts of the tables.

use std::path::Path;

use calamine::{Data, Reader};
use tracing::{debug, info};

use crate::data::records::{
    BuffRecord, CatalogFile, CellValue, CharacterRecord, EchoRecord, SkillRecord, WeaponRecord,
};
use crate::error::{CatalogError, Result};

pub const SKILL_SHEET: &str = "ActiveChar";
pub const BUFF_SHEET: &str = "ActiveEffects";
pub const WEAPON_BUFF_SHEET: &str = "WeaponBuffs";
pub const ECHO_BUFF_SHEET: &str = "EchoBuffs";
pub const WEAPON_SHEET: &str = "Weapons";
pub const ECHO_SHEET: &str = "Echo";
pub const CONSTANTS_SHEET: &str = "Constants";

/// First data row of the constants sheet.
const CONSTANTS_FIRST_ROW: usize = 3;

pub fn import_workbook(path: impl AsRef<Path>) -> Result<CatalogFile> {
    let path = path.as_ref();
    let mut wb = calamine::open_workbook_auto(path)?;
    let mut sheet = |name: &str| -> Result<Vec<Vec<Data>>> {
        if !wb.sheet_names().iter().any(|sheet| sheet == name) {
            return Err(CatalogError::MissingSheet(name.to_string()));
        }
        let range = wb.worksheet_range(name)?;
        Ok(range.rows().map(<[Data]>::to_vec).collect())
    };

    let file = CatalogFile {
        skills: named_rows(&sheet(SKILL_SHEET)?, 0).map(skill_row).collect(),
        buffs: named_rows(&sheet(BUFF_SHEET)?, 0).map(buff_row).collect(),
        weapon_buffs: named_rows(&sheet(WEAPON_BUFF_SHEET)?, 0)
            .map(gear_buff_row)
            .collect(),
        echo_buffs: named_rows(&sheet(ECHO_BUFF_SHEET)?, 0)
            .map(gear_buff_row)
            .collect(),
        weapons: named_rows(&sheet(WEAPON_SHEET)?, 1).map(weapon_row).collect(),
        echoes: named_rows(&sheet(ECHO_SHEET)?, 1).map(echo_row).collect(),
        characters: constants_rows(&sheet(CONSTANTS_SHEET)?),
    };
    info!(
        path = %path.display(),
        skills = file.skills.len(),
        buffs = file.buffs.len(),
        characters = file.characters.len(),
        "workbook imported"
    );
    Ok(file)
}

/// Rows after `skip` whose first cell holds a name.
fn named_rows(rows: &[Vec<Data>], skip: usize) -> impl Iterator<Item = &[Data]> {
    rows.iter()
        .skip(skip)
        .map(Vec::as_slice)
        .filter(|row| !cell_text(row.first()).is_empty())
}

/// Character constants run from the fourth row until the first blank name.
fn constants_rows(rows: &[Vec<Data>]) -> Vec<CharacterRecord> {
    rows.iter()
        .skip(CONSTANTS_FIRST_ROW)
        .map(Vec::as_slice)
        .take_while(|row| !cell_text(row.first()).is_empty())
        .map(|row| CharacterRecord {
            name: cell_text(row.first()),
            weapon_type: cell_text(row.get(1)),
            base_health: cell_to_f64(row.get(2)),
            base_attack: cell_to_f64(row.get(3)),
            base_defense: cell_to_f64(row.get(4)),
            minor_forte_1: cell_text(row.get(5)),
            minor_forte_2: cell_text(row.get(6)),
            element: cell_text(row.get(8)),
            max_forte: cell_to_f64(row.get(9)),
        })
        .collect()
}

fn skill_row(row: &[Data]) -> SkillRecord {
    let max_charges = cell_to_f64(row.get(12));
    SkillRecord {
        name: cell_text(row.first()),
        damage: cell_to_f64(row.get(1)),
        cast_time: cell_to_f64(row.get(2)),
        classification: cell_text(row.get(4)),
        hits: cell_to_f64(row.get(5)),
        owner: cell_text(row.get(6)),
        forte: cell_to_f64(row.get(7)),
        concerto: cell_to_f64(row.get(8)),
        resonance: cell_to_f64(row.get(9)),
        freeze_time: cell_to_f64(row.get(10)),
        cooldown: cell_to_f64(row.get(11)),
        max_charges: (max_charges > 0.0).then_some(max_charges),
    }
}

/// Regular rows carry a trigger in the eighth column; short rows (outros and
/// similar) stop at the applies-to column.
fn buff_row(row: &[Data]) -> BuffRecord {
    let regular = !cell_text(row.get(7)).is_empty();
    let common = BuffRecord {
        name: cell_text(row.first()),
        kind: cell_text(row.get(1)),
        classification: cell_text(row.get(2)),
        effect: cell_text(row.get(3)),
        amount: cell_value(row.get(4)),
        duration: cell_value(row.get(5)),
        ..BuffRecord::default()
    };
    if !regular {
        debug!(buff = %common.name, "short-format buff row");
        return BuffRecord {
            applies_to: cell_text(row.get(6)),
            ..common
        };
    }
    BuffRecord {
        trigger: cell_text(row.get(7)),
        stack_limit: cell_value(row.get(8)),
        stack_interval: cell_value(row.get(9)),
        applies_to: cell_text(row.get(10)),
        forte: cell_to_f64(row.get(11)),
        concerto: cell_to_f64(row.get(12)),
        resonance: cell_to_f64(row.get(13)),
        ..common
    }
}

fn gear_buff_row(row: &[Data]) -> BuffRecord {
    BuffRecord {
        name: cell_text(row.first()),
        kind: cell_text(row.get(1)),
        classification: cell_text(row.get(2)),
        effect: cell_text(row.get(3)),
        amount: cell_value(row.get(4)),
        duration: cell_value(row.get(5)),
        trigger: cell_text(row.get(6)),
        stack_limit: cell_value(row.get(7)),
        stack_interval: cell_value(row.get(8)),
        applies_to: cell_text(row.get(9)),
        ..BuffRecord::default()
    }
}

fn weapon_row(row: &[Data]) -> WeaponRecord {
    WeaponRecord {
        name: cell_text(row.first()),
        weapon_type: cell_text(row.get(1)),
        base_attack: cell_to_f64(row.get(2)),
        main_stat: cell_text(row.get(3)),
        main_stat_amount: cell_to_f64(row.get(4)),
        buff: cell_text(row.get(5)),
    }
}

fn echo_row(row: &[Data]) -> EchoRecord {
    EchoRecord {
        name: cell_text(row.first()),
        damage: cell_to_f64(row.get(1)),
        cast_time: cell_to_f64(row.get(2)),
        echo_set: cell_text(row.get(3)),
        classification: cell_text(row.get(4)),
        hits: cell_to_f64(row.get(5)),
        has_buff: cell_to_bool(row.get(6)),
        cooldown: cell_to_f64(row.get(7)),
        concerto: cell_to_f64(row.get(8)),
        resonance: cell_to_f64(row.get(9)),
    }
}

fn cell_text(d: Option<&Data>) -> String {
    match d {
        Some(Data::String(s)) => s.trim().to_string(),
        Some(Data::Float(f)) => f.to_string(),
        Some(Data::Int(i)) => i.to_string(),
        Some(Data::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn cell_to_f64(d: Option<&Data>) -> f64 {
    match d {
        Some(Data::Float(f)) => *f,
        Some(Data::Int(i)) => *i as f64,
        Some(Data::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn cell_to_bool(d: Option<&Data>) -> bool {
    match d {
        Some(Data::Bool(b)) => *b,
        Some(Data::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        Some(Data::Float(f)) => *f != 0.0,
        Some(Data::Int(i)) => *i != 0,
        _ => false,
    }
}

/// Numbers stay numeric; text (`Passive`, ranked `a/b/c`) is kept verbatim.
fn cell_value(d: Option<&Data>) -> CellValue {
    match d {
        Some(Data::Float(f)) => CellValue::Number(*f),
        Some(Data::Int(i)) => CellValue::Number(*i as f64),
        Some(Data::String(s)) => CellValue::Text(s.trim().to_string()),
        _ => CellValue::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Data {
        Data::String(s.to_string())
    }

    #[test]
    fn short_buff_rows_take_applies_to_from_seventh_column() {
        let row = vec![
            text("Outro: Flare"),
            text("Buff"),
            text("Fu"),
            text("Deepen"),
            Data::Float(0.2),
            Data::Float(14.0),
            text("Next"),
        ];
        let record = buff_row(&row);
        assert_eq!(record.applies_to, "Next");
        assert!(record.trigger.is_empty());
        assert_eq!(record.amount, CellValue::Number(0.2));
    }

    #[test]
    fn regular_buff_rows_read_trigger_and_deltas() {
        let row = vec![
            text("Sword Tide"),
            text("StackingBuff"),
            text("All"),
            text("Attack"),
            Data::Float(0.05),
            text("Passive"),
            Data::Bool(true),
            text("No,He"),
            Data::Int(4),
            Data::Float(1.0),
            text("Team"),
            Data::Float(5.0),
            Data::Empty,
            Data::Float(2.0),
        ];
        let record = buff_row(&row);
        assert_eq!(record.trigger, "No,He");
        assert!(record.duration.is_passive());
        assert_eq!(record.stack_limit, CellValue::Number(4.0));
        assert_eq!(record.forte, 5.0);
        assert_eq!(record.resonance, 2.0);
    }

    #[test]
    fn constants_stop_at_first_blank_name() {
        let header = vec![text("header")];
        let rows = vec![
            header.clone(),
            header.clone(),
            header,
            vec![text("Jiyan"), text("Broadblade"), Data::Float(10.0), Data::Float(30.0)],
            vec![Data::Empty],
            vec![text("Ignored")],
        ];
        let characters = constants_rows(&rows);
        assert_eq!(characters.len(), 1);
        assert_eq!(characters[0].base_attack, 30.0);
    }
}
