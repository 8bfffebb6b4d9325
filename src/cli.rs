use std::fs::{self, File};
use std::io::BufWriter;

use chrono::Utc;
use tracing::{info, warn};

use crate::combat::engine::damage_share;
use crate::combat::export_csv::write_step_trace;
use crate::combat::RunReport;
use crate::data::build_code;
use crate::data::catalog::write_catalog_file;
use crate::data::workbook::import_workbook;
use crate::data::{load_catalog, load_team, DEFAULT_CATALOG_PATH, DEFAULT_TEAM_PATH};
use crate::parallel::{run_batch, run_one, WorkerPool};
use crate::server;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Serve,
    Simulate,
    Batch,
    Encode,
    Decode,
    Import,
    Validate,
}

pub const USAGE: &str =
    "usage: rotasim <simulate|batch|encode|decode|import|validate|serve>";

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("serve") => Some(Command::Serve),
        Some("simulate") => Some(Command::Simulate),
        Some("batch") => Some(Command::Batch),
        Some("encode") => Some(Command::Encode),
        Some("decode") => Some(Command::Decode),
        Some("import") => Some(Command::Import),
        Some("validate") => Some(Command::Validate),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    match parse_command(args) {
        Some(Command::Serve) => handle_serve(),
        Some(Command::Simulate) => handle_simulate(args),
        Some(Command::Batch) => handle_batch(args),
        Some(Command::Encode) => handle_encode(args),
        Some(Command::Decode) => handle_decode(args),
        Some(Command::Import) => handle_import(args),
        Some(Command::Validate) => handle_validate(args),
        None => {
            eprintln!("{USAGE}");
            2
        }
    }
}

fn handle_serve() -> i32 {
    let bind_addr = server::bind_addr_from_env();
    match server::run_server(&bind_addr) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("server error: {err}");
            1
        }
    }
}

/// `simulate [team.yaml] [--catalog PATH] [--table] [--trace OUT.csv] [--steps]`
fn handle_simulate(args: &[String]) -> i32 {
    let positional = positional_args(args);
    let team_path = positional.first().map_or(DEFAULT_TEAM_PATH, String::as_str);
    let catalog_path = flag_value(args, "--catalog").unwrap_or(DEFAULT_CATALOG_PATH);
    let as_table = args.iter().any(|arg| arg == "--table");
    let with_steps = args.iter().any(|arg| arg == "--steps");

    let catalog = match load_catalog(catalog_path) {
        Ok(catalog) => catalog,
        Err(err) => {
            eprintln!("failed to load catalog '{catalog_path}': {err}");
            return 1;
        }
    };
    let team = match load_team(team_path) {
        Ok(team) => team,
        Err(err) => {
            eprintln!("failed to load team '{team_path}': {err}");
            return 1;
        }
    };
    let report = match run_one(&catalog, &team) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("simulation failed: {err}");
            return 1;
        }
    };
    info!(
        steps = report.steps.len(),
        total_damage = report.summary.total_damage,
        "simulation complete"
    );

    if let Some(trace_path) = flag_value(args, "--trace") {
        if let Err(err) = export_trace(&report, trace_path) {
            eprintln!("failed to write trace '{trace_path}': {err}");
            return 1;
        }
    }

    if as_table {
        print_table(&report, &team.members.iter().map(|m| m.name.clone()).collect::<Vec<_>>());
        return 0;
    }

    let payload = if with_steps {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string_pretty(&report.summary)
    };
    match payload {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize simulation result: {err}");
            1
        }
    }
}

fn export_trace(report: &RunReport, path: &str) -> crate::error::Result<()> {
    let file = File::create(path)?;
    write_step_trace(BufWriter::new(file), &report.steps)?;
    info!(path, rows = report.steps.len(), "trace written");
    Ok(())
}

fn print_table(report: &RunReport, members: &[String]) {
    let summary = &report.summary;
    println!("phase\tdamage\ttime\tdps");
    println!(
        "opener\t{:.2}\t{:.2}\t{:.2}",
        summary.opener_damage, summary.opener_time, summary.opener_dps
    );
    println!(
        "loop\t{:.2}\t{:.2}\t{:.2}",
        summary.loop_damage, summary.loop_time, summary.loop_dps
    );
    println!("weighted_dps\t{:.2}", summary.weighted_dps);
    println!("character\tdamage\tshare");
    for (name, share) in damage_share(report, members) {
        let damage = summary.damage_by_character.get(&name).copied().unwrap_or(0.0);
        println!("{name}\t{damage:.2}\t{:.4}", share);
    }
}

/// `batch <team.yaml>... [--catalog PATH] [--workers N]`
fn handle_batch(args: &[String]) -> i32 {
    let team_paths = positional_args(args);
    if team_paths.is_empty() {
        eprintln!("usage: rotasim batch <team.yaml>... [--catalog PATH] [--workers N]");
        return 2;
    }
    let catalog_path = flag_value(args, "--catalog").unwrap_or(DEFAULT_CATALOG_PATH);
    let workers = parse_usize_arg(flag_value(args, "--workers"), "workers", 0);

    let catalog = match load_catalog(catalog_path) {
        Ok(catalog) => catalog,
        Err(err) => {
            eprintln!("failed to load catalog '{catalog_path}': {err}");
            return 1;
        }
    };
    let mut teams = Vec::with_capacity(team_paths.len());
    for path in &team_paths {
        match load_team(path) {
            Ok(team) => teams.push(team),
            Err(err) => {
                eprintln!("failed to load team '{path}': {err}");
                return 1;
            }
        }
    }

    let results = run_batch(&catalog, &teams, &WorkerPool::with_workers(workers));
    let mut failures = 0;
    println!("team\ttotal_damage\tweighted_dps");
    for (path, result) in team_paths.iter().zip(results) {
        match result {
            Ok(report) => println!(
                "{path}\t{:.2}\t{:.2}",
                report.summary.total_damage, report.summary.weighted_dps
            ),
            Err(err) => {
                failures += 1;
                eprintln!("{path}: {err}");
            }
        }
    }
    i32::from(failures > 0)
}

/// `encode [team.yaml]` prints the build string.
fn handle_encode(args: &[String]) -> i32 {
    let positional = positional_args(args);
    let team_path = positional.first().map_or(DEFAULT_TEAM_PATH, String::as_str);
    match load_team(team_path) {
        Ok(team) => {
            println!("{}", build_code::encode(&team));
            0
        }
        Err(err) => {
            eprintln!("failed to load team '{team_path}': {err}");
            1
        }
    }
}

/// `decode <code | @file>` prints the team setup as YAML.
fn handle_decode(args: &[String]) -> i32 {
    let Some(raw) = args.get(2) else {
        eprintln!("usage: rotasim decode <build-string | @path>");
        return 2;
    };
    let code = match raw.strip_prefix('@') {
        Some(path) => match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) => {
                eprintln!("failed to read '{path}': {err}");
                return 1;
            }
        },
        None => raw.clone(),
    };

    let team = match build_code::decode(&code) {
        Ok(team) => team,
        Err(err) => {
            eprintln!("decode failed: {err}");
            return 1;
        }
    };
    match serde_yaml::to_string(&team) {
        Ok(yaml) => {
            print!("{yaml}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize team: {err}");
            1
        }
    }
}

/// `import <workbook.xlsx> [out.json]`
fn handle_import(args: &[String]) -> i32 {
    let Some(path) = args.get(2) else {
        eprintln!("usage: rotasim import <workbook.xlsx> [out.json]");
        return 2;
    };
    let output = args.get(3).map_or(DEFAULT_CATALOG_PATH, String::as_str);

    let file = match import_workbook(path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("import failed: {err}");
            return 1;
        }
    };
    if let Err(err) = write_catalog_file(&file, output) {
        eprintln!("failed to write catalog '{output}': {err}");
        return 1;
    }
    println!(
        "import complete: skills={}, buffs={}, weapons={}, echoes={}, output='{}', at={}",
        file.skills.len(),
        file.buffs.len() + file.weapon_buffs.len() + file.echo_buffs.len(),
        file.weapons.len(),
        file.echoes.len(),
        output,
        Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
    );
    0
}

/// `validate [catalog.json] [team.yaml]`
fn handle_validate(args: &[String]) -> i32 {
    let positional = positional_args(args);
    let catalog_path = positional.first().map_or(DEFAULT_CATALOG_PATH, String::as_str);

    let catalog = match load_catalog(catalog_path) {
        Ok(catalog) => catalog,
        Err(err) => {
            eprintln!("validation failed: {err}");
            return 1;
        }
    };
    let mut issues: Vec<String> = catalog.malformed.iter().map(ToString::to_string).collect();

    if let Some(team_path) = positional.get(1) {
        let assembled = load_team(team_path)
            .and_then(|team| crate::data::assemble_team(&catalog, &team));
        match assembled {
            Ok(prepared) => issues.extend(
                prepared
                    .malformed
                    .iter()
                    .skip(catalog.malformed.len())
                    .map(ToString::to_string),
            ),
            Err(err) => issues.push(err.to_string()),
        }
    }

    if issues.is_empty() {
        println!("validation passed: {catalog_path}");
        return 0;
    }
    eprintln!("validation failed: {} issue(s)", issues.len());
    for issue in &issues {
        warn!(%issue, "validation issue");
        eprintln!("- {issue}");
    }
    1
}

/// Arguments after the subcommand that are neither flags nor flag values.
fn positional_args(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut skip_next = false;
    for arg in args.iter().skip(2) {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg.starts_with("--") {
            skip_next = matches!(arg.as_str(), "--catalog" | "--trace" | "--workers");
            continue;
        }
        out.push(arg.clone());
    }
    out
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 1))
        .map(String::as_str)
}

fn parse_usize_arg(raw: Option<&str>, name: &str, default: usize) -> usize {
    raw.and_then(|value| value.parse::<usize>().ok())
        .unwrap_or_else(|| {
            if let Some(value) = raw {
                eprintln!("invalid {name} '{value}', defaulting to {default}");
            }
            default
        })
}
