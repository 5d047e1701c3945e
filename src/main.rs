use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use log::warn;

use memverse::completion::{CompletionOutcome, PriorProgress};
use memverse::config::TrackerConfig;
use memverse::store::{self, CsvLibrary, CsvStore, EntryStore};
use memverse::{MemorizationEntry, MemorizationPhase, SystemClock, Tracker};

fn usage() -> ! {
    eprintln!("Usage: memverse [--config FILE] <command> [args...]");
    eprintln!("Commands:");
    eprintln!("  due <paths...>                          Show today's queue by phase");
    eprintln!("  log <file> <id|reference>               Log today's repetition");
    eprintln!("  add <file> <reference> <text> [--phase N --done K --today --flashcard]");
    eprintln!("                                          Add a verse, optionally with prior progress");
    eprintln!("  repair <paths...>                       Fix inconsistent progress");
    eprintln!("  stats <paths...>                        Phase counts, completion rate, streak");
    eprintln!("  serve <paths...> [-p PORT]              Start the JSON API (default port 3000)");
    std::process::exit(1);
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = take_option(&mut args, "--config");
    if args.is_empty() {
        usage();
    }

    let config = match config_path {
        Some(path) => TrackerConfig::load(&PathBuf::from(path))?,
        None => TrackerConfig::default(),
    }
    .with_env_overrides();
    let tracker = Tracker::from_config(config)?;

    let command = args.remove(0);
    match command.as_str() {
        "due" => due(&tracker, &args),
        "log" => log_completion(&tracker, &args),
        "add" => add(&tracker, args),
        "repair" => repair(&tracker, &args),
        "stats" => stats(&tracker, &args),
        "serve" => {
            let port = take_option(&mut args, "-p")
                .map(|p| p.parse::<u16>().with_context(|| format!("invalid port: {p}")))
                .transpose()?
                .unwrap_or(3000);
            let files = require_files(&args)?;
            tokio::runtime::Runtime::new()?.block_on(memverse::web::serve(files, port, tracker))?;
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {command}");
            usage();
        }
    }
}

/// Removes `flag VALUE` from `args` and returns the value.
fn take_option(args: &mut Vec<String>, flag: &str) -> Option<String> {
    let i = args.iter().position(|a| a == flag)?;
    if i + 1 >= args.len() {
        eprintln!("{flag} needs a value");
        usage();
    }
    let value = args.remove(i + 1);
    args.remove(i);
    Some(value)
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    match args.iter().position(|a| a == flag) {
        Some(i) => {
            args.remove(i);
            true
        }
        None => false,
    }
}

fn require_files(args: &[String]) -> Result<Vec<PathBuf>> {
    if args.is_empty() {
        usage();
    }
    let files = store::discover_files(args);
    if files.is_empty() {
        bail!("No CSV files found.");
    }
    Ok(files)
}

fn load(args: &[String]) -> Result<(CsvLibrary, Vec<MemorizationEntry>)> {
    let files = require_files(args)?;
    let mut library = CsvLibrary::open(&files);
    let entries = library.load_all().context("failed to load entries")?;
    Ok((library, entries))
}

fn describe(entry: &MemorizationEntry) -> String {
    let phase = entry.current_phase;
    let units = entry.units_in(phase);
    match phase.target() {
        Some(target) => format!("{} ({units}/{target} {})", entry.reference, phase.unit_name()),
        None => format!("{} ({units} {})", entry.reference, phase.unit_name()),
    }
}

fn due(tracker: &Tracker<SystemClock>, args: &[String]) -> Result<()> {
    let (_, entries) = load(args)?;
    let queues = tracker.verses_by_phase(&entries);
    if queues.is_empty() {
        println!("Nothing due today.");
        return Ok(());
    }

    for (phase, list) in [
        (MemorizationPhase::Phase1, &queues.phase1),
        (MemorizationPhase::Phase2, &queues.phase2),
        (MemorizationPhase::Phase3, &queues.phase3),
    ] {
        if list.is_empty() {
            continue;
        }
        println!("{phase}:");
        for entry in list {
            println!("  {}  {}", entry.id, describe(entry));
        }
    }
    println!("{} due today.", queues.len());
    Ok(())
}

fn log_completion(tracker: &Tracker<SystemClock>, args: &[String]) -> Result<()> {
    let [path, key] = args else {
        usage();
    };
    let mut store = CsvStore::open(path).with_context(|| format!("failed to open {path}"))?;
    let mut entries = store.load_all()?;

    let index = entries
        .iter()
        .position(|e| e.id.to_string() == *key)
        .or_else(|| {
            entries
                .iter()
                .position(|e| e.reference.eq_ignore_ascii_case(key))
        })
        .with_context(|| format!("no entry matching {key}"))?;

    let entry = &mut entries[index];
    match tracker.complete_now(entry, &mut store) {
        Ok(CompletionOutcome::AlreadyLoggedToday) => {
            println!("{} was already practised today.", entry.reference);
        }
        Ok(CompletionOutcome::Logged { advanced_to, .. }) => {
            println!("Logged {}.", describe(entry));
            if let Some(next) = advanced_to {
                println!("Moved on to {next}!");
            }
        }
        Err(e) if e.is_persistence() => {
            bail!("{e}; progress not saved, run the command again to retry");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn add(tracker: &Tracker<SystemClock>, mut args: Vec<String>) -> Result<()> {
    let phase = take_option(&mut args, "--phase");
    let done = take_option(&mut args, "--done");
    let today = take_flag(&mut args, "--today");
    let flashcard = take_flag(&mut args, "--flashcard");
    let [path, reference, text] = args.as_slice() else {
        usage();
    };

    let prior = match phase {
        Some(phase) => Some(PriorProgress {
            phase: phase.parse::<MemorizationPhase>().map_err(anyhow::Error::msg)?,
            completed: match done {
                Some(d) => d.parse::<u32>().with_context(|| format!("invalid --done: {d}"))?,
                None => 0,
            },
            completed_today: today,
        }),
        None => {
            if done.is_some() || today {
                warn!("--done and --today only apply with --phase");
            }
            None
        }
    };
    let entry = tracker.new_entry(reference.as_str(), text.as_str(), flashcard, prior)?;

    let mut store = CsvStore::open(path).with_context(|| format!("failed to open {path}"))?;
    store.save(&entry).with_context(|| format!("failed to write {path}"))?;
    println!("Added {} as {}.", describe(&entry), entry.id);
    Ok(())
}

fn repair(tracker: &Tracker<SystemClock>, args: &[String]) -> Result<()> {
    let (mut library, mut entries) = load(args)?;
    let report = tracker.validate_and_repair(&mut entries, &mut library);

    if report.is_clean() {
        println!("All {} entries are consistent.", report.examined);
        return Ok(());
    }
    for (id, repairs) in &report.repaired {
        println!("  {id}: {repairs:?}");
    }
    println!(
        "Repaired {} of {} entries.",
        report.repaired.len(),
        report.examined
    );
    for err in &report.failed {
        eprintln!("Error: {err}");
    }
    if !report.failed.is_empty() {
        bail!("{} repairs were not saved", report.failed.len());
    }
    Ok(())
}

fn stats(tracker: &Tracker<SystemClock>, args: &[String]) -> Result<()> {
    let (_, entries) = load(args)?;
    let stats = tracker.statistics(&entries);
    println!("Verses: {}", stats.total_verses);
    println!("  Phase 1: {}", stats.phase1_count);
    println!("  Phase 2: {}", stats.phase2_count);
    println!("  Phase 3: {}", stats.phase3_count);
    println!("Due today: {}", stats.due_today);
    println!("Completion: {:.0}%", stats.completion_rate() * 100.0);
    println!("Streak: {} days", tracker.completion_streak(&entries));
    Ok(())
}
