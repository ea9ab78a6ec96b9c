//! pressf-front - Channel F removable storage front-end
//!
//! Headless driver for the boot machine: scans the configured media, lists
//! the ROM catalog, loads entries and manages the flash accessory.

use anyhow::{bail, Context};
use cf_core::config::LogLevel;
use cf_core::{logging, Config};
use cf_integration::{BootMachine, BootState, EntryKind, MemoryCore, MenuEvent};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Channel F removable storage front-end")]
struct Args {
    /// Path to config.toml (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan all sources and print the ROM catalog
    List,
    /// Load catalog entry N into the core
    Load { index: usize },
    /// Copy catalog entry N onto the flash accessory
    Save { index: usize },
    /// Write a fresh filesystem to the flash accessory
    Format,
    /// Show flash accessory capacity
    Stats,
    /// Delete a note from the flash accessory
    Delete { name: String },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };

    let level = if args.verbose {
        LogLevel::Debug
    } else {
        config.debug.log_level
    };
    logging::init(level);

    tracing::info!("Starting pressf-front");

    let mut machine = BootMachine::from_config(MemoryCore::new(), &config);

    match args.command {
        Command::Format => {
            let stats = machine.format_accessory().context("Format failed")?;
            println!("Formatted accessory: {} pages, {} notes", stats.pages_total, stats.notes_total);
            return Ok(());
        }
        Command::Stats => {
            let stats = machine.accessory_stats().context("Cannot read accessory")?;
            println!(
                "Pages: {}/{} used, {} free",
                stats.pages_used,
                stats.pages_total,
                stats.pages_free()
            );
            println!(
                "Notes: {}/{} used, {} free",
                stats.notes_used,
                stats.notes_total,
                stats.notes_free()
            );
            return Ok(());
        }
        Command::Delete { ref name } => {
            let stats = machine.delete_note(name).with_context(|| format!("Cannot delete {}", name))?;
            println!("Deleted {}: {} pages free", name, stats.pages_free());
            return Ok(());
        }
        Command::List | Command::Load { .. } | Command::Save { .. } => {}
    }

    machine.boot();
    if let Some(modal) = machine.modal() {
        bail!("{}", modal.message);
    }

    match args.command {
        Command::List => print_catalog(&machine),
        Command::Load { index } => {
            check_index(&machine, index)?;
            machine.select(index);
            machine.handle(MenuEvent::Activate);

            if let Some(modal) = machine.modal() {
                bail!("{}", modal.message);
            }
            if *machine.state() == BootState::Emulating {
                let entry = &machine.catalog().entries()[index];
                println!("Running {} at {} Hz", entry.title, machine.core().clock_hz());
            }
        }
        Command::Save { index } => {
            check_index(&machine, index)?;
            machine.select(index);
            let outcome = machine.save_to_accessory()?;
            println!(
                "Saved {} ({} bytes, {} pages); {}/{} pages free",
                outcome.note_name,
                outcome.bytes_used,
                outcome.pages_used,
                outcome.stats.pages_free(),
                outcome.stats.pages_total
            );
        }
        Command::Format | Command::Stats | Command::Delete { .. } => {}
    }

    Ok(())
}

fn check_index(machine: &BootMachine<MemoryCore>, index: usize) -> anyhow::Result<()> {
    let len = machine.catalog().len();
    if index >= len {
        bail!("No catalog entry {} ({} entries)", index, len);
    }
    Ok(())
}

fn print_catalog(machine: &BootMachine<MemoryCore>) {
    let catalog = machine.catalog();
    println!("{}", catalog.title());
    println!("{}", catalog.subtitle());
    println!();

    for (i, entry) in catalog.entries().iter().enumerate() {
        match entry.kind {
            EntryKind::SelectableFile => {
                println!("{:3}  {:<40} {}", i, entry.title, entry.source.virtual_path(&entry.path));
            }
            EntryKind::Back => println!("{:3}  {}", i, entry.title),
            EntryKind::Boolean | EntryKind::Choice => println!(
                "{:3}  {:<40} {}",
                i,
                entry.title,
                entry.value_label().unwrap_or_default()
            ),
        }
    }
}
