use clap::{Parser, Subcommand};
use conboy::autosave::{AutoSaveState, format_time_since};
use conboy::config::Config;
use conboy::richtext::xml_reader::read_note;
use conboy::richtext::xml_writer::write_note;
use conboy::store::{NoteStore, open_store};
use conboy::{LoadedNote, Note, NoteError, dates};
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "CONBOY_LOG";

#[derive(Parser, Debug)]
#[command(name = "conboy")]
#[command(about = "Tomboy-compatible notes on the command line", long_about = None)]
struct Args {
    /// Configuration file (default: conboy.toml in the config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List all notes, most recently changed first
    Ls,
    /// Print the text of a note
    Show {
        /// Guid of the note
        guid: String,
    },
    /// Create an empty note
    New {
        /// Title of the note
        title: String,
    },
    /// Append lines read from stdin to a note ("- " starts a bullet item)
    Append {
        /// Guid of the note
        guid: String,
    },
    /// Print the .note XML of a note
    Export {
        /// Guid of the note
        guid: String,
    },
    /// Check that a .note file survives a load/save round trip
    Check {
        /// Path of the .note file
        file: PathBuf,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn load_config(path: Option<PathBuf>) -> conboy::Result<Config> {
    match path {
        Some(path) => Config::from_path(&path),
        None => Ok(Config::load()),
    }
}

fn cmd_ls(store: &dyn NoteStore) -> conboy::Result<()> {
    let now = dates::now();
    for note in store.list()? {
        let pinned = if note.pinned { "*" } else { " " };
        println!(
            "{} {pinned} {:<40} {}",
            note.guid,
            note.title,
            format_time_since(note.last_change_date, now)
        );
    }
    Ok(())
}

fn cmd_show(store: &dyn NoteStore, guid: &str) -> conboy::Result<()> {
    let loaded = LoadedNote::from_note(store.load(guid)?)?;
    let text = loaded.buffer.text();
    if text.is_empty() {
        println!("(empty)");
    } else {
        println!("{text}");
    }
    Ok(())
}

fn cmd_new(store: &dyn NoteStore, config: &Config, title: &str) -> conboy::Result<()> {
    let note = Note::new(title).with_size(config.default_width, config.default_height);
    store.save(&note)?;
    println!("{}", note.guid);
    Ok(())
}

/// Saves whenever input pauses for the autosave delay, and once at the end
fn cmd_append(store: &dyn NoteStore, config: &Config, guid: &str) -> conboy::Result<()> {
    let LoadedNote {
        mut note,
        mut buffer,
    } = LoadedNote::from_note(store.load(guid)?)?;
    let mut autosave = AutoSaveState::from_config(&note, config);
    for line in io::stdin().lock().lines() {
        let line = line?;
        if autosave.is_due(Instant::now()) {
            autosave.trigger_save(&mut note, &buffer, store)?;
        }
        buffer.append_line(&line);
        autosave.mark_changed();
    }
    autosave.trigger_save(&mut note, &buffer, store)?;
    Ok(())
}

fn cmd_export(store: &dyn NoteStore, guid: &str) -> conboy::Result<()> {
    let note = store.load(guid)?;
    println!("{}", write_note(&note));
    Ok(())
}

fn cmd_check(file: &Path) -> conboy::Result<()> {
    let xml = fs::read_to_string(file)?;
    let first = read_note(&xml)?;
    let second = read_note(&write_note(&first.note))?;
    if first.buffer.text() != second.buffer.text()
        || first.buffer.runs() != second.buffer.runs()
    {
        return Err(NoteError::Store(format!(
            "{} does not survive a round trip",
            file.display()
        )));
    }
    println!(
        "{}: ok ({} characters, {} lines)",
        first.note.title,
        first.buffer.len(),
        first.buffer.line_count()
    );
    Ok(())
}

fn run(args: Args) -> conboy::Result<()> {
    if let Commands::Check { file } = &args.command {
        return cmd_check(file);
    }
    let config = load_config(args.config)?;
    let store = open_store(&config)?;
    match args.command {
        Commands::Ls => cmd_ls(store.as_ref()),
        Commands::Show { guid } => cmd_show(store.as_ref(), &guid),
        Commands::New { title } => cmd_new(store.as_ref(), &config, &title),
        Commands::Append { guid } => cmd_append(store.as_ref(), &config, &guid),
        Commands::Export { guid } => cmd_export(store.as_ref(), &guid),
        Commands::Check { .. } => Ok(()),
    }
}

fn main() {
    init_logging();
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
