use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use libris_core::{
    AppConfig, Catalog, Confirmation, ExitCode, LibrisError, Outcome, Record,
    RecordDraft, RecordId, SimilarityMatch, Verdict,
};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "libris",
    about = "Book inventory with a duplicate guard",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format (for scripts).
    /// Also enabled by setting LIBRIS_JSON=1.
    #[arg(long, global = true)]
    json: bool,

    /// Use this database file instead of the configured one.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List every record in creation order.
    List,

    /// Search title, author and category (case-insensitive substring).
    Search { query: String },

    /// Show one record.
    Get { id: RecordId },

    /// Add a record.
    Add {
        #[command(flatten)]
        fields: FieldArgs,
        /// Accept similar titles without asking.
        #[arg(long)]
        yes: bool,
    },

    /// Update a record. Omitted fields keep their stored value.
    Update {
        id: RecordId,
        #[command(flatten)]
        fields: FieldArgs,
        /// Accept similar titles without asking.
        #[arg(long)]
        yes: bool,
    },

    /// Delete a record.
    Delete {
        id: RecordId,
        #[arg(long)]
        confirm: bool,
    },

    /// Report how the duplicate guard would treat a title, without writing.
    Check {
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        /// Check as an update of this record.
        #[arg(long)]
        id: Option<RecordId>,
    },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run diagnostics.
    Doctor,
}

#[derive(clap::Args, Default)]
struct FieldArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    author: Option<String>,
    #[arg(long)]
    publisher: Option<String>,
    #[arg(long)]
    year: Option<String>,
    /// One of: History, Fiction, Science, Biography, Art, Technology, Other.
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    quantity: Option<String>,
}

impl FieldArgs {
    /// Overlay the given values on `base`.
    fn into_draft(self, base: RecordDraft) -> RecordDraft {
        RecordDraft {
            title: self.title.unwrap_or(base.title),
            author: self.author.unwrap_or(base.author),
            publisher: self.publisher.unwrap_or(base.publisher),
            year: self.year.unwrap_or(base.year),
            category: self.category.or(base.category),
            quantity: self.quantity.unwrap_or(base.quantity),
        }
    }
}

// ─── Config Actions ──────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file location.
    Path,
    /// Show the effective configuration.
    Show,
    /// Write the default configuration if no file exists yet.
    Init,
}

// ─── Main ────────────────────────────────────────────────────────────────────

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            err.downcast_ref::<LibrisError>()
                .map(LibrisError::exit_code)
                .unwrap_or(ExitCode::GeneralError)
        }
    };
    if code != ExitCode::Success {
        std::process::exit(code.into());
    }
}

/// Every opened catalog is closed before this returns, so the exit code is
/// handed back instead of exiting here.
fn run() -> Result<ExitCode> {
    let start = Instant::now();
    let cli = Cli::parse();

    let json_output = cli.json || std::env::var("LIBRIS_JSON").as_deref() == Ok("1");

    let mut config = AppConfig::load()?;
    if let Some(db) = &cli.db {
        config.core.database_path = db.to_string_lossy().to_string();
    }
    init_logging(&config);
    tracing::debug!(db = %config.database_path().display(), json = json_output, "starting");

    match cli.command {
        Commands::List => {
            let catalog = Catalog::open(&config)?;
            let records = catalog.list()?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "items": records, "total": records.len() },
                    "meta": { "duration_ms": dur }
                }))?;
            } else if records.is_empty() {
                println!("No records in the catalog. Use `libris add` to add books.");
            } else {
                print_records(&records);
            }
            catalog.close()?;
        }

        Commands::Search { query } => {
            let catalog = Catalog::open(&config)?;
            let results = catalog.search(query.trim())?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "items": results, "total": results.len(), "query": query },
                    "meta": { "duration_ms": dur }
                }))?;
            } else if results.is_empty() {
                println!("No matching records found.");
            } else {
                println!("Found {} results:", results.len());
                print_records(&results);
            }
            catalog.close()?;
        }

        Commands::Get { id } => {
            let catalog = Catalog::open(&config)?;
            let record = catalog.get(id)?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":record,"meta":{"duration_ms":dur}}))?;
            } else {
                print_record_detail(&record);
            }
            catalog.close()?;
        }

        Commands::Add { fields, yes } => {
            let catalog = Catalog::open(&config)?;
            let draft = fields.into_draft(RecordDraft::default());
            let outcome = guarded_write(json_output, yes, |confirmation| {
                catalog.add(&draft, confirmation)
            })?;
            let code = finish_write(&outcome, json_output, start, "Record added")?;
            catalog.close()?;
            return Ok(code);
        }

        Commands::Update { id, fields, yes } => {
            let catalog = Catalog::open(&config)?;
            let current = catalog.get(id)?;
            let draft = fields.into_draft(RecordDraft::from_record(&current));
            let outcome = guarded_write(json_output, yes, |confirmation| {
                catalog.update(id, &draft, confirmation)
            })?;
            let code = finish_write(&outcome, json_output, start, "Record updated")?;
            catalog.close()?;
            return Ok(code);
        }

        Commands::Delete { id, confirm } => {
            let catalog = Catalog::open(&config)?;
            let record = catalog.get(id)?;
            if !confirm && (json_output || !ask(&format!("Delete '{}' by {}?", record.title, record.author))?) {
                eprintln!("Add --confirm to delete without prompt.");
                catalog.close()?;
                return Ok(ExitCode::ConfirmRequired);
            }
            catalog.remove(id)?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":{"deleted":id},"meta":{"duration_ms":dur}}))?;
            } else {
                println!("Deleted record {id}: {}", record.title);
            }
            catalog.close()?;
        }

        Commands::Check { title, author, id } => {
            let catalog = Catalog::open(&config)?;
            let verdict = catalog.check_title(title.trim(), author.trim(), id)?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":verdict,"meta":{"duration_ms":dur}}))?;
            } else {
                match &verdict {
                    Verdict::Allow => println!("allow: no similar titles by {}", author.trim()),
                    Verdict::Warn(matches) => {
                        println!("warn: similar titles exist:");
                        print_matches(matches);
                    }
                    Verdict::Blocked(matches) => {
                        println!("blocked: a very similar title exists:");
                        print_matches(matches);
                    }
                }
            }
            catalog.close()?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Path => println!("{}", AppConfig::config_path().display()),
            ConfigAction::Show => {
                if json_output {
                    print_json(&serde_json::to_value(&config)?)?;
                } else {
                    print!("{}", toml::to_string_pretty(&config)?);
                }
            }
            ConfigAction::Init => {
                let path = AppConfig::config_path();
                if path.exists() {
                    println!("Config already exists: {}", path.display());
                } else {
                    AppConfig::default().save_to(&path)?;
                    println!("Wrote default config: {}", path.display());
                }
            }
        },

        // ── Doctor ─────────────────────────────────────────────────────────

        Commands::Doctor => {
            let config_path = AppConfig::config_path();
            if config_path.exists() {
                println!("✓ Config: {}", config_path.display());
            } else {
                println!("○ Config: not found (using defaults)");
            }

            let db_path = config.database_path();
            let mut issues = 0;
            match Catalog::open(&config) {
                Ok(catalog) => {
                    let count = catalog.store().count()?;
                    let versions = catalog.store().applied_migrations()?;
                    println!("✓ Database: {} ({count} records)", db_path.display());
                    println!("✓ Schema migrations: {versions:?}");
                    catalog.close()?;
                }
                Err(e) => {
                    issues += 1;
                    println!("✗ Database: {e}");
                }
            }

            if issues == 0 {
                println!("\nAll checks passed ✓");
            } else {
                println!("\n{issues} issues found");
                return Ok(ExitCode::GeneralError);
            }
        }
    }

    Ok(ExitCode::Success)
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_env("LIBRIS_LOG")
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run a write, asking once for confirmation when the guard holds it back.
fn guarded_write(
    json_output: bool,
    yes: bool,
    write: impl Fn(Confirmation) -> libris_core::Result<Outcome>,
) -> Result<Outcome> {
    let first = if yes { Confirmation::Confirmed } else { Confirmation::Pending };
    let outcome = write(first)?;

    let Outcome::NeedsConfirmation { matches } = &outcome else {
        return Ok(outcome);
    };
    if json_output {
        return Ok(outcome);
    }

    println!("Similar books by this author already exist:");
    print_matches(matches);
    if ask("Are you sure this is a different book and NOT a duplicate?")? {
        Ok(write(Confirmation::Confirmed)?)
    } else {
        Ok(outcome)
    }
}

fn finish_write(outcome: &Outcome, json_output: bool, start: Instant, done: &str) -> Result<ExitCode> {
    let dur = start.elapsed().as_millis();
    if json_output {
        let status = match outcome {
            Outcome::Committed { .. } => "ok",
            _ => "error",
        };
        print_json(&serde_json::json!({"status":status,"data":outcome,"meta":{"duration_ms":dur}}))?;
    }

    match outcome {
        Outcome::Committed { id } => {
            if !json_output {
                println!("{done} (id {id})");
            }
            Ok(ExitCode::Success)
        }
        Outcome::Blocked { matches } => {
            if !json_output {
                eprintln!("Duplicate blocked: a very similar book already exists by this author:");
                print_matches(matches);
                eprintln!("Please correct the title if it's a typo.");
            }
            Ok(ExitCode::Conflict)
        }
        Outcome::NeedsConfirmation { .. } => {
            if !json_output {
                eprintln!("Not saved. Re-run with --yes to accept similar titles.");
            }
            Ok(ExitCode::ConfirmRequired)
        }
    }
}

fn ask(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn print_records(records: &[Record]) {
    for r in records {
        println!(
            "{id:>5}  {title:<40}  {author:<25}  {year:<6}  {category:<10}  {qty}",
            id = r.id,
            title = r.title,
            author = r.author,
            year = r.year,
            category = r.category.as_str(),
            qty = r.quantity,
        );
    }
}

fn print_record_detail(record: &Record) {
    println!("ID:        {}", record.id);
    println!("Title:     {}", record.title);
    println!("Author:    {}", record.author);
    println!("Publisher: {}", record.publisher);
    println!("Year:      {}", record.year);
    println!("Category:  {}", record.category);
    println!("Quantity:  {}", record.quantity);
}

fn print_matches(matches: &[SimilarityMatch]) {
    for m in matches {
        println!("  - {} ({:.0}%)", m.existing_title, m.score * 100.0);
    }
}
