use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use tripleport_core::cancel::CancellationToken;
use tripleport_core::codec::TripleSource;
use tripleport_core::config::{
    config_path, limits_from_config, load_config, load_config_from, save_config_to,
    set_config_key, AppConfig,
};
use tripleport_core::executor::Outcome;
use tripleport_core::notation::{is_binary_path, Notation};
use tripleport_core::operation::{ConfiguredOperation, Operation};
use tripleport_core::progress::ProgressEvent;
use tripleport_core::store::{MemoryStore, TriplePattern};

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const DEFAULT_TEMPLATE: &str = "{prefix:.bold} [{bar:40.cyan/blue}] {pos:>3}% {msg}";

#[derive(Parser)]
#[command(name = "tripleport")]
#[command(about = "Import, export and query triple stores with progress and cancellation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Import an RDF or HDT file and save it as HDT
    Import {
        /// Input file
        #[arg(required = true)]
        input: String,

        /// Output HDT file
        #[arg(long, required = true)]
        to: String,

        /// Input notation (ntriples, json); detected from the extension if omitted
        #[arg(short, long)]
        notation: Option<String>,

        /// Base URI for relative IRIs
        #[arg(long)]
        base_uri: Option<String>,
    },

    /// Export an HDT file to RDF
    Export {
        /// Input HDT file
        #[arg(required = true)]
        input: String,

        /// Output file
        #[arg(short, long, required = true)]
        output: String,

        /// Output notation (ntriples, json)
        #[arg(short, long)]
        notation: Option<String>,
    },

    /// Export the triples of an HDT file matching a pattern
    Query {
        /// Input HDT file
        #[arg(required = true)]
        input: String,

        /// Subject to match ("?" or empty matches any)
        #[arg(short, long, default_value = "")]
        subject: String,

        /// Predicate to match
        #[arg(short, long, default_value = "")]
        predicate: String,

        /// Object to match
        #[arg(long, default_value = "")]
        object: String,

        /// Output file
        #[arg(short, long, required = true)]
        output: String,

        /// Output notation (ntriples, json)
        #[arg(short, long)]
        notation: Option<String>,
    },

    /// Show statistics of an HDT file
    Info {
        /// Input HDT file
        #[arg(required = true)]
        input: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Initialize default config file
    Init,
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Key (dot-separated path)
        key: String,
        /// Value
        value: String,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    if let Err(e) = ctrlc::set_handler(cancel_on_interrupt(cancel.clone())) {
        tracing::warn!(error = %e, "Could not install interrupt handler");
    }

    let session = Session {
        cfg: load_config(),
        json: cli.json,
        cancel,
    };

    let result = match &cli.command {
        Commands::Import {
            input,
            to,
            notation,
            base_uri,
        } => session.import(input, to, notation.as_deref(), base_uri.as_deref()),
        Commands::Export {
            input,
            output,
            notation,
        } => session.export(input, output, notation.as_deref()),
        Commands::Query {
            input,
            subject,
            predicate,
            object,
            output,
            notation,
        } => session.query(
            input,
            TriplePattern::from_parts(subject, predicate, object),
            output,
            notation.as_deref(),
        ),
        Commands::Info { input } => session.info(input),
        Commands::Config { action } => run_config(action, cli.json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Ctrl-C handler that cancels whatever operation is running.
fn cancel_on_interrupt(token: CancellationToken) -> impl FnMut() + Send + 'static {
    move || {
        tracing::info!("Interrupt received");
        token.request_cancel();
    }
}

/// Everything a command needs to run operations: the loaded config, the
/// output mode and the process-wide cancellation token.
struct Session {
    cfg: AppConfig,
    json: bool,
    cancel: CancellationToken,
}

impl Session {
    fn new_store(&self) -> MemoryStore {
        MemoryStore::with_limits(limits_from_config(&self.cfg.security))
    }

    /// Run one configured operation on a worker, drawing its progress.
    fn drive(&self, op: ConfiguredOperation<'_, MemoryStore>) -> CliResult {
        let bar = if self.json {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(100)
        };
        let template = self
            .cfg
            .progress
            .bar_template
            .as_deref()
            .unwrap_or(DEFAULT_TEMPLATE);
        bar.set_style(ProgressStyle::with_template(template)?.progress_chars("=> "));
        bar.set_prefix(op.kind().title());

        let show_labels = self.cfg.progress.show_labels;
        let outcome = op
            .with_cancel_token(self.cancel.clone())
            .run(|event: &ProgressEvent| {
                bar.set_position(u64::from(event.percent));
                if show_labels {
                    bar.set_message(event.label.clone());
                }
            });

        match outcome {
            Outcome::Success => {
                bar.finish_and_clear();
                Ok(())
            }
            Outcome::Failure(message) => {
                bar.abandon();
                Err(message.into())
            }
        }
    }

    fn load_binary(&self, store: &mut MemoryStore, input: &Path) -> CliResult {
        self.drive(Operation::new(store).configure_import_binary(input))
    }

    fn import(
        &self,
        input: &str,
        to: &str,
        notation: Option<&str>,
        base_uri: Option<&str>,
    ) -> CliResult {
        let input = Path::new(input);
        let to = Path::new(to);
        let mut store = self.new_store();

        if notation.is_none() && is_binary_path(input) {
            self.load_binary(&mut store, input)?;
        } else {
            let notation = resolve_notation(notation, input, None)?;
            let base_uri = base_uri.unwrap_or(&self.cfg.defaults.base_uri);
            let op = Operation::new(&mut store).configure_import_text(input, notation, base_uri);
            self.drive(op)?;
        }

        self.drive(Operation::new(&mut store).configure_export_binary(to))?;

        if self.json {
            println!(
                "{}",
                serde_json::json!({ "input": input, "output": to, "triples": store.len() })
            );
        } else {
            println!(
                "Imported {} triples: {} -> {}",
                store.len(),
                input.display(),
                to.display()
            );
        }
        Ok(())
    }

    fn export(&self, input: &str, output: &str, notation: Option<&str>) -> CliResult {
        let input = Path::new(input);
        let output = Path::new(output);
        let notation = resolve_notation(notation, output, Some(self.cfg.defaults.notation))?;
        let mut store = self.new_store();

        self.load_binary(&mut store, input)?;
        self.drive(Operation::new(&mut store).configure_export_text(output, notation))?;

        if self.json {
            println!(
                "{}",
                serde_json::json!({
                    "input": input,
                    "output": output,
                    "notation": notation,
                    "triples": store.len(),
                })
            );
        } else {
            println!(
                "Exported {} triples as {}: {}",
                store.len(),
                notation,
                output.display()
            );
        }
        Ok(())
    }

    fn query(
        &self,
        input: &str,
        pattern: TriplePattern,
        output: &str,
        notation: Option<&str>,
    ) -> CliResult {
        let input = Path::new(input);
        let output = Path::new(output);
        let notation = resolve_notation(notation, output, Some(self.cfg.defaults.notation))?;
        let mut store = self.new_store();

        self.load_binary(&mut store, input)?;
        let (cursor, count) = store.search(pattern);
        self.drive(
            Operation::new(&mut store).configure_export_results(output, cursor, count, notation),
        )?;

        if self.json {
            println!(
                "{}",
                serde_json::json!({ "output": output, "notation": notation, "results": count })
            );
        } else {
            println!(
                "Exported {} results as {}: {}",
                count,
                notation,
                output.display()
            );
        }
        Ok(())
    }

    fn info(&self, input: &str) -> CliResult {
        let input = Path::new(input);
        let mut store = self.new_store();

        self.load_binary(&mut store, input)?;
        let info = store.info().ok_or("No statistics were computed")?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(info)?);
        } else {
            println!("File: {}", input.display());
            println!("Triples: {}", info.triples);
            println!("Subjects: {}", info.subjects);
            println!("Predicates: {}", info.predicates);
            println!("Objects: {}", info.objects);
            for (predicate, count) in &info.predicate_counts {
                println!("  {} {}", count, predicate);
            }
        }
        Ok(())
    }
}

fn resolve_notation(
    flag: Option<&str>,
    path: &Path,
    fallback: Option<Notation>,
) -> Result<Notation, String> {
    match flag {
        Some(name) => Notation::parse(name).ok_or_else(|| format!("Unknown notation: {}", name)),
        None => Notation::from_path(path).or(fallback).ok_or_else(|| {
            format!(
                "Cannot detect notation of {}; pass --notation",
                path.display()
            )
        }),
    }
}

fn run_config(action: &ConfigAction, json: bool) -> CliResult {
    match action {
        ConfigAction::Init => {
            let path = config_path().ok_or("Could not determine config directory")?;
            save_config_to(&AppConfig::default(), &path)?;
            if json {
                println!("{}", serde_json::json!({ "path": path }));
            } else {
                println!("Wrote default config to {}", path.display());
            }
        }
        ConfigAction::Show => {
            let cfg = load_config();
            if json {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            } else {
                println!("{}", toml::to_string_pretty(&cfg)?);
            }
        }
        ConfigAction::Set { key, value } => {
            let path = config_path().ok_or("Could not determine config directory")?;
            let mut cfg = if path.exists() {
                load_config_from(&path)?
            } else {
                AppConfig::default()
            };

            set_config_key(&mut cfg, key, value)?;
            save_config_to(&cfg, &path)?;
            if !json {
                println!("Updated {}", key);
            }
        }
    }
    Ok(())
}
