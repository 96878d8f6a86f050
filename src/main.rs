//! CLI entry point for `inboxkit`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use inboxkit::config::{self, Config};
use inboxkit::error::read_json_file;
use inboxkit::model::conversation::ConversationSummary;
use inboxkit::model::raw::RawMessage;
use inboxkit::normalize::{self, ContextInput, NormalizationContext};
use inboxkit::parser::eml;
use inboxkit::threading::{self, SegmentationOptions};

/// Email thread reconstruction for helpdesk inboxes.
#[derive(Parser)]
#[command(name = "inboxkit", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Address that belongs to an agent (repeatable)
    #[arg(long = "agent-email", value_name = "EMAIL", global = true)]
    agent_emails: Vec<String>,

    /// Phone number that belongs to an agent (repeatable)
    #[arg(long = "agent-phone", value_name = "PHONE", global = true)]
    agent_phones: Vec<String>,

    /// Organization domain; any sender under it is an agent (repeatable)
    #[arg(long = "org-domain", value_name = "DOMAIN", global = true)]
    org_domains: Vec<String>,

    /// Address of the person running the tool, labelled "You"
    #[arg(long, value_name = "EMAIL", env = "INBOXKIT_CURRENT_USER", global = true)]
    current_user: Option<String>,

    /// Single-line JSON output
    #[arg(long, global = true)]
    compact: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a JSON array of raw messages
    Normalize {
        file: PathBuf,
        /// Collapse duplicate deliveries
        #[arg(long)]
        dedup: bool,
        /// Expand quoted history into separate cards
        #[arg(long)]
        cards: bool,
    },
    /// Group a JSON array of conversations into threads
    Group {
        file: PathBuf,
        /// Only report whether any two conversations share a thread
        #[arg(long)]
        check: bool,
    },
    /// Print the ids of candidate messages that belong to a seed thread
    Match {
        /// JSON array of messages known to be in the thread
        seed: PathBuf,
        /// JSON array of messages to test
        candidates: PathBuf,
        /// Inbox address; never counts as a shared participant
        #[arg(long, value_name = "EMAIL")]
        inbox: Option<String>,
    },
    /// Convert .eml files (or directories of them) into raw message JSON
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let ctx = build_context(&cli, &config);
    let pretty = config.output.pretty && !cli.compact;

    match cli.command {
        Commands::Normalize { file, dedup, cards } => cmd_normalize(&file, &ctx, dedup, cards, pretty),
        Commands::Group { file, check } => cmd_group(&file, check, pretty),
        Commands::Match {
            seed,
            candidates,
            inbox,
        } => cmd_match(&seed, &candidates, inbox.as_deref(), pretty),
        Commands::Ingest { paths, output } => cmd_ingest(&paths, output.as_deref(), pretty),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_file = config::log_file_path(config);
    let file_target = log_file
        .parent()
        .zip(log_file.file_name())
        .filter(|(dir, _)| std::fs::create_dir_all(dir).is_ok());

    if let Some((dir, name)) = file_target {
        let file_appender = tracing_appender::rolling::never(dir, name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Configured classification lists, extended by the command-line flags.
fn build_context(cli: &Cli, config: &Config) -> NormalizationContext {
    let mut input: ContextInput = config.classification.clone();
    input.agent_emails.extend(cli.agent_emails.iter().cloned());
    input.agent_phones.extend(cli.agent_phones.iter().cloned());
    input.org_domains.extend(cli.org_domains.iter().cloned());
    if let Some(ref me) = cli.current_user {
        input.current_user_email = Some(me.clone());
    }
    normalize::create_normalization_context(input)
}

/// Serialize `value` to stdout or to `output`.
fn write_json<T: Serialize>(value: &T, output: Option<&Path>, pretty: bool) -> anyhow::Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, json + "\n")?;
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Normalize raw messages, optionally deduplicating and expanding cards.
fn cmd_normalize(
    path: &Path,
    ctx: &NormalizationContext,
    dedup: bool,
    cards: bool,
    pretty: bool,
) -> anyhow::Result<()> {
    let raws: Vec<RawMessage> = read_json_file(path)?;
    let start = Instant::now();

    let mut messages = normalize::normalize_messages(&raws, ctx);
    if dedup {
        messages = normalize::deduplicate_messages(messages);
    }
    if cards {
        let opts = SegmentationOptions::from(ctx);
        messages = messages
            .iter()
            .flat_map(|m| threading::segment_message_into_cards(m, &opts))
            .collect();
    }

    tracing::info!(
        input = raws.len(),
        output = messages.len(),
        elapsed = ?start.elapsed(),
        "Normalized messages"
    );
    write_json(&messages, None, pretty)
}

/// Group conversations into threads.
fn cmd_group(path: &Path, check: bool, pretty: bool) -> anyhow::Result<()> {
    let conversations: Vec<ConversationSummary> = read_json_file(path)?;

    if check {
        let answer = threading::should_group_conversations(&conversations);
        return write_json(&serde_json::json!({ "should_group": answer }), None, pretty);
    }

    let threads = threading::group_conversations_by_thread(conversations);
    write_json(&threads, None, pretty)
}

/// Print the ids of the candidates that belong to the seed thread.
fn cmd_match(
    seed_path: &Path,
    candidates_path: &Path,
    inbox: Option<&str>,
    pretty: bool,
) -> anyhow::Result<()> {
    let seed_messages: Vec<RawMessage> = read_json_file(seed_path)?;
    let candidates: Vec<RawMessage> = read_json_file(candidates_path)?;

    let seed = threading::build_thread_seed(&seed_messages, inbox);
    let matched: Vec<&str> = candidates
        .iter()
        .filter(|c| threading::message_matches_thread(c, &seed, inbox))
        .map(|c| c.id.as_str())
        .collect();

    tracing::info!(
        candidates = candidates.len(),
        matched = matched.len(),
        "Matched candidates against thread"
    );
    write_json(&matched, None, pretty)
}

/// Convert `.eml` files into raw message JSON.
fn cmd_ingest(paths: &[PathBuf], output: Option<&Path>, pretty: bool) -> anyhow::Result<()> {
    let files = collect_eml_files(paths)?;
    if files.is_empty() {
        anyhow::bail!("No .eml files found");
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Ingesting [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let mut messages = Vec::with_capacity(files.len());
    let mut skipped = 0usize;
    for file in &files {
        match eml::ingest_eml_file(file) {
            Ok(raw) => messages.push(raw),
            // Already logged by the ingester.
            Err(_) => skipped += 1,
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if skipped > 0 {
        eprintln!("  Skipped {skipped} unreadable file(s)");
    }
    write_json(&messages, output, pretty)?;
    if let Some(path) = output {
        eprintln!("  Wrote {} message(s) to {}", messages.len(), path.display());
    }
    Ok(())
}

/// Expand directories into their `.eml` files (sorted); files pass through.
fn collect_eml_files(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if !path.exists() {
            anyhow::bail!("File not found: {}", path.display());
        }
        if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| {
                    p.is_file()
                        && p.extension()
                            .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"))
                })
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "inboxkit", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
