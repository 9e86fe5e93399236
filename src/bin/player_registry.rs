//! player-registry CLI
//!
//! Builds a registry from name lists and resolves names against it.
//!
//! Usage:
//!   player-registry build --input train_names.txt --input test_names.txt
//!   player-registry resolve "Carlsen, Magnus" "李雷"
//!   player-registry inspect --registry models/name_mapping.preg
//!
//! Name files hold one raw name per line; blank lines are skipped. The
//! registry path defaults to `$PLAYER_REGISTRY_DIR/name_mapping.preg`.

use std::fs;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use player_registry::storage::persistent::DEFAULT_FILE_NAME;
use player_registry::{ClusterBuilder, FileRegistryStore, Resolver, DEFAULT_MAX_TOKENS};

#[derive(Parser, Debug)]
#[command(name = "player-registry")]
#[command(about = "Cluster player name variants into canonical ids and resolve names")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a registry from name files and write it
    Build {
        /// Name file, one name per line (repeatable, read in order)
        #[arg(long, short = 'i', required = true)]
        input: Vec<PathBuf>,

        /// Registry file to write
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        #[command(flatten)]
        location: Location,

        /// Maximum tokens per name used for blocking keys
        #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
        max_tokens: usize,

        /// Key-generation worker threads
        #[arg(long, short = 'w', default_value_t = 1)]
        workers: usize,
    },

    /// Resolve names against a registry
    Resolve {
        /// Registry file to read
        #[arg(long, short = 'r')]
        registry: Option<PathBuf>,

        #[command(flatten)]
        location: Location,

        /// Also read names from this file, after the positional ones
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,

        /// Raw names to resolve
        names: Vec<String>,
    },

    /// Print a registry file's header without loading the body
    Inspect {
        /// Registry file to read
        #[arg(long, short = 'r')]
        registry: Option<PathBuf>,

        #[command(flatten)]
        location: Location,
    },
}

#[derive(Args, Debug)]
struct Location {
    /// Directory holding the registry when no explicit path is given
    #[arg(long, env = "PLAYER_REGISTRY_DIR", default_value = ".")]
    dir: PathBuf,
}

impl Location {
    fn resolve(&self, explicit: Option<PathBuf>) -> PathBuf {
        explicit.unwrap_or_else(|| self.dir.join(DEFAULT_FILE_NAME))
    }
}

fn read_names(path: &Path, names: &mut Vec<String>) -> Result<()> {
    let file = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let before = names.len();
    for line in io::BufReader::new(file).lines() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if !line.trim().is_empty() {
            names.push(line);
        }
    }
    info!(path = %path.display(), names = names.len() - before, "read name file");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "player_registry=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Build {
            input,
            output,
            location,
            max_tokens,
            workers,
        } => {
            let mut names = Vec::new();
            for path in &input {
                read_names(path, &mut names)?;
            }

            let report = ClusterBuilder::new()
                .max_tokens(max_tokens)
                .workers(workers)
                .build_report(&names)
                .context("building registry")?;

            let path = location.resolve(output);
            let header = FileRegistryStore::new(&path)
                .save(&report.registry)
                .with_context(|| format!("writing {}", path.display()))?;

            println!("{}", report.stats);
            println!("Wrote {} (fingerprint {})", path.display(), header.fingerprint);
        }
        Command::Resolve {
            registry,
            location,
            input,
            mut names,
        } => {
            if let Some(path) = input {
                read_names(&path, &mut names)?;
            }

            let path = location.resolve(registry);
            let store = FileRegistryStore::new(&path);
            let (_, registry) = store
                .load_verified()
                .with_context(|| format!("loading {}", path.display()))?;
            let resolver = Resolver::new(registry.into_shared());

            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            for (name, id) in names.iter().zip(resolver.resolve_batch(&names)) {
                match id {
                    Some(id) => writeln!(out, "{name}\t{id}")?,
                    None => writeln!(out, "{name}\tunmapped")?,
                }
            }
            out.flush()?;
        }
        Command::Inspect { registry, location } => {
            let path = location.resolve(registry);
            let header = FileRegistryStore::new(&path)
                .inspect()
                .with_context(|| format!("reading {}", path.display()))?;

            println!("Registry {}:", path.display());
            println!("  Format version: {}", header.format_version);
            println!("  Created: {}", header.created_at.to_rfc3339());
            println!("  Keys: {}", header.entry_count);
            println!("  Clusters: {}", header.cluster_count);
            println!("  Token cap: {}", header.max_tokens);
            println!("  Fingerprint: {}", header.fingerprint);
        }
    }
    Ok(())
}
