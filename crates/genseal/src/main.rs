use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing::info;
use tracing_subscriber::EnvFilter;

use gs_core::{check_document, CheckedEntry, GitSource, Pipeline, SealError, TrustDocument, Whitelist};
use gs_git::Repository;
use gs_gpg::Gpg;

#[derive(Parser, Debug)]
#[command(
    name = "genseal",
    version,
    about = "Seal the genesis history of a git ledger into a trust document"
)]
struct Cli {
    /// Diagnostic log level (logs go to stderr)
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn, env = "GENSEAL_LOG")]
    log_level: LogLevel,

    /// gpg executable used for verification and key export
    #[arg(long, global = true, default_value = "gpg", env = "GENSEAL_GPG")]
    gpg: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Verify every commit and emit the trust document
    Seal {
        /// Repository to seal
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        /// File of commit hashes trusted without a signature, one per line
        #[arg(long)]
        whitelist: Option<PathBuf>,
        /// Revision to walk from instead of HEAD
        #[arg(long)]
        rev: Option<String>,
        /// Write the document here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Number of signatures verified concurrently
        #[arg(long, default_value_t = 1)]
        jobs: usize,
        /// Keyring directory holding the signers' public keys
        #[arg(long, env = "GNUPGHOME")]
        gnupg_home: Option<PathBuf>,
    },
    /// Re-verify a trust document against the keys it embeds
    Check {
        /// Trust document to check
        document: PathBuf,
    },
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn initialize_tracing(log_level: &LogLevel) {
    // stdout carries the document, so logs must go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level.to_filter_directive()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    initialize_tracing(&cli.log_level);

    let result = match cli.command {
        Commands::Seal {
            repo,
            whitelist,
            rev,
            output,
            jobs,
            gnupg_home,
        } => {
            let mut gpg = Gpg::with_program(&cli.gpg);
            if let Some(home) = gnupg_home {
                gpg = gpg.with_home(home);
            }
            seal_command(
                &repo,
                whitelist.as_deref(),
                rev.as_deref(),
                output.as_deref(),
                jobs,
                &gpg,
            )
        }
        Commands::Check { document } => check_command(&document, &cli.gpg),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<SealError>() {
                Some(seal) => eprintln!("{}", seal.diagnostic()),
                None => eprintln!("error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn seal_command(
    repo: &Path,
    whitelist: Option<&Path>,
    rev: Option<&str>,
    output: Option<&Path>,
    jobs: usize,
    gpg: &Gpg,
) -> Result<()> {
    let repository = Repository::open(repo).map_err(|e| SealError::RepoAccessFailure {
        hash: None,
        reason: format!("{e:#}"),
    })?;
    let source = match rev {
        Some(rev) => GitSource::from_rev(repository, rev),
        None => GitSource::new(repository),
    };
    let whitelist = Whitelist::load(whitelist);
    let cancel = install_cancel_handler()?;

    let document = Pipeline::new(&source, gpg, &whitelist)
        .jobs(jobs)
        .cancel_on(&cancel)
        .run()?;
    let json = document.to_json()?;
    write_document(&json, output)?;
    info!(commits = document.commits.len(), "trust document written");
    Ok(())
}

/// SIGINT and SIGTERM raise the returned flag instead of killing the process,
/// so the run unwinds and its scratch files are removed. A second signal
/// exits immediately.
fn install_cancel_handler() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register_conditional_shutdown(signal, 130, Arc::clone(&flag))
            .context("failed to install signal handler")?;
        signal_hook::flag::register(signal, Arc::clone(&flag))
            .context("failed to install signal handler")?;
    }
    Ok(flag)
}

/// Writes the whole document or nothing: files go through a temporary
/// sibling that is renamed into place.
fn write_document(json: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let mut file = tempfile::NamedTempFile::new_in(dir)
                .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
            file.write_all(json.as_bytes())?;
            file.persist(path)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn check_command(document: &Path, gpg_program: &Path) -> Result<()> {
    let json = std::fs::read_to_string(document)
        .with_context(|| format!("failed to read {}", document.display()))?;
    let document = TrustDocument::from_json(&json)
        .with_context(|| format!("{} is not a trust document", document.display()))?;

    // Keys are imported into a throw-away keyring, never the user's.
    let home = tempfile::Builder::new()
        .prefix("genseal")
        .tempdir()
        .context("failed to create temporary keyring")?;
    let gpg = Gpg::with_program(gpg_program).with_home(home.path());
    for (key_id, armored) in &document.keys {
        gpg.import(armored)
            .with_context(|| format!("failed to import key {key_id}"))?;
    }

    let report = check_document(&document, &gpg)?;
    let mut stdout = std::io::stdout().lock();
    for entry in &report.entries {
        match entry {
            CheckedEntry::Whitelisted { hash } => writeln!(stdout, "whitelisted {hash}")?,
            CheckedEntry::Verified { hash, key_id } => writeln!(stdout, "verified {hash} {key_id}")?,
        }
    }
    writeln!(
        stdout,
        "ok: {} verified, {} whitelisted",
        report.verified(),
        report.whitelisted()
    )?;
    Ok(())
}
