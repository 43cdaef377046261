//! Cotisation Ledger CLI
//!
//! Command-line interface for importing cotisation payment exports into the
//! association ledger.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- payments.csv > members.csv
//! cargo run -- --members roster.csv payments.csv > members.csv
//! cargo run -- --members roster.csv --actor 555 payments.csv > members.csv
//! ```
//!
//! The program optionally preloads a member roster, runs the payment import
//! through the ledger core, and writes the resulting member states to stdout.
//! Import statistics and per-row skip reasons go to stderr via tracing;
//! verbosity is controlled with RUST_LOG.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, unreadable file, missing columns, actor
//!   not allowed to import, etc.)

use cotisation_ledger::cli;
use cotisation_ledger::core::Ledger;
use cotisation_ledger::io::csv_format;
use cotisation_ledger::types::LedgerError;
use std::fs;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse_args();
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(args: &cli::CliArgs) -> Result<(), LedgerError> {
    let ledger = Ledger::new();

    if let Some(path) = &args.members_file {
        let file = fs::File::open(path)?;
        for member in csv_format::read_members_csv(file)? {
            ledger.register_member(member)?;
        }
        tracing::info!(members = ledger.members().len(), "roster loaded");
    }

    ensure_import_allowed(&ledger, &args.actor)?;

    let content = fs::read_to_string(&args.input_file)?;
    ledger.import(&content, &args.actor)?;

    csv_format::write_members_csv(&ledger.members(), &mut std::io::stdout())
}

/// Role check at the boundary: only administrators run bulk imports
///
/// The literal "admin" actor is the system account used when no roster is
/// loaded; any other actor must resolve to a roster member whose role grants
/// the import capability.
fn ensure_import_allowed(ledger: &Ledger, actor: &str) -> Result<(), LedgerError> {
    if actor == "admin" {
        return Ok(());
    }
    match ledger.member(actor) {
        Some(member) if member.membertype.can_import() => Ok(()),
        Some(member) => Err(LedgerError::bad_input(format!(
            "user {} with role {} may not run imports",
            actor, member.membertype
        ))),
        None => Err(LedgerError::member_not_found(actor)),
    }
}
