use clap::Parser;
use std::path::PathBuf;

/// Import cotisation payments into the association ledger
#[derive(Parser, Debug)]
#[command(name = "cotisation-ledger")]
#[command(about = "Import cotisation payments into the association ledger", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing the payment export
    #[arg(value_name = "INPUT", help = "Path to the payment export CSV file")]
    pub input_file: PathBuf,

    /// Existing member roster to preload before the import
    #[arg(
        long = "members",
        value_name = "ROSTER",
        help = "Path to a member roster CSV to preload"
    )]
    pub members_file: Option<PathBuf>,

    /// Phone of the acting user, checked against the roster's roles
    #[arg(
        long = "actor",
        value_name = "ACTOR",
        default_value = "admin",
        help = "Acting user recorded in the audit trail"
    )]
    pub actor: String,
}
