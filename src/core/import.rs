//! Bulk cotisation import pipeline
//!
//! Ingests a payment export, validates row by row, and feeds each valid row
//! through the reconciler. One bad row never aborts the batch: validation
//! failures become counted skips with a logged reason, and only file-level
//! problems (unreadable input, required columns missing from the header) fail
//! the whole operation before any row is processed.
//!
//! Rows are applied strictly in file order and each row commits on its own,
//! so a failure partway leaves the earlier rows' effects in place. The stats
//! returned to the caller make that partial success explicit.

use crate::core::reconciler;
use crate::core::Ledger;
use crate::io::csv_format;
use crate::types::{Direction, LedgerError, Member, NewMovement};
use csv::StringRecord;
use std::collections::HashMap;

/// Columns every export variant must carry
const REQUIRED_COLUMNS: [&str; 7] = [
    "phone",
    "firstname",
    "lastname",
    "date",
    "amount",
    "debitcredit",
    "reference",
];

/// Aggregate counters for one import run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    /// Data rows seen, whatever their fate
    pub total_rows: usize,
    /// Movements inserted into the log
    pub inserted: usize,
    /// Rows whose dedup key was already in the log
    pub skipped_duplicates: usize,
    /// Members auto-provisioned for unknown phones
    pub created_members: usize,
    /// Balance updates applied (one per inserted movement)
    pub updated_balances: usize,
    /// Members flipped from actif to inactif by this run
    pub flagged_inactive: usize,
    /// Rows skipped for validation failures
    pub failed_rows: usize,
}

/// Fate of one data row
enum RowOutcome {
    Applied {
        created_member: bool,
        flagged_inactive: bool,
    },
    Duplicate,
}

/// Run an import over raw CSV text
///
/// Header names are lowercased and whitespace-trimmed before matching, and a
/// leading UTF-8 byte order mark is tolerated. The `payment_id` and `libelle`
/// columns are optional; when `payment_id` is present the export is treated
/// as the richer schema variant and the field becomes a second dedup key.
///
/// # Errors
///
/// Returns `MissingColumns` when a required column is absent and `BadInput`
/// when the header itself cannot be read. Row-level problems never surface
/// as errors.
pub fn run(ledger: &Ledger, content: &str, actor: &str) -> Result<ImportStats, LedgerError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let columns: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(index, header)| (header.trim().to_lowercase(), index))
        .collect();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !columns.contains_key(*column))
        .collect();
    if !missing.is_empty() {
        return Err(LedgerError::missing_columns(&missing));
    }

    let mut stats = ImportStats::default();
    for record in reader.records() {
        stats.total_rows += 1;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                stats.failed_rows += 1;
                tracing::warn!(reason = %e, "skipping unreadable row");
                continue;
            }
        };

        match import_row(ledger, &columns, &record, actor) {
            Ok(RowOutcome::Applied {
                created_member,
                flagged_inactive,
            }) => {
                stats.inserted += 1;
                stats.updated_balances += 1;
                if created_member {
                    stats.created_members += 1;
                }
                if flagged_inactive {
                    stats.flagged_inactive += 1;
                }
            }
            Ok(RowOutcome::Duplicate) => {
                stats.skipped_duplicates += 1;
            }
            Err(reason) => {
                stats.failed_rows += 1;
                tracing::warn!(row = ?record, %reason, "skipping row");
            }
        }
    }

    tracing::info!(
        total_rows = stats.total_rows,
        inserted = stats.inserted,
        skipped_duplicates = stats.skipped_duplicates,
        created_members = stats.created_members,
        flagged_inactive = stats.flagged_inactive,
        failed_rows = stats.failed_rows,
        "import finished"
    );
    Ok(stats)
}

/// Validate and apply one data row
///
/// The `Err` arm is a skip reason for the audit log, not a batch failure.
fn import_row(
    ledger: &Ledger,
    columns: &HashMap<String, usize>,
    record: &StringRecord,
    actor: &str,
) -> Result<RowOutcome, String> {
    let field = |name: &str| {
        columns
            .get(name)
            .and_then(|&index| record.get(index))
            .unwrap_or("")
            .trim()
    };

    let phone = field("phone");
    if phone.is_empty() {
        return Err("empty phone".to_string());
    }
    let firstname = field("firstname");
    let lastname = field("lastname");
    if firstname.is_empty() || lastname.is_empty() {
        return Err("empty firstname or lastname".to_string());
    }
    let reference = field("reference");
    if reference.is_empty() {
        return Err("empty reference".to_string());
    }
    // Present column, empty value is a skip; absent column means the plain
    // schema and no second dedup key
    let payment_id = if columns.contains_key("payment_id") {
        let value = field("payment_id");
        if value.is_empty() {
            return Err("empty payment_id".to_string());
        }
        Some(value.to_string())
    } else {
        None
    };

    let mvt_date = csv_format::parse_date(field("date"))
        .ok_or_else(|| format!("unparseable date '{}'", field("date")))?;
    let amount = csv_format::parse_amount(field("amount"))
        .ok_or_else(|| format!("invalid amount '{}'", field("amount")))?;
    let direction = Direction::parse(field("debitcredit"))
        .ok_or_else(|| format!("invalid debitcredit '{}'", field("debitcredit")))?;

    // Advisory pre-check so duplicates are counted rather than treated as
    // insert failures; the log's unique index stays the real gate
    if ledger.movements.contains_dedup_key(reference)
        || payment_id
            .as_deref()
            .is_some_and(|key| ledger.movements.contains_dedup_key(key))
    {
        return Ok(RowOutcome::Duplicate);
    }

    let created_member = ledger
        .members
        .insert_if_absent(Member::provisioned(phone, firstname, lastname, actor));
    if created_member {
        tracing::info!(phone, "auto-provisioned member for unknown phone");
    }

    let libelle = field("libelle");
    let movement_id = match ledger.movements.insert(NewMovement {
        phone: phone.to_string(),
        firstname: firstname.to_string(),
        lastname: lastname.to_string(),
        mvt_date,
        amount,
        direction,
        reference: reference.to_string(),
        payment_id,
        libelle: libelle.to_string(),
        updated_by: actor.to_string(),
    }) {
        Ok(id) => id,
        // Lost a race with a concurrent import of the same row
        Err(LedgerError::DuplicateReference { .. }) => return Ok(RowOutcome::Duplicate),
        Err(e) => return Err(e.to_string()),
    };

    match reconciler::apply_movement(&ledger.members, phone, amount, direction, actor) {
        Ok(applied) => Ok(RowOutcome::Applied {
            created_member,
            flagged_inactive: applied.flagged_inactive,
        }),
        Err(e) => {
            ledger.movements.remove(movement_id);
            Err(e.to_string())
        }
    }
}
