//! CSV format handling for payment exports and roster files
//!
//! This module centralizes all CSV format concerns, providing:
//! - Field parsers for the export's date, amount, and direction encodings
//! - MemberCsvRecord structure for roster deserialization
//! - Roster output serialization
//!
//! All functions are pure (no I/O beyond the writer argument) for easy
//! testing.

use crate::types::{LedgerError, Member};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// French short-month token to month number
///
/// Tokens arrive lowercased with any trailing dot already stripped. Both
/// accented and plain-ascii spellings occur in the wild.
fn month_number(token: &str) -> Option<u32> {
    match token {
        "janv" | "jan" => Some(1),
        "févr" | "fevr" | "fév" | "fev" => Some(2),
        "mars" => Some(3),
        "avr" => Some(4),
        "mai" => Some(5),
        "juin" => Some(6),
        "juil" => Some(7),
        "août" | "aout" => Some(8),
        "sept" | "sep" => Some(9),
        "oct" => Some(10),
        "nov" => Some(11),
        "déc" | "dec" => Some(12),
        _ => None,
    }
}

/// Parse a movement date from a payment export
///
/// The primary format is `D-MMM-YY` with French month abbreviations, e.g.
/// `2-oct.-25`; two-digit years map into the 2000s. ISO (`2025-10-02`) and
/// day-first slash dates (`02/10/2025`) are accepted as fallbacks for the
/// alternate export variant.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let parts: Vec<&str> = raw.split('-').collect();
    if parts.len() == 3 {
        if let Ok(day) = parts[0].trim().parse::<u32>() {
            let token = parts[1].trim().trim_end_matches('.').to_lowercase();
            if let Some(month) = month_number(&token) {
                if let Ok(mut year) = parts[2].trim().parse::<i32>() {
                    if (0..100).contains(&year) {
                        year += 2000;
                    }
                    return NaiveDate::from_ymd_opt(year, month, day);
                }
            }
        }
    }

    for format in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    None
}

/// Parse a movement amount
///
/// Accepts a decimal comma or point. Only strictly positive amounts are
/// valid; the direction column carries the sign. The result is rounded to
/// two decimal places.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let normalized = raw.trim().replace(',', ".");
    let value = Decimal::from_str(&normalized).ok()?;
    if value <= Decimal::ZERO {
        return None;
    }
    Some(value.round_dp(2))
}

/// CSV record structure for roster deserialization
///
/// Matches the roster format with columns: phone, lastname, firstname,
/// membertype, mentor, currentstatute, balance. The mentor and birthdate
/// columns are optional.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MemberCsvRecord {
    pub phone: String,
    pub lastname: String,
    pub firstname: String,
    pub membertype: String,
    #[serde(default)]
    pub mentor: Option<String>,
    pub currentstatute: String,
    pub balance: String,
    #[serde(default)]
    pub birthdate: Option<String>,
}

/// Convert a MemberCsvRecord to a Member
///
/// # Errors
///
/// Returns `BadInput` when the phone is empty or the role, status, balance,
/// or birthdate fields fail to parse.
pub fn convert_member_record(record: MemberCsvRecord) -> Result<Member, LedgerError> {
    if record.phone.trim().is_empty() {
        return Err(LedgerError::bad_input("roster row without a phone"));
    }

    let mut member = Member::provisioned(
        record.phone.trim(),
        record.firstname.trim(),
        record.lastname.trim(),
        "roster",
    );
    member.membertype = record
        .membertype
        .parse()
        .map_err(LedgerError::bad_input)?;
    member.currentstatute = record
        .currentstatute
        .parse()
        .map_err(LedgerError::bad_input)?;
    member.balance = Decimal::from_str(&record.balance.trim().replace(',', "."))
        .map_err(|_| {
            LedgerError::bad_input(format!(
                "Invalid balance '{}' for phone {}",
                record.balance, record.phone
            ))
        })?
        .round_dp(2);
    if let Some(mentor) = record.mentor.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        member.mentor = mentor.to_string();
    }
    if let Some(raw) = record.birthdate.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
        member.birthdate = parse_date(raw).ok_or_else(|| {
            LedgerError::bad_input(format!(
                "Invalid birthdate '{}' for phone {}",
                raw, record.phone
            ))
        })?;
    }

    Ok(member)
}

/// Read a member roster from CSV
///
/// # Errors
///
/// Returns the first row-level conversion failure; a roster is trusted
/// operator input, so unlike the payment import it is all-or-nothing.
pub fn read_members_csv<R: std::io::Read>(reader: R) -> Result<Vec<Member>, LedgerError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut members = Vec::new();
    for record in csv_reader.deserialize::<MemberCsvRecord>() {
        members.push(convert_member_record(record?)?);
    }
    Ok(members)
}

/// Write member states to CSV format
///
/// Writes members in CSV format with columns: phone, lastname, firstname,
/// membertype, mentor, currentstatute, balance. Callers pass members already
/// sorted by phone for deterministic output.
pub fn write_members_csv(members: &[Member], output: &mut dyn Write) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);

    writer
        .write_record([
            "phone",
            "lastname",
            "firstname",
            "membertype",
            "mentor",
            "currentstatute",
            "balance",
        ])
        .map_err(|e| LedgerError::io(format!("Failed to write CSV header: {}", e)))?;

    for member in members {
        writer
            .write_record(&[
                member.phone.clone(),
                member.lastname.clone(),
                member.firstname.clone(),
                member.membertype.to_string(),
                member.mentor.clone(),
                member.currentstatute.to_string(),
                format!("{:.2}", member.balance),
            ])
            .map_err(|e| LedgerError::io(format!("Failed to write member record: {}", e)))?;
    }

    writer
        .flush()
        .map_err(|e| LedgerError::io(format!("Failed to flush output: {}", e)))?;
    Ok(())
}
