//! Member-related types for the cotisation ledger
//!
//! This module defines the Member record, the closed role and status enums,
//! and the death declaration sibling record. Roles carry a small capability
//! set checked at the boundary; the ledger core itself never inspects roles.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Password marker stored on auto-provisioned members so no login can ever
/// succeed against the row until an administrator sets a real credential.
pub const NO_LOGIN_MARKER: &str = "NO_LOGIN_CREATED";

/// Member role
///
/// Closed set of roles replacing the ad hoc string tuples of role checks.
/// Capabilities are derived from the role once, at the boundary, before any
/// ledger operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberType {
    /// Ordinary member sponsored by a mentor
    Membre,
    /// Member without a sponsoring mentor
    Independant,
    /// Sponsor allowed to create members in their own group
    Mentor,
    /// Association administrator
    Admin,
}

impl MemberType {
    /// Whether this role may create member records (mentor-delegated creation)
    pub fn can_create_members(self) -> bool {
        matches!(self, MemberType::Mentor | MemberType::Admin)
    }

    /// Whether this role may run the bulk cotisation import
    pub fn can_import(self) -> bool {
        matches!(self, MemberType::Admin)
    }

    /// Whether this role may correct or delete movement rows
    pub fn can_correct_movements(self) -> bool {
        matches!(self, MemberType::Admin)
    }
}

impl fmt::Display for MemberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MemberType::Membre => "membre",
            MemberType::Independant => "independant",
            MemberType::Mentor => "mentor",
            MemberType::Admin => "admin",
        };
        f.write_str(label)
    }
}

impl FromStr for MemberType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "membre" => Ok(MemberType::Membre),
            "independant" => Ok(MemberType::Independant),
            "mentor" => Ok(MemberType::Mentor),
            "admin" => Ok(MemberType::Admin),
            other => Err(format!("Invalid member type: '{}'", other)),
        }
    }
}

/// Member lifecycle status
///
/// The reconciler only ever performs one transition on its own: `Actif` to
/// `Inactif` when a movement drives the balance strictly below zero. All
/// other transitions belong to external administrative screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Probatoire,
    Actif,
    Inactif,
    Suspendu,
    #[serde(rename = "radié")]
    Radie,
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MemberStatus::Probatoire => "probatoire",
            MemberStatus::Actif => "actif",
            MemberStatus::Inactif => "inactif",
            MemberStatus::Suspendu => "suspendu",
            MemberStatus::Radie => "radié",
        };
        f.write_str(label)
    }
}

impl FromStr for MemberStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "probatoire" => Ok(MemberStatus::Probatoire),
            "actif" => Ok(MemberStatus::Actif),
            "inactif" => Ok(MemberStatus::Inactif),
            "suspendu" => Ok(MemberStatus::Suspendu),
            "radié" | "radie" => Ok(MemberStatus::Radie),
            other => Err(format!("Invalid member status: '{}'", other)),
        }
    }
}

/// Member record
///
/// One row per phone number; the phone is the immutable business key. The
/// balance is the authoritative running sum of all applied movements for that
/// phone and is only ever adjusted incrementally by the reconciler, never
/// recomputed from the movement log.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    /// Unique phone number (business key)
    pub phone: String,
    pub membertype: MemberType,
    /// Phone of the sponsoring member, or "admin" for unsponsored rows
    pub mentor: String,
    pub lastname: String,
    pub firstname: String,
    pub birthdate: NaiveDate,
    pub id_type: String,
    pub currentstatute: MemberStatus,
    /// Running balance in currency units, 2 decimal places
    pub balance: Decimal,
    pub membership_date: NaiveDate,
    /// Date of last mutation (audit)
    pub updatedate: NaiveDate,
    /// User responsible for the last mutation (audit)
    pub updateuser: String,
    /// Opaque credential hash; the core never derives or verifies it
    pub password_hash: String,
}

impl Member {
    /// Create a minimal member row for an unknown phone seen during import
    ///
    /// Mirrors the defaults used when a payment references a phone with no
    /// member record: ordinary role, system mentor, `actif` status, a
    /// placeholder birthdate and id type, zero balance, and a non-usable
    /// password marker.
    pub fn provisioned(phone: &str, firstname: &str, lastname: &str, updateuser: &str) -> Self {
        let today = chrono::Local::now().date_naive();
        Member {
            phone: phone.to_string(),
            membertype: MemberType::Membre,
            mentor: "admin".to_string(),
            lastname: lastname.to_string(),
            firstname: firstname.to_string(),
            // Placeholder birthdate for auto-provisioned rows
            birthdate: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(today),
            id_type: "N/A".to_string(),
            currentstatute: MemberStatus::Actif,
            balance: Decimal::ZERO,
            membership_date: today,
            updatedate: today,
            updateuser: updateuser.to_string(),
            password_hash: NO_LOGIN_MARKER.to_string(),
        }
    }

    /// Create a member through mentor-delegated creation
    ///
    /// New members sponsored this way always start as ordinary `membre` rows
    /// in `probatoire` status, with the creating user recorded as mentor.
    #[allow(clippy::too_many_arguments)]
    pub fn sponsored(
        phone: &str,
        lastname: &str,
        firstname: &str,
        birthdate: NaiveDate,
        id_type: &str,
        password_hash: &str,
        mentor: &str,
    ) -> Self {
        let today = chrono::Local::now().date_naive();
        Member {
            phone: phone.to_string(),
            membertype: MemberType::Membre,
            mentor: mentor.to_string(),
            lastname: lastname.to_string(),
            firstname: firstname.to_string(),
            birthdate,
            id_type: id_type.to_string(),
            currentstatute: MemberStatus::Probatoire,
            balance: Decimal::ZERO,
            membership_date: today,
            updatedate: today,
            updateuser: mentor.to_string(),
            password_hash: password_hash.to_string(),
        }
    }
}

/// Death declaration
///
/// Informational record sharing the member store; it never affects balances
/// or statuses.
#[derive(Debug, Clone, PartialEq)]
pub struct DeathDeclaration {
    pub phone: String,
    pub date_deces: NaiveDate,
    pub declared_by: String,
    /// Correlation reference of the form `DC-<hex10>`
    pub reference: String,
}
