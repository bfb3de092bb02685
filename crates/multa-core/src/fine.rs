//! Fine records, their identifiers, and the validated registration input.

use crate::errors::{MultaError, Result};
use crate::state::FineState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper bound on a registered cost, in whole currency units.
pub const MAX_COST: u64 = 100_000_000;

/// Maximum length of a location or a status-change reason.
pub const MAX_TEXT_LEN: usize = 500;

/// Ledger-assigned fine identifier. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct FineId(u64);

impl FineId {
    /// Create a fine id, rejecting zero.
    pub fn new(value: u64) -> Result<Self> {
        if value == 0 {
            return Err(MultaError::validation("Fine ID must be a positive integer"));
        }
        Ok(Self(value))
    }

    /// Raw numeric value.
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for FineId {
    type Error = MultaError;

    fn try_from(value: u64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<FineId> for u64 {
    fn from(id: FineId) -> Self {
        id.0
    }
}

impl FromStr for FineId {
    type Err = MultaError;

    fn from_str(s: &str) -> Result<Self> {
        let value = s
            .trim()
            .parse::<u64>()
            .map_err(|_| MultaError::validation(format!("Invalid Fine ID format: {s}")))?;
        Self::new(value)
    }
}

impl fmt::Display for FineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn parse_hex_array<const N: usize>(s: &str, what: &str) -> Result<[u8; N]> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    let bytes = hex::decode(digits)
        .map_err(|e| MultaError::validation(format!("Invalid {what} {s}: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| MultaError::validation(format!("Invalid {what} {s}: expected {N} bytes")))
}

/// 20-byte ledger account address.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct LedgerAddress(pub [u8; 20]);

impl LedgerAddress {
    /// The zero address.
    pub const ZERO: LedgerAddress = LedgerAddress([0u8; 20]);

    /// Whether this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl FromStr for LedgerAddress {
    type Err = MultaError;

    fn from_str(s: &str) -> Result<Self> {
        parse_hex_array::<20>(s.trim(), "ledger address").map(Self)
    }
}

impl TryFrom<String> for LedgerAddress {
    type Error = MultaError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<LedgerAddress> for String {
    fn from(address: LedgerAddress) -> Self {
        address.to_string()
    }
}

impl fmt::Display for LedgerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// 32-byte transaction hash, rendered as `0x` + 64 hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash(pub [u8; 32]);

impl FromStr for TxHash {
    type Err = MultaError;

    fn from_str(s: &str) -> Result<Self> {
        parse_hex_array::<32>(s.trim(), "transaction hash").map(Self)
    }
}

impl TryFrom<String> for TxHash {
    type Error = MultaError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TxHash> for String {
    fn from(hash: TxHash) -> Self {
        hash.to_string()
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Vehicle plate: three letters then three digits, upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlateNumber(String);

impl PlateNumber {
    /// Normalize and validate a plate.
    pub fn parse(value: &str) -> Result<Self> {
        let upper = value.trim().to_ascii_uppercase();
        if upper.is_empty() {
            return Err(MultaError::validation("Plate number cannot be empty"));
        }
        let bytes = upper.as_bytes();
        let well_formed = bytes.len() == 6
            && bytes[..3].iter().all(u8::is_ascii_uppercase)
            && bytes[3..].iter().all(u8::is_ascii_digit);
        if !well_formed {
            return Err(MultaError::validation(
                "Invalid plate number format. Expected format: ABC123 (3 letters + 3 numbers)",
            ));
        }
        Ok(Self(upper))
    }

    /// Borrow the normalized plate.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlateNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Infraction codes accepted at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum InfractionType {
    ExcesoVelocidad,
    SemaforoRojo,
    EstacionamientoProhibido,
    ConducirEmbriagado,
    NoRespetarPasoPeatonal,
    UsoCelular,
    NoUsarCinturon,
    ConducirSinLicencia,
    Otro,
}

impl InfractionType {
    /// Every accepted code.
    pub const ALL: [InfractionType; 9] = [
        Self::ExcesoVelocidad,
        Self::SemaforoRojo,
        Self::EstacionamientoProhibido,
        Self::ConducirEmbriagado,
        Self::NoRespetarPasoPeatonal,
        Self::UsoCelular,
        Self::NoUsarCinturon,
        Self::ConducirSinLicencia,
        Self::Otro,
    ];

    /// Wire code stored on the ledger.
    pub fn code(self) -> &'static str {
        match self {
            Self::ExcesoVelocidad => "EXCESO_VELOCIDAD",
            Self::SemaforoRojo => "SEMAFORO_ROJO",
            Self::EstacionamientoProhibido => "ESTACIONAMIENTO_PROHIBIDO",
            Self::ConducirEmbriagado => "CONDUCIR_EMBRIAGADO",
            Self::NoRespetarPasoPeatonal => "NO_RESPETAR_PASO_PEATONAL",
            Self::UsoCelular => "USO_CELULAR",
            Self::NoUsarCinturon => "NO_USAR_CINTURON",
            Self::ConducirSinLicencia => "CONDUCIR_SIN_LICENCIA",
            Self::Otro => "OTRO",
        }
    }
}

impl FromStr for InfractionType {
    type Err = MultaError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s
            .trim()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|t| t.code() == normalized)
            .ok_or_else(|| {
                let codes: Vec<_> = Self::ALL.iter().map(|t| t.code()).collect();
                MultaError::validation(format!(
                    "Invalid infraction type: {s}. Must be one of: {}",
                    codes.join(", ")
                ))
            })
    }
}

impl fmt::Display for InfractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Unvalidated registration fields as they arrive from the request layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FineFields {
    /// Vehicle plate
    pub plate_number: String,
    /// Free-text location
    pub location: String,
    /// Infraction code
    pub infraction_type: String,
    /// Cost in whole currency units
    pub cost: u64,
    /// Vehicle owner identifier
    pub owner_identifier: String,
    /// Optional identifier in an external system
    #[serde(default)]
    pub external_system_id: Option<String>,
}

/// Registration payload that passed validation and carries its evidence CID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFine {
    /// Normalized plate
    pub plate_number: PlateNumber,
    /// Evidence content identifier
    pub evidence_cid: String,
    /// Location text
    pub location: String,
    /// Infraction code
    pub infraction_type: InfractionType,
    /// Cost, `0..=MAX_COST`
    pub cost: u64,
    /// Owner identifier
    pub owner_identifier: String,
    /// External identifier, empty when absent
    pub external_system_id: String,
}

impl FineFields {
    /// Validate everything except the evidence identifier.
    pub fn validate(&self) -> Result<()> {
        PlateNumber::parse(&self.plate_number)?;
        self.infraction_type.parse::<InfractionType>()?;
        validate_text("Location", &self.location)?;
        if self.owner_identifier.trim().is_empty() {
            return Err(MultaError::validation("Owner identifier is required"));
        }
        if self.cost > MAX_COST {
            return Err(MultaError::validation(format!("Cost cannot exceed {MAX_COST}")));
        }
        Ok(())
    }

    /// Validate and bind to an uploaded evidence identifier.
    pub fn into_new_fine(self, evidence_cid: &crate::EvidenceCid) -> Result<NewFine> {
        self.validate()?;
        Ok(NewFine {
            plate_number: PlateNumber::parse(&self.plate_number)?,
            evidence_cid: evidence_cid.as_str().to_string(),
            location: self.location.trim().to_string(),
            infraction_type: self.infraction_type.parse()?,
            cost: self.cost,
            owner_identifier: self.owner_identifier.trim().to_string(),
            external_system_id: self.external_system_id.unwrap_or_default(),
        })
    }
}

/// Reject empty or oversized free text.
pub fn validate_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MultaError::validation(format!("{field} cannot be empty")));
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(MultaError::validation(format!(
            "{field} is too long (max {MAX_TEXT_LEN} characters)"
        )));
    }
    Ok(())
}

/// A fine as recorded on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fine {
    /// Ledger-assigned id
    pub id: FineId,
    /// Plate as stored
    pub plate_number: String,
    /// Evidence CID as stored
    #[serde(rename = "evidenceCID")]
    pub evidence_cid: String,
    /// Location text
    pub location: String,
    /// Infraction code as stored
    pub infraction_type: String,
    /// Cost in whole currency units
    pub cost: u64,
    /// Owner identifier
    pub owner_identifier: String,
    /// Current status
    pub current_state: FineState,
    /// Registrar account
    pub registered_by: LedgerAddress,
    /// Registration time, unix seconds
    #[serde(rename = "timestamp")]
    pub registered_at: u64,
    /// External identifier, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_system_id: Option<String>,
}

/// One entry of a fine's append-only status log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    /// Fine the entry belongs to
    pub fine_id: FineId,
    /// Status before the update
    pub old_state: FineState,
    /// Status after the update
    pub new_state: FineState,
    /// Free-text reason
    pub reason: String,
    /// Account that submitted the update
    pub updated_by: LedgerAddress,
    /// Update time, unix seconds
    pub timestamp: u64,
}

/// Block and time at which a fine was registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDetails {
    /// Block number
    pub block_number: u64,
    /// Unix seconds
    pub timestamp: u64,
}

/// How a registration's fine id was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "id", rename_all = "snake_case")]
pub enum RegisteredFineId {
    /// Read from the `FineRegistered` event in the confirmation.
    Found(FineId),
    /// Read from the fine count after confirmation. Not safe when another
    /// registration is confirmed in the same window.
    DerivedFromCount(FineId),
}

/// Derivation path of a registered fine id, without the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FineIdSource {
    /// `FineRegistered` event
    Found,
    /// Fine count after confirmation
    DerivedFromCount,
}

impl RegisteredFineId {
    /// The id regardless of how it was obtained.
    pub fn id(self) -> FineId {
        match self {
            Self::Found(id) | Self::DerivedFromCount(id) => id,
        }
    }

    /// How the id was obtained.
    pub fn source(self) -> FineIdSource {
        match self {
            Self::Found(_) => FineIdSource::Found,
            Self::DerivedFromCount(_) => FineIdSource::DerivedFromCount,
        }
    }
}

/// Outcome of a confirmed registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FineRegistration {
    /// Assigned id and derivation path
    pub fine_id: RegisteredFineId,
    /// Registration transaction
    pub transaction_hash: TxHash,
}
