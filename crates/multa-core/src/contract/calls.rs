//! Typed calls, results and events of the fine contract.

use super::abi::{self, ParamType, Token};
use crate::errors::{MultaError, Result};
use crate::fine::{Fine, FineId, LedgerAddress, NewFine, RegistrationDetails, StatusUpdate};
use crate::state::FineState;
use serde::{Deserialize, Serialize};

/// Canonical function signatures.
pub mod signatures {
    /// `registerFine`
    pub const REGISTER_FINE: &str = "registerFine(string,string,string,string,uint256,string,string)";
    /// `updateFineStatus`
    pub const UPDATE_FINE_STATUS: &str = "updateFineStatus(uint256,uint8,string)";
    /// `getAllFineCount`
    pub const GET_ALL_FINE_COUNT: &str = "getAllFineCount()";
    /// `getFineDetails`
    pub const GET_FINE_DETAILS: &str = "getFineDetails(uint256)";
    /// `getFinesDetails`
    pub const GET_FINES_DETAILS: &str = "getFinesDetails(uint256,uint256)";
    /// `getFinesByPlate`
    pub const GET_FINES_BY_PLATE: &str = "getFinesByPlate(string)";
    /// `getFineRegistrationDetails`
    pub const GET_FINE_REGISTRATION_DETAILS: &str = "getFineRegistrationDetails(uint256)";
    /// `getFineStatusHistory`
    pub const GET_FINE_STATUS_HISTORY: &str = "getFineStatusHistory(uint256,uint256,uint256)";
    /// `FineRegistered` event
    pub const FINE_REGISTERED: &str = "FineRegistered(uint256,string,string)";
}

/// Log emitted by a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Emitting contract
    pub address: LedgerAddress,
    /// Indexed topics, `topics[0]` is the event signature hash
    pub topics: Vec<[u8; 32]>,
    /// ABI-encoded non-indexed arguments
    pub data: Vec<u8>,
}

/// Topic hash of `FineRegistered`.
pub fn fine_registered_topic() -> [u8; 32] {
    abi::keccak256(signatures::FINE_REGISTERED.as_bytes())
}

/// Build the log the contract emits when a fine is registered.
pub fn fine_registered_log(
    contract: LedgerAddress,
    fine_id: u64,
    plate_number: &str,
    evidence_cid: &str,
) -> LogEntry {
    let mut id_topic = [0u8; 32];
    id_topic[24..].copy_from_slice(&fine_id.to_be_bytes());
    LogEntry {
        address: contract,
        topics: vec![fine_registered_topic(), id_topic],
        data: abi::encode(&[
            Token::String(plate_number.to_string()),
            Token::String(evidence_cid.to_string()),
        ]),
    }
}

/// Fine id carried by a `FineRegistered` log, if `log` is one.
pub fn decode_fine_registered(log: &LogEntry) -> Option<u64> {
    if log.topics.first() != Some(&fine_registered_topic()) {
        return None;
    }
    let id_topic = log.topics.get(1)?;
    if id_topic[..24].iter().any(|b| *b != 0) {
        return None;
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&id_topic[24..]);
    Some(u64::from_be_bytes(low)).filter(|id| *id > 0)
}

/// A call to the fine contract.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum RegistryCall {
    RegisterFine {
        plate_number: String,
        evidence_cid: String,
        location: String,
        infraction_type: String,
        cost: u64,
        owner_identifier: String,
        external_system_id: String,
    },
    UpdateFineStatus {
        fine_id: u64,
        new_state: u8,
        reason: String,
    },
    FineCount,
    FineDetails {
        fine_id: u64,
    },
    FinesDetails {
        page: u64,
        page_size: u64,
    },
    FinesByPlate {
        plate_number: String,
    },
    RegistrationDetails {
        fine_id: u64,
    },
    StatusHistory {
        fine_id: u64,
        page: u64,
        page_size: u64,
    },
}

const ALL_SIGNATURES: [&str; 8] = [
    signatures::REGISTER_FINE,
    signatures::UPDATE_FINE_STATUS,
    signatures::GET_ALL_FINE_COUNT,
    signatures::GET_FINE_DETAILS,
    signatures::GET_FINES_DETAILS,
    signatures::GET_FINES_BY_PLATE,
    signatures::GET_FINE_REGISTRATION_DETAILS,
    signatures::GET_FINE_STATUS_HISTORY,
];

impl RegistryCall {
    /// Registration call for a validated fine.
    pub fn register(fine: &NewFine) -> Self {
        Self::RegisterFine {
            plate_number: fine.plate_number.as_str().to_string(),
            evidence_cid: fine.evidence_cid.clone(),
            location: fine.location.clone(),
            infraction_type: fine.infraction_type.code().to_string(),
            cost: fine.cost,
            owner_identifier: fine.owner_identifier.clone(),
            external_system_id: fine.external_system_id.clone(),
        }
    }

    /// Canonical signature of the called function.
    pub fn signature(&self) -> &'static str {
        match self {
            Self::RegisterFine { .. } => signatures::REGISTER_FINE,
            Self::UpdateFineStatus { .. } => signatures::UPDATE_FINE_STATUS,
            Self::FineCount => signatures::GET_ALL_FINE_COUNT,
            Self::FineDetails { .. } => signatures::GET_FINE_DETAILS,
            Self::FinesDetails { .. } => signatures::GET_FINES_DETAILS,
            Self::FinesByPlate { .. } => signatures::GET_FINES_BY_PLATE,
            Self::RegistrationDetails { .. } => signatures::GET_FINE_REGISTRATION_DETAILS,
            Self::StatusHistory { .. } => signatures::GET_FINE_STATUS_HISTORY,
        }
    }

    /// Whether the call mutates ledger state.
    pub fn is_write(&self) -> bool {
        matches!(self, Self::RegisterFine { .. } | Self::UpdateFineStatus { .. })
    }

    fn arguments(&self) -> Vec<Token> {
        let uint = |v: u64| Token::Uint(u128::from(v));
        let string = |s: &str| Token::String(s.to_string());
        match self {
            Self::RegisterFine {
                plate_number,
                evidence_cid,
                location,
                infraction_type,
                cost,
                owner_identifier,
                external_system_id,
            } => vec![
                string(plate_number),
                string(evidence_cid),
                string(location),
                string(infraction_type),
                uint(*cost),
                string(owner_identifier),
                string(external_system_id),
            ],
            Self::UpdateFineStatus {
                fine_id,
                new_state,
                reason,
            } => vec![uint(*fine_id), Token::Uint(u128::from(*new_state)), string(reason)],
            Self::FineCount => vec![],
            Self::FineDetails { fine_id } | Self::RegistrationDetails { fine_id } => {
                vec![uint(*fine_id)]
            }
            Self::FinesDetails { page, page_size } => vec![uint(*page), uint(*page_size)],
            Self::FinesByPlate { plate_number } => vec![string(plate_number)],
            Self::StatusHistory {
                fine_id,
                page,
                page_size,
            } => vec![uint(*fine_id), uint(*page), uint(*page_size)],
        }
    }

    /// Selector plus encoded arguments.
    pub fn encode(&self) -> Vec<u8> {
        abi::encode_call(self.signature(), &self.arguments())
    }

    /// Parse calldata back into a call.
    pub fn decode(calldata: &[u8]) -> Result<Self> {
        if calldata.len() < 4 {
            return Err(MultaError::validation("Calldata shorter than a selector"));
        }
        let (head, body) = calldata.split_at(4);
        let signature = ALL_SIGNATURES
            .into_iter()
            .find(|sig| abi::selector(sig) == head)
            .ok_or_else(|| {
                MultaError::validation(format!("Unknown function selector 0x{}", hex::encode(head)))
            })?;

        let string = ParamType::String;
        let uint = ParamType::Uint;
        let types: Vec<ParamType> = match signature {
            signatures::REGISTER_FINE => vec![
                string.clone(),
                string.clone(),
                string.clone(),
                string.clone(),
                uint,
                string.clone(),
                string,
            ],
            signatures::UPDATE_FINE_STATUS => vec![uint.clone(), uint, string],
            signatures::GET_ALL_FINE_COUNT => vec![],
            signatures::GET_FINE_DETAILS | signatures::GET_FINE_REGISTRATION_DETAILS => vec![uint],
            signatures::GET_FINES_DETAILS => vec![uint.clone(), uint],
            signatures::GET_FINES_BY_PLATE => vec![string],
            _ => vec![uint.clone(), uint.clone(), uint],
        };
        let mut args = abi::decode(&types, body)?.into_iter();
        let mut next = || {
            args.next()
                .ok_or_else(|| MultaError::serialization("ABI: missing argument"))
        };

        let call = match signature {
            signatures::REGISTER_FINE => Self::RegisterFine {
                plate_number: next()?.into_string()?,
                evidence_cid: next()?.into_string()?,
                location: next()?.into_string()?,
                infraction_type: next()?.into_string()?,
                cost: to_u64(next()?.into_uint()?, "cost")?,
                owner_identifier: next()?.into_string()?,
                external_system_id: next()?.into_string()?,
            },
            signatures::UPDATE_FINE_STATUS => Self::UpdateFineStatus {
                fine_id: to_u64(next()?.into_uint()?, "fineId")?,
                new_state: u8::try_from(next()?.into_uint()?)
                    .map_err(|_| MultaError::validation("newState out of uint8 range"))?,
                reason: next()?.into_string()?,
            },
            signatures::GET_ALL_FINE_COUNT => Self::FineCount,
            signatures::GET_FINE_DETAILS => Self::FineDetails {
                fine_id: to_u64(next()?.into_uint()?, "fineId")?,
            },
            signatures::GET_FINE_REGISTRATION_DETAILS => Self::RegistrationDetails {
                fine_id: to_u64(next()?.into_uint()?, "fineId")?,
            },
            signatures::GET_FINES_DETAILS => Self::FinesDetails {
                page: to_u64(next()?.into_uint()?, "page")?,
                page_size: to_u64(next()?.into_uint()?, "pageSize")?,
            },
            signatures::GET_FINES_BY_PLATE => Self::FinesByPlate {
                plate_number: next()?.into_string()?,
            },
            _ => Self::StatusHistory {
                fine_id: to_u64(next()?.into_uint()?, "fineId")?,
                page: to_u64(next()?.into_uint()?, "page")?,
                page_size: to_u64(next()?.into_uint()?, "pageSize")?,
            },
        };
        Ok(call)
    }
}

fn to_u64(value: u128, field: &str) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| MultaError::ledger_read(format!("{field} value {value} exceeds 64 bits")))
}

fn state_from_raw(value: u128, field: &str) -> Result<FineState> {
    u8::try_from(value)
        .map_err(|_| MultaError::ledger_read(format!("{field} code {value} out of range")))
        .and_then(|code| {
            FineState::from_code(code)
                .map_err(|_| MultaError::ledger_read(format!("Unknown {field} code {code}")))
        })
}

fn read_failure(function: &str) -> impl Fn(MultaError) -> MultaError + '_ {
    move |e| MultaError::ledger_read(format!("Failed to decode {function} result: {e}"))
}

/// `Fine` tuple exactly as the contract returns it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct RawFine {
    pub id: u128,
    pub plate_number: String,
    pub evidence_cid: String,
    pub location: String,
    pub timestamp: u128,
    pub infraction_type: String,
    pub cost: u128,
    pub owner_identifier: String,
    pub current_state: u128,
    pub registered_by: LedgerAddress,
    pub external_system_id: String,
}

impl RawFine {
    fn param_type() -> ParamType {
        use ParamType::*;
        Tuple(vec![
            Uint, String, String, String, Uint, String, Uint, String, Uint, Address, String,
        ])
    }

    /// Unset slot: the contract returns a zeroed struct for absent entries.
    pub fn is_empty(&self) -> bool {
        self.id == 0
    }

    fn from_token(token: Token) -> Result<Self> {
        let mut fields = token.into_tuple()?.into_iter();
        let mut next = || {
            fields
                .next()
                .ok_or_else(|| MultaError::serialization("ABI: short Fine tuple"))
        };
        Ok(Self {
            id: next()?.into_uint()?,
            plate_number: next()?.into_string()?,
            evidence_cid: next()?.into_string()?,
            location: next()?.into_string()?,
            timestamp: next()?.into_uint()?,
            infraction_type: next()?.into_string()?,
            cost: next()?.into_uint()?,
            owner_identifier: next()?.into_string()?,
            current_state: next()?.into_uint()?,
            registered_by: next()?.into_address()?,
            external_system_id: next()?.into_string()?,
        })
    }

    fn to_token(&self) -> Token {
        Token::Tuple(vec![
            Token::Uint(self.id),
            Token::String(self.plate_number.clone()),
            Token::String(self.evidence_cid.clone()),
            Token::String(self.location.clone()),
            Token::Uint(self.timestamp),
            Token::String(self.infraction_type.clone()),
            Token::Uint(self.cost),
            Token::String(self.owner_identifier.clone()),
            Token::Uint(self.current_state),
            Token::Address(self.registered_by),
            Token::String(self.external_system_id.clone()),
        ])
    }

    /// Map to the domain record. Strings are taken as stored; only the
    /// id, integers and status code are checked.
    pub fn into_fine(self) -> Result<Fine> {
        let id = FineId::new(to_u64(self.id, "id")?)
            .map_err(|_| MultaError::ledger_read("Fine record has a zero id"))?;
        Ok(Fine {
            id,
            plate_number: self.plate_number,
            evidence_cid: self.evidence_cid,
            location: self.location,
            infraction_type: self.infraction_type,
            cost: to_u64(self.cost, "cost")?,
            owner_identifier: self.owner_identifier,
            current_state: state_from_raw(self.current_state, "currentState")?,
            registered_by: self.registered_by,
            registered_at: to_u64(self.timestamp, "timestamp")?,
            external_system_id: Some(self.external_system_id).filter(|s| !s.is_empty()),
        })
    }
}

impl From<&Fine> for RawFine {
    fn from(fine: &Fine) -> Self {
        Self {
            id: u128::from(fine.id.value()),
            plate_number: fine.plate_number.clone(),
            evidence_cid: fine.evidence_cid.clone(),
            location: fine.location.clone(),
            timestamp: u128::from(fine.registered_at),
            infraction_type: fine.infraction_type.clone(),
            cost: u128::from(fine.cost),
            owner_identifier: fine.owner_identifier.clone(),
            current_state: u128::from(fine.current_state.code()),
            registered_by: fine.registered_by,
            external_system_id: fine.external_system_id.clone().unwrap_or_default(),
        }
    }
}

/// `FineStatusUpdate` tuple exactly as the contract returns it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct RawStatusUpdate {
    pub last_updated_timestamp: u128,
    pub old_state: u128,
    pub new_state: u128,
    pub reason: String,
    pub updated_by: LedgerAddress,
}

impl RawStatusUpdate {
    fn param_type() -> ParamType {
        use ParamType::*;
        Tuple(vec![Uint, Uint, Uint, String, Address])
    }

    fn from_token(token: Token) -> Result<Self> {
        let mut fields = token.into_tuple()?.into_iter();
        let mut next = || {
            fields
                .next()
                .ok_or_else(|| MultaError::serialization("ABI: short FineStatusUpdate tuple"))
        };
        Ok(Self {
            last_updated_timestamp: next()?.into_uint()?,
            old_state: next()?.into_uint()?,
            new_state: next()?.into_uint()?,
            reason: next()?.into_string()?,
            updated_by: next()?.into_address()?,
        })
    }

    fn to_token(&self) -> Token {
        Token::Tuple(vec![
            Token::Uint(self.last_updated_timestamp),
            Token::Uint(self.old_state),
            Token::Uint(self.new_state),
            Token::String(self.reason.clone()),
            Token::Address(self.updated_by),
        ])
    }

    /// Map to the domain entry of `fine_id`'s log.
    pub fn into_status_update(self, fine_id: FineId) -> Result<StatusUpdate> {
        Ok(StatusUpdate {
            fine_id,
            old_state: state_from_raw(self.old_state, "oldState")?,
            new_state: state_from_raw(self.new_state, "newState")?,
            reason: self.reason,
            updated_by: self.updated_by,
            timestamp: to_u64(self.last_updated_timestamp, "lastUpdatedTimestamp")?,
        })
    }
}

impl From<&StatusUpdate> for RawStatusUpdate {
    fn from(update: &StatusUpdate) -> Self {
        Self {
            last_updated_timestamp: u128::from(update.timestamp),
            old_state: u128::from(update.old_state.code()),
            new_state: u128::from(update.new_state.code()),
            reason: update.reason.clone(),
            updated_by: update.updated_by,
        }
    }
}

fn single(types: &[ParamType], data: &[u8]) -> Result<Token> {
    abi::decode(types, data)?
        .pop()
        .ok_or_else(|| MultaError::serialization("ABI: empty result"))
}

/// Decode `getAllFineCount`.
pub fn decode_fine_count(data: &[u8]) -> Result<u64> {
    single(&[ParamType::Uint], data)
        .and_then(Token::into_uint)
        .map_err(read_failure("getAllFineCount"))
        .and_then(|v| to_u64(v, "count"))
}

/// Decode `getFineDetails`.
pub fn decode_fine_details(data: &[u8]) -> Result<RawFine> {
    single(&[RawFine::param_type()], data)
        .and_then(RawFine::from_token)
        .map_err(read_failure("getFineDetails"))
}

/// Decode `getFinesDetails`.
pub fn decode_fines_details(data: &[u8]) -> Result<Vec<RawFine>> {
    single(&[ParamType::Array(Box::new(RawFine::param_type()))], data)
        .and_then(Token::into_array)
        .and_then(|items| items.into_iter().map(RawFine::from_token).collect())
        .map_err(read_failure("getFinesDetails"))
}

/// Decode `getFinesByPlate`.
pub fn decode_fines_by_plate(data: &[u8]) -> Result<Vec<u64>> {
    single(&[ParamType::Array(Box::new(ParamType::Uint))], data)
        .and_then(Token::into_array)
        .and_then(|items| items.into_iter().map(Token::into_uint).collect::<Result<Vec<_>>>())
        .map_err(read_failure("getFinesByPlate"))?
        .into_iter()
        .map(|id| to_u64(id, "fineId"))
        .collect()
}

/// Decode `getFineRegistrationDetails`.
pub fn decode_registration_details(data: &[u8]) -> Result<RegistrationDetails> {
    let mut values = abi::decode(&[ParamType::Uint, ParamType::Uint], data)
        .and_then(|tokens| tokens.into_iter().map(Token::into_uint).collect::<Result<Vec<_>>>())
        .map_err(read_failure("getFineRegistrationDetails"))?
        .into_iter();
    let block_number = values.next().unwrap_or_default();
    let timestamp = values.next().unwrap_or_default();
    Ok(RegistrationDetails {
        block_number: to_u64(block_number, "blockNumber")?,
        timestamp: to_u64(timestamp, "timestamp")?,
    })
}

/// Decode `getFineStatusHistory` into the page and the total entry count.
pub fn decode_status_history(data: &[u8]) -> Result<(Vec<RawStatusUpdate>, u64)> {
    let types = [
        ParamType::Array(Box::new(RawStatusUpdate::param_type())),
        ParamType::Uint,
    ];
    let mut tokens = abi::decode(&types, data)
        .map_err(read_failure("getFineStatusHistory"))?
        .into_iter();
    let (Some(updates), Some(total)) = (tokens.next(), tokens.next()) else {
        return Err(MultaError::ledger_read("getFineStatusHistory returned too few values"));
    };
    let updates = updates
        .into_array()
        .and_then(|items| items.into_iter().map(RawStatusUpdate::from_token).collect())
        .map_err(read_failure("getFineStatusHistory"))?;
    let total = to_u64(total.into_uint().map_err(read_failure("getFineStatusHistory"))?, "total")?;
    Ok((updates, total))
}

/// Return-data encoders, used by handlers that serve calls locally.
pub mod results {
    use super::*;

    /// `getAllFineCount` result.
    pub fn fine_count(count: u64) -> Vec<u8> {
        abi::encode(&[Token::Uint(u128::from(count))])
    }

    /// `getFineDetails` result.
    pub fn fine_details(fine: &RawFine) -> Vec<u8> {
        abi::encode(&[fine.to_token()])
    }

    /// `getFinesDetails` result.
    pub fn fines_details(fines: &[RawFine]) -> Vec<u8> {
        abi::encode(&[Token::Array(fines.iter().map(RawFine::to_token).collect())])
    }

    /// `getFinesByPlate` result.
    pub fn fines_by_plate(ids: &[u64]) -> Vec<u8> {
        abi::encode(&[Token::Array(
            ids.iter().map(|id| Token::Uint(u128::from(*id))).collect(),
        )])
    }

    /// `getFineRegistrationDetails` result.
    pub fn registration_details(details: &RegistrationDetails) -> Vec<u8> {
        abi::encode(&[
            Token::Uint(u128::from(details.block_number)),
            Token::Uint(u128::from(details.timestamp)),
        ])
    }

    /// `getFineStatusHistory` result.
    pub fn status_history(updates: &[RawStatusUpdate], total: u64) -> Vec<u8> {
        abi::encode(&[
            Token::Array(updates.iter().map(RawStatusUpdate::to_token).collect()),
            Token::Uint(u128::from(total)),
        ])
    }
}
