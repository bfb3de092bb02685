//! Shared test fixtures.

use multa_core::{FineFields, InfractionType, NewFine, PlateNumber};

/// Plate used by the standard scenario.
pub const SAMPLE_PLATE: &str = "ABC123";

/// Cost used by the standard scenario.
pub const SAMPLE_COST: u64 = 500_000;

/// Speeding fine for `ABC123`, as the request layer would submit it.
pub fn speeding_fine_fields() -> FineFields {
    FineFields {
        plate_number: SAMPLE_PLATE.to_string(),
        location: "Calle 26 # 68-35, Bogotá".to_string(),
        infraction_type: InfractionType::ExcesoVelocidad.code().to_string(),
        cost: SAMPLE_COST,
        owner_identifier: "CC1020304050".to_string(),
        external_system_id: None,
    }
}

/// Validated registration payload with the given plate and evidence CID.
pub fn new_fine(plate: &str, evidence_cid: &str) -> NewFine {
    NewFine {
        plate_number: PlateNumber::parse(plate).expect("fixture plate is valid"),
        evidence_cid: evidence_cid.to_string(),
        location: "Calle 26 # 68-35, Bogotá".to_string(),
        infraction_type: InfractionType::ExcesoVelocidad,
        cost: SAMPLE_COST,
        owner_identifier: "CC1020304050".to_string(),
        external_system_id: String::new(),
    }
}

/// Deterministic evidence file contents.
pub fn evidence_bytes(label: &str) -> Vec<u8> {
    let mut bytes = b"\xff\xd8\xff\xe0JFIF-evidence:".to_vec();
    bytes.extend_from_slice(label.as_bytes());
    bytes
}
