//! Integrity report produced by cross-checking a fine against its status log.

use crate::fine::FineId;
use serde::{Deserialize, Serialize};

/// Sentinel detail carried by a report with no violations.
pub const ALL_CHECKS_PASSED: &str = "All integrity checks passed";

/// Result of an integrity verification. Violations are data, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    /// Fine that was checked
    pub fine_id: u64,
    /// True when no violation was found
    pub is_valid: bool,
    /// Block the registration landed in (0 when unknown)
    pub registration_block: u64,
    /// Registration time, unix seconds (0 when unknown)
    pub registration_timestamp: u64,
    /// Number of status updates on the ledger
    pub status_history_length: u64,
    /// Time of the most recent status update (0 when none)
    pub last_status_update: u64,
    /// Human-readable violations, or the passed sentinel
    pub details: Vec<String>,
}

impl IntegrityReport {
    /// Report for a fetch failure: invalid, single violation, zeroed facts.
    pub fn failed(fine_id: u64, reason: impl std::fmt::Display) -> Self {
        Self {
            fine_id,
            is_valid: false,
            registration_block: 0,
            registration_timestamp: 0,
            status_history_length: 0,
            last_status_update: 0,
            details: vec![format!("Verification failed: {reason}")],
        }
    }

    /// Violations found, empty for a valid report.
    pub fn violations(&self) -> &[String] {
        if self.is_valid {
            &[]
        } else {
            &self.details
        }
    }
}

/// Accumulates checks and seals them into a report.
#[derive(Debug)]
pub struct IntegrityReportBuilder {
    report: IntegrityReport,
    violations: Vec<String>,
}

impl IntegrityReportBuilder {
    /// Start a report for `fine_id`.
    pub fn new(fine_id: FineId) -> Self {
        Self {
            report: IntegrityReport {
                fine_id: fine_id.value(),
                is_valid: false,
                registration_block: 0,
                registration_timestamp: 0,
                status_history_length: 0,
                last_status_update: 0,
                details: Vec::new(),
            },
            violations: Vec::new(),
        }
    }

    /// Record registration facts.
    pub fn registration(mut self, block: u64, timestamp: u64) -> Self {
        self.report.registration_block = block;
        self.report.registration_timestamp = timestamp;
        self
    }

    /// Record history facts.
    pub fn history(mut self, length: u64, last_update: u64) -> Self {
        self.report.status_history_length = length;
        self.report.last_status_update = last_update;
        self
    }

    /// Record a violation when `failed` holds.
    pub fn check(&mut self, failed: bool, violation: impl Into<String>) {
        if failed {
            self.violations.push(violation.into());
        }
    }

    /// Seal the report.
    pub fn finish(mut self) -> IntegrityReport {
        self.report.is_valid = self.violations.is_empty();
        self.report.details = if self.report.is_valid {
            vec![ALL_CHECKS_PASSED.to_string()]
        } else {
            self.violations
        };
        self.report
    }
}
