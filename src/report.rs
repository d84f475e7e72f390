//! Text reports printed on stdout.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Local, SecondsFormat};

use crate::error::{ErrorKind, SyncError};
use crate::model::{DnskeyRecord, SignerRecord, SignerRecordSet};
use crate::policy::Warning;
use crate::reconcile::{Operation, ReconcileState};
use crate::registry::RegistryRecord;

fn timestamp(t: &DateTime<Local>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, false)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Created { id: u64 },
    Deleted { ids: Vec<u64> },
    AlreadyPresent { id: u64 },
    /// Nothing changed because of dry-run; `would_confirm` when the live
    /// run would have asked the operator first
    DryRun { would_confirm: bool },
    Aborted,
    Failed { kind: ErrorKind, message: String },
}

impl Outcome {
    pub fn failed(error: &SyncError) -> Self {
        Outcome::Failed {
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Created { id } => write!(f, "created in the registry with ID {}", id),
            Outcome::Deleted { ids } => {
                let ids: Vec<String> = ids.iter().map(u64::to_string).collect();
                write!(f, "(ID {}) deleted", ids.join(", "))
            }
            Outcome::AlreadyPresent { id } => {
                write!(f, "already exists in the registry with ID {}", id)
            }
            Outcome::DryRun { would_confirm: false } => write!(f, "dry run, no alterations made"),
            Outcome::DryRun { would_confirm: true } => write!(
                f,
                "dry run, no alterations made (confirmation would be required)"
            ),
            Outcome::Aborted => write!(f, "aborted"),
            Outcome::Failed { kind, message } => write!(f, "failed ({}): {}", kind, message),
        }
    }
}

#[derive(Clone, Debug)]
pub struct OperationReport {
    pub operation: Operation,
    pub record: SignerRecord,
    pub warnings: Vec<Warning>,
    pub outcome: Outcome,
}

impl fmt::Display for OperationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.warnings.len() {
            0 => {}
            1 => writeln!(f, "There is a warning for this operation:")?,
            n => writeln!(f, "There are {} warnings for this operation:", n)?,
        }
        for warning in &self.warnings {
            writeln!(f, "  => {}", warning)?;
        }
        write!(
            f,
            "{} DS {}: {}",
            self.operation,
            self.record.tag(),
            self.outcome
        )
    }
}

/// Everything that happened to one domain during a run.
#[derive(Debug)]
pub struct DomainReport {
    pub domain: String,
    pub dry_run: bool,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub notes: Vec<String>,
    pub cds: Option<SignerRecordSet>,
    pub ds: Option<SignerRecordSet>,
    pub state: Option<ReconcileState>,
    pub in_sync: Vec<u16>,
    pub divergent: Vec<u16>,
    pub operations: Vec<OperationReport>,
    /// Reconciliation could not start
    pub error: Option<SyncError>,
}

impl DomainReport {
    pub fn start(domain: &str, dry_run: bool) -> Self {
        Self {
            domain: domain.to_string(),
            dry_run,
            started_at: Local::now(),
            finished_at: None,
            notes: Vec::new(),
            cds: None,
            ds: None,
            state: None,
            in_sync: Vec::new(),
            divergent: Vec::new(),
            operations: Vec::new(),
            error: None,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now());
    }

    pub fn failed_operations(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| op.outcome.is_failure())
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.failed_operations() == 0
    }

    pub fn result(self) -> Result<(), SyncError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let failed = self.failed_operations();
        if failed > 0 {
            return Err(SyncError::PartialApply {
                domain: self.domain,
                failed,
                total: self.operations.len(),
            });
        }
        Ok(())
    }

    fn write_set(
        &self,
        f: &mut fmt::Formatter<'_>,
        label: &str,
        set: &SignerRecordSet,
    ) -> fmt::Result {
        if set.is_empty() {
            writeln!(f, "No {} records for {}", label, self.domain)
        } else {
            writeln!(f, "Found {} {} record(s) : {}", set.len(), label, set.tags())
        }
    }
}

impl fmt::Display for DomainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "== Starting domain {} at {}",
            self.domain,
            timestamp(&self.started_at)
        )?;
        for note in &self.notes {
            writeln!(f, "{}", note)?;
        }
        if let Some(cds) = &self.cds {
            self.write_set(f, "CDS", cds)?;
        }
        if let Some(ds) = &self.ds {
            self.write_set(f, "DS", ds)?;
        }

        match self.state {
            Some(ReconcileState::NoCds) => writeln!(f, "No CDS records; nothing to do.")?,
            Some(ReconcileState::CdsOnlyNoDs) => writeln!(f, "DS needs adding")?,
            Some(ReconcileState::BothPresent) => {
                let ds = self.ds.as_ref();
                for keytag in &self.in_sync {
                    let tag = ds
                        .and_then(|set| set.get(*keytag))
                        .map(SignerRecord::tag)
                        .unwrap_or_else(|| keytag.to_string());
                    writeln!(f, "DS {} exists", tag)?;
                }
                for keytag in &self.divergent {
                    writeln!(
                        f,
                        "Warning: DS {} differs from the CDS with the same keytag; left unchanged",
                        keytag
                    )?;
                }
                if self.operations.is_empty() {
                    writeln!(f, "DS records are in sync")?;
                }
            }
            None => {}
        }

        for op in &self.operations {
            writeln!(f, "{}", op)?;
        }
        if let Some(error) = &self.error {
            writeln!(f, "Error: {}", error)?;
        }

        let finished = self.finished_at.unwrap_or(self.started_at);
        write!(
            f,
            "== Finished domain {} at {}",
            self.domain,
            timestamp(&finished)
        )
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<DomainReport>,
}

impl RunSummary {
    pub fn push(&mut self, report: DomainReport) {
        self.reports.push(report);
    }

    pub fn domains(&self) -> Vec<&str> {
        self.reports.iter().map(|r| r.domain.as_str()).collect()
    }

    pub fn failed_domains(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| r.domain.as_str())
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.reports.iter().all(DomainReport::is_success)
    }
}

fn count_line(count: usize, what: &str) -> String {
    match count {
        0 => format!("There are no {} records", what),
        1 => format!("There is 1 {} record", what),
        n => format!("There are {} {} records", n, what),
    }
}

/// DS records held by the registry, one per line.
pub fn format_ds_listing(records: &[RegistryRecord]) -> String {
    let mut out = count_line(records.len(), "DS");
    for held in records {
        out.push_str(&format!("\n  => DS {} (ID {})", held.record, held.id));
    }
    out
}

/// DNSKEY records published in DNS, one per line, by keytag.
pub fn format_dnskey_listing(keys: &BTreeMap<u16, DnskeyRecord>) -> String {
    let mut out = count_line(keys.len(), "DNSKEY");
    for key in keys.values() {
        out.push_str(&format!("\n  => DNSKEY; {}", key));
    }
    out
}
