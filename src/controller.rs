//! Drives reconciliation domain by domain and applies approved changes.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dns::enums::DNSResourceType;
use crate::dnssec::derive_ds;
use crate::error::{Result, SyncError};
use crate::model::{DnskeyRecord, SignerRecord, SignerRecordSet};
use crate::policy::{Confirm, GateDecision, SafetyGate, StdinConfirm, evaluate};
use crate::reconcile::{Operation, PlannedOperation, reconcile};
use crate::registry::{DelegationSignerStore, DnsimpleClient, DomainDirectory, RegistryRecord};
use crate::report::{DomainReport, OperationReport, Outcome, RunSummary};
use crate::resolver::{TcpTransport, TrustResolver, extract_cds, extract_dnskeys};

/// Everything a run needs, built once at startup.
pub struct SyncContext {
    pub config: Arc<Config>,
    pub resolver: TrustResolver,
    pub store: Arc<dyn DelegationSignerStore>,
    pub directory: Arc<dyn DomainDirectory>,
    pub confirm: Arc<dyn Confirm>,
}

impl SyncContext {
    /// Production wiring: DNS over TCP to the configured nameserver, the
    /// DNSimple API, and confirmation on the terminal.
    pub fn from_config(config: Config) -> Result<Self> {
        let client = Arc::new(DnsimpleClient::new(
            config.api_endpoint.as_deref(),
            &config.account_number,
            &config.api_key,
        )?);
        let transport = TcpTransport::new(config.nameserver_addr.clone(), config.nameserver_port);

        Ok(Self {
            config: Arc::new(config),
            resolver: TrustResolver::new(Box::new(transport)),
            store: client.clone(),
            directory: client,
            confirm: Arc::new(StdinConfirm),
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub dry_run: bool,
    pub force: bool,
}

pub struct Controller {
    ctx: SyncContext,
    options: RunOptions,
}

impl Controller {
    pub fn new(ctx: SyncContext, options: RunOptions) -> Self {
        Self { ctx, options }
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    fn gate(&self, dry_run: bool) -> SafetyGate {
        SafetyGate::new(self.options.force, dry_run, self.ctx.confirm.clone())
    }

    /// Reconcile one domain, or every domain of the account sorted by name.
    ///
    /// Per-domain failures land in the summary; only failing to enumerate
    /// the account is an error.
    pub async fn run(&self, domain: Option<&str>) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        match domain {
            Some(domain) => {
                let mut dry_run = self.options.dry_run;
                let mut note = None;
                match self.ctx.directory.domain_exists(domain).await {
                    Ok(true) => debug!(
                        "domain {} exists in account ({})",
                        domain, self.ctx.config.account_number
                    ),
                    Ok(false) => {
                        warn!(
                            "{} does not exist in this account ({}), dry run enabled",
                            domain, self.ctx.config.account_number
                        );
                        dry_run = true;
                        note = Some(format!(
                            "Warning: {} does not exist in this account ({}) - dry run enabled",
                            domain, self.ctx.config.account_number
                        ));
                    }
                    Err(e) => {
                        warn!(
                            "cannot confirm {} is in the account, dry run enabled: {}",
                            domain, e
                        );
                        dry_run = true;
                        note = Some(format!(
                            "Warning: cannot confirm {} is in this account ({}) - dry run enabled",
                            domain, e
                        ));
                    }
                }

                let mut report = DomainReport::start(domain, dry_run);
                report.notes.extend(note);
                self.sync_into(&mut report).await;
                summary.push(report);
            }
            None => {
                let mut names: Vec<String> = self
                    .ctx
                    .directory
                    .list_domains(None)
                    .await?
                    .into_iter()
                    .map(|d| d.name)
                    .collect();
                names.sort();
                info!("Processing {} domain(s) in the account", names.len());

                for name in names {
                    summary.push(self.sync_domain(&name, self.options.dry_run).await);
                }
            }
        }

        Ok(summary)
    }

    /// Reconcile CDS against DS for one domain.
    pub async fn sync_domain(&self, domain: &str, dry_run: bool) -> DomainReport {
        let mut report = DomainReport::start(domain, dry_run);
        self.sync_into(&mut report).await;
        report
    }

    async fn sync_into(&self, report: &mut DomainReport) {
        if let Err(e) = self.reconcile_domain(report).await {
            warn!("reconciliation of {} stopped: {}", report.domain, e);
            report.error = Some(e);
        }
        report.finish();
    }

    async fn reconcile_domain(&self, report: &mut DomainReport) -> Result<()> {
        let domain = report.domain.clone();

        let answer = self.ctx.resolver.query(&domain, DNSResourceType::CDS).await?;
        let cds = extract_cds(&answer)?;
        info!("Found {} CDS record(s) for {}", cds.len(), domain);
        report.cds = Some(cds.clone());

        let ds: SignerRecordSet = self.ctx.store.signer_records(&domain).await?;
        info!("Found {} DS record(s) for {}", ds.len(), domain);
        report.ds = Some(ds.clone());

        let plan = reconcile(&cds, &ds);
        debug!("{}: state {}, {} operation(s)", domain, plan.state, plan.operations.len());
        for keytag in &plan.divergent {
            warn!(
                "DS {} of {} differs from the published CDS; keytag match only, left unchanged",
                keytag, domain
            );
        }
        report.state = Some(plan.state);
        report.in_sync = plan.in_sync.clone();
        report.divergent = plan.divergent.clone();

        let gate = self.gate(report.dry_run);
        // Keytags a dry run has pretended to add (or remove) so far
        let mut pending: isize = 0;
        for op in &plan.operations {
            let outcome = match op.operation {
                Operation::Add => self.apply_add(&domain, op, report.dry_run).await,
                Operation::Remove => {
                    self.apply_remove(&domain, op, &gate, report.dry_run, pending).await
                }
            };
            if let Outcome::DryRun { .. } = outcome {
                pending += match op.operation {
                    Operation::Add => 1,
                    Operation::Remove => -1,
                };
            }
            report.operations.push(OperationReport {
                operation: op.operation,
                record: op.record.clone(),
                warnings: Vec::new(),
                outcome,
            });
        }
        Ok(())
    }

    /// CDS-driven addition: existence re-check, then create.
    async fn apply_add(&self, domain: &str, op: &PlannedOperation, dry_run: bool) -> Outcome {
        info!("Attempting addition of DS {} in {}", op.record.tag(), domain);
        let lookup = match self.ctx.store.exists(domain, op.keytag).await {
            Ok(lookup) => lookup,
            Err(e) => return Outcome::failed(&e.into()),
        };
        if let Some(held) = lookup.first() {
            info!(
                "DS {} is one of {} that already exist in the registry (ID {})",
                op.record.tag(),
                lookup.total,
                held.id
            );
            return Outcome::AlreadyPresent { id: held.id };
        }
        if dry_run {
            return Outcome::DryRun {
                would_confirm: false,
            };
        }
        self.create(domain, &op.record).await
    }

    /// Removes every registry record under the keytag, whatever its digest.
    async fn apply_remove(
        &self,
        domain: &str,
        op: &PlannedOperation,
        gate: &SafetyGate,
        dry_run: bool,
        pending: isize,
    ) -> Outcome {
        info!("Attempting removal of DS {} in {}", op.record.tag(), domain);
        let lookup = match self.ctx.store.exists(domain, op.keytag).await {
            Ok(lookup) => lookup,
            Err(e) => return Outcome::failed(&e.into()),
        };
        if !lookup.found() {
            return Outcome::failed(&SyncError::NotFound {
                domain: domain.to_string(),
                what: format!("DS {} (one of {} in the registry)", op.record.tag(), lookup.total),
            });
        }
        debug!(
            "DS {} is held {} time(s) among {} in the registry (ID {:?})",
            op.record.tag(),
            lookup.records.len(),
            lookup.total,
            lookup.ids()
        );

        let sole = lookup.remains_sole(pending);
        match self.removal_decision(gate, domain, &op.record, sole, dry_run) {
            Some(outcome) => outcome,
            None => self.remove(domain, &lookup.records).await,
        }
    }

    /// `None` means go ahead with the live call.
    fn removal_decision(
        &self,
        gate: &SafetyGate,
        domain: &str,
        record: &SignerRecord,
        sole_record: bool,
        dry_run: bool,
    ) -> Option<Outcome> {
        match gate.decide_removal(sole_record) {
            GateDecision::Aborted => Some(aborted(domain, Operation::Remove, record)),
            GateDecision::WouldConfirm => Some(Outcome::DryRun {
                would_confirm: true,
            }),
            _ if dry_run => Some(Outcome::DryRun {
                would_confirm: false,
            }),
            _ => None,
        }
    }

    async fn create(&self, domain: &str, record: &SignerRecord) -> Outcome {
        match self.ctx.store.create(domain, record).await {
            Ok(id) => {
                info!("DS {} created in the registry for {} with ID {}", record.tag(), domain, id);
                Outcome::Created { id }
            }
            Err(e) => {
                warn!("error creating DS {} for {}: {}", record.tag(), domain, e);
                Outcome::failed(&e.into())
            }
        }
    }

    async fn remove(&self, domain: &str, held: &[RegistryRecord]) -> Outcome {
        let mut ids = Vec::with_capacity(held.len());
        for record in held {
            match self.ctx.store.delete(domain, record.id).await {
                Ok(()) => {
                    info!("DS {} (ID {}) deleted from {}", record.record.tag(), record.id, domain);
                    ids.push(record.id);
                }
                Err(e) => {
                    warn!(
                        "error deleting DS {} (ID {}) from {}: {}",
                        record.record.tag(),
                        record.id,
                        domain,
                        e
                    );
                    return Outcome::failed(&e.into());
                }
            }
        }
        Outcome::Deleted { ids }
    }

    pub async fn domain_in_account(&self, domain: &str) -> Result<bool> {
        Ok(self.ctx.directory.domain_exists(domain).await?)
    }

    /// DS records the registry holds for `domain`.
    pub async fn list_ds(&self, domain: &str) -> Result<Vec<RegistryRecord>> {
        Ok(self.ctx.store.list(domain).await?)
    }

    /// DNSKEY records published for `domain`, from a trusted answer.
    pub async fn list_dnskeys(&self, domain: &str) -> Result<BTreeMap<u16, DnskeyRecord>> {
        let answer = self.ctx.resolver.query(domain, DNSResourceType::DNSKEY).await?;
        Ok(extract_dnskeys(&answer)?)
    }

    /// Derive a DS from the published DNSKEY `keytag` and submit it after
    /// the full safety checks.
    pub async fn add_keytag(&self, domain: &str, keytag: u16) -> Result<OperationReport> {
        let held = self.ctx.store.list(domain).await?;
        let existing: SignerRecordSet = held.iter().map(|r| r.record.clone()).collect();

        if let Some(found) = held.iter().find(|r| r.record.keytag == keytag) {
            info!("DS with keytag {} already exists in the registry for {}", keytag, domain);
            return Ok(OperationReport {
                operation: Operation::Add,
                record: found.record.clone(),
                warnings: Vec::new(),
                outcome: Outcome::AlreadyPresent { id: found.id },
            });
        }

        debug!("Checking DNS for DNSKEY with keytag {} in {}", keytag, domain);
        let keyset = self.ctx.resolver.query(domain, DNSResourceType::DNSKEY).await?;
        let keys = extract_dnskeys(&keyset)?;
        let key = keys.get(&keytag).ok_or_else(|| SyncError::NotFound {
            domain: domain.to_string(),
            what: format!("DNSKEY with keytag {}", keytag),
        })?;
        info!("DNSKEY with keytag {} exists in DNS in {}", keytag, domain);

        let warnings = evaluate(key, &keyset, &existing);
        for warning in &warnings {
            warn!("{}: {}", domain, warning);
        }

        info!(
            "Creating DS record with digest type {} from DNSKEY {}",
            self.ctx.config.digest_type, keytag
        );
        let record = derive_ds(domain, key, self.ctx.config.digest_type)?;
        debug!("DS record derived: DS {}", record);

        let outcome = match self.gate(self.options.dry_run).decide(&warnings) {
            GateDecision::Aborted => aborted(domain, Operation::Add, &record),
            GateDecision::WouldConfirm => Outcome::DryRun {
                would_confirm: true,
            },
            _ if self.options.dry_run => Outcome::DryRun {
                would_confirm: false,
            },
            _ => self.create(domain, &record).await,
        };

        Ok(OperationReport {
            operation: Operation::Add,
            record,
            warnings,
            outcome,
        })
    }

    /// Delete the DS with `keytag`; the last remaining DS needs confirmation.
    pub async fn delete_keytag(&self, domain: &str, keytag: u16) -> Result<OperationReport> {
        debug!("Checking registry for DS with keytag {} in {}", keytag, domain);
        let lookup = self.ctx.store.exists(domain, keytag).await?;
        let Some(held) = lookup.first().cloned() else {
            return Err(SyncError::NotFound {
                domain: domain.to_string(),
                what: format!("DS record with keytag {}", keytag),
            });
        };
        info!(
            "DS record with keytag {} is one of {} in {}",
            keytag, lookup.total, domain
        );

        let dry_run = self.options.dry_run;
        let gate = self.gate(dry_run);
        let sole = lookup.is_sole_record();
        let outcome = match self.removal_decision(&gate, domain, &held.record, sole, dry_run) {
            Some(outcome) => outcome,
            None => self.remove(domain, &lookup.records).await,
        };

        Ok(OperationReport {
            operation: Operation::Remove,
            record: held.record,
            warnings: Vec::new(),
            outcome,
        })
    }
}

/// An operation the gate refused; logged, and reported as aborted.
fn aborted(domain: &str, operation: Operation, record: &SignerRecord) -> Outcome {
    let e = SyncError::PolicyAbort {
        domain: domain.to_string(),
        operation: format!("{} DS {}", operation, record.tag()),
    };
    warn!("{}", e);
    Outcome::Aborted
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_aborted_operation_is_logged_as_warning() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let record = SignerRecord::new(111, 8, 2, "AA");
        let outcome = tracing::subscriber::with_default(subscriber, || {
            aborted("example.test", Operation::Remove, &record)
        });

        assert_eq!(outcome, Outcome::Aborted);
        let log = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(log.contains("WARN"));
        assert!(log.contains("Remove DS 111/8 aborted for example.test"));
    }
}
