//! Pre-flight checks before a DS derived from a DNSKEY is submitted, and the
//! confirmation port used when a check raises a warning.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tracing::debug;

use crate::dnssec::{is_signed_by, signing_algorithms};
use crate::model::{DnskeyRecord, SignerRecordSet};
use crate::resolver::TrustedAnswer;

pub const WARNINGS_PROMPT: &str = "Given the warnings, do you want to proceed?";
pub const SOLE_RECORD_PROMPT: &str = "Are you sure you want to delete the ONLY DS record?";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WarningKind {
    /// The keyset is not signed by the candidate and no DS is held yet
    Unsigned,
    /// The keyset is not signed by the candidate and the held DS use another algorithm
    AlgorithmMismatch,
    /// Not signed by the candidate, but every held DS and a current signature share its algorithm
    AlgorithmMismatchButCompatible,
    ZskWarning,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Warnings for adding a DS derived from `candidate`.
///
/// `keyset` is the trusted DNSKEY answer of the zone (with its RRSIGs) and
/// `existing` the DS set currently held by the registry.
pub fn evaluate(
    candidate: &DnskeyRecord,
    keyset: &TrustedAnswer,
    existing: &SignerRecordSet,
) -> Vec<Warning> {
    let keytag = candidate.keytag;
    let mut warnings = Vec::new();

    if is_signed_by(keyset, keytag) {
        debug!("The DNSKEY keyset in {} is signed with keytag {}", keyset.name, keytag);
    } else if existing.is_empty() {
        warnings.push(Warning {
            kind: WarningKind::Unsigned,
            message: format!(
                "The DNSKEY record set is not signed with the DNSKEY with keytag {}",
                keytag
            ),
        });
    } else {
        // Held DS algorithms alone decide the downgrade
        let signing = signing_algorithms(keyset);
        let same_algorithm = existing.iter().all(|ds| ds.algorithm == candidate.algorithm);
        debug!(
            "Candidate algorithm {}; held DS algorithms match: {}; signing algorithms: {:?}",
            candidate.algorithm, same_algorithm, signing
        );

        if same_algorithm {
            warnings.push(Warning {
                kind: WarningKind::AlgorithmMismatchButCompatible,
                message: format!(
                    "The DNSKEY record set is not signed with the DNSKEY with keytag {} \
                     (although it's of the same algorithm as existing DS records, \
                     so may be ok if you're pre-publishing)",
                    keytag
                ),
            });
        } else {
            warnings.push(Warning {
                kind: WarningKind::AlgorithmMismatch,
                message: format!(
                    "The DNSKEY record set is not signed with the DNSKEY with keytag {} \
                     and it does NOT match the algorithm of existing DS record(s)",
                    keytag
                ),
            });
        }
    }

    if candidate.is_zsk() {
        warnings.push(Warning {
            kind: WarningKind::ZskWarning,
            message: format!("The DNSKEY with keytag {} is a ZSK", keytag),
        });
    }

    warnings
}

/// Yes/no question to an operator.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Asks on stdout and reads the answer from stdin. Anything other than
/// `y` or `yes` is a no, as is a read failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        let mut stdout = io::stdout();
        if write!(stdout, "{} [y/N]: ", prompt).and_then(|_| stdout.flush()).is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysConfirm;

impl Confirm for AlwaysConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NeverConfirm;

impl Confirm for NeverConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// No warnings
    Proceed,
    /// Warnings present, `--force` given
    Overridden,
    /// Warnings present, operator said yes
    Confirmed,
    /// Warnings present, operator said no
    Aborted,
    /// Dry run: confirmation would have been asked
    WouldConfirm,
}

impl GateDecision {
    pub fn allows(&self) -> bool {
        matches!(
            self,
            GateDecision::Proceed | GateDecision::Overridden | GateDecision::Confirmed
        )
    }
}

/// Turns warnings into a go/no-go for one operation.
#[derive(Clone)]
pub struct SafetyGate {
    force: bool,
    dry_run: bool,
    confirm: Arc<dyn Confirm>,
}

impl SafetyGate {
    pub fn new(force: bool, dry_run: bool, confirm: Arc<dyn Confirm>) -> Self {
        Self {
            force,
            dry_run,
            confirm,
        }
    }

    fn ask(&self, prompt: &str) -> GateDecision {
        if self.force {
            debug!("confirmation skipped, --force overrides");
            GateDecision::Overridden
        } else if self.dry_run {
            GateDecision::WouldConfirm
        } else if self.confirm.confirm(prompt) {
            GateDecision::Confirmed
        } else {
            GateDecision::Aborted
        }
    }

    /// Decision for an addition carrying `warnings`.
    pub fn decide(&self, warnings: &[Warning]) -> GateDecision {
        if warnings.is_empty() {
            debug!("There are no warnings");
            return GateDecision::Proceed;
        }
        self.ask(WARNINGS_PROMPT)
    }

    /// Decision for deleting a DS; only the last remaining one needs confirmation.
    pub fn decide_removal(&self, sole_record: bool) -> GateDecision {
        if !sole_record {
            return GateDecision::Proceed;
        }
        self.ask(SOLE_RECORD_PROMPT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording(Mutex<Vec<String>>, bool);

    impl Confirm for Recording {
        fn confirm(&self, prompt: &str) -> bool {
            self.0.lock().unwrap().push(prompt.to_string());
            self.1
        }
    }

    fn warning() -> Vec<Warning> {
        vec![Warning {
            kind: WarningKind::ZskWarning,
            message: "zsk".to_string(),
        }]
    }

    #[test]
    fn test_no_warnings_never_prompts() {
        let confirm = Arc::new(Recording(Mutex::new(Vec::new()), false));
        let gate = SafetyGate::new(false, false, confirm.clone());
        assert_eq!(gate.decide(&[]), GateDecision::Proceed);
        assert!(confirm.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_force_overrides_without_prompt() {
        let confirm = Arc::new(Recording(Mutex::new(Vec::new()), false));
        let gate = SafetyGate::new(true, false, confirm.clone());
        assert_eq!(gate.decide(&warning()), GateDecision::Overridden);
        assert!(confirm.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_prompt_answer_decides() {
        let yes = SafetyGate::new(false, false, Arc::new(AlwaysConfirm));
        let no = SafetyGate::new(false, false, Arc::new(NeverConfirm));
        assert_eq!(yes.decide(&warning()), GateDecision::Confirmed);
        assert_eq!(no.decide(&warning()), GateDecision::Aborted);
        assert!(!no.decide(&warning()).allows());
    }

    #[test]
    fn test_dry_run_does_not_prompt() {
        let confirm = Arc::new(Recording(Mutex::new(Vec::new()), true));
        let gate = SafetyGate::new(false, true, confirm.clone());
        assert_eq!(gate.decide(&warning()), GateDecision::WouldConfirm);
        assert_eq!(gate.decide_removal(true), GateDecision::WouldConfirm);
        assert!(confirm.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_sole_record_prompt() {
        let confirm = Arc::new(Recording(Mutex::new(Vec::new()), false));
        let gate = SafetyGate::new(false, false, confirm.clone());
        assert_eq!(gate.decide_removal(false), GateDecision::Proceed);
        assert_eq!(gate.decide_removal(true), GateDecision::Aborted);
        assert_eq!(
            confirm.0.lock().unwrap().as_slice(),
            &[SOLE_RECORD_PROMPT.to_string()]
        );
    }
}
