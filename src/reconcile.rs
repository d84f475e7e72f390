//! CDS against DS diff.
//!
//! Keytag is the only identity compared. A keytag present on both sides is
//! left alone even when the registry digest differs from the CDS digest;
//! such keytags are surfaced in `divergent` for the report and never acted on.

use std::fmt;

use crate::model::{SignerRecord, SignerRecordSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileState {
    /// No CDS published: nothing to do, whatever the registry holds
    NoCds,
    /// CDS published and no DS held: bootstrap, add everything
    CdsOnlyNoDs,
    BothPresent,
}

impl fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileState::NoCds => write!(f, "no CDS"),
            ReconcileState::CdsOnlyNoDs => write!(f, "CDS without DS"),
            ReconcileState::BothPresent => write!(f, "CDS and DS"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Add,
    Remove,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Add => write!(f, "Add"),
            Operation::Remove => write!(f, "Remove"),
        }
    }
}

/// One step of a plan. `record` is the CDS to add or the DS to remove.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedOperation {
    pub operation: Operation,
    pub keytag: u16,
    pub record: SignerRecord,
}

impl fmt::Display for PlannedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} DS {}", self.operation, self.record.tag())
    }
}

/// Operations for one domain, Adds first, each pass in source order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub state: ReconcileState,
    pub operations: Vec<PlannedOperation>,
    /// Keytags held on both sides
    pub in_sync: Vec<u16>,
    /// Keytags held on both sides whose algorithm, digest type or digest differ
    pub divergent: Vec<u16>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn additions(&self) -> impl Iterator<Item = &PlannedOperation> {
        self.operations
            .iter()
            .filter(|op| op.operation == Operation::Add)
    }

    pub fn removals(&self) -> impl Iterator<Item = &PlannedOperation> {
        self.operations
            .iter()
            .filter(|op| op.operation == Operation::Remove)
    }

    /// The DS set that results from applying every operation to `ds`.
    pub fn apply_to(&self, ds: &SignerRecordSet) -> SignerRecordSet {
        let mut next = ds.clone();
        for op in &self.operations {
            match op.operation {
                Operation::Add => {
                    next.insert(op.record.clone());
                }
                Operation::Remove => {
                    next.remove(op.keytag);
                }
            }
        }
        next
    }
}

pub fn reconcile(cds: &SignerRecordSet, ds: &SignerRecordSet) -> ReconciliationPlan {
    if cds.is_empty() {
        return ReconciliationPlan {
            state: ReconcileState::NoCds,
            operations: Vec::new(),
            in_sync: Vec::new(),
            divergent: Vec::new(),
        };
    }

    let add = |record: &SignerRecord| PlannedOperation {
        operation: Operation::Add,
        keytag: record.keytag,
        record: record.clone(),
    };

    if ds.is_empty() {
        return ReconciliationPlan {
            state: ReconcileState::CdsOnlyNoDs,
            operations: cds.iter().map(add).collect(),
            in_sync: Vec::new(),
            divergent: Vec::new(),
        };
    }

    let mut operations = Vec::new();
    let mut in_sync = Vec::new();
    let mut divergent = Vec::new();

    for record in cds {
        match ds.get(record.keytag) {
            Some(held) => {
                in_sync.push(record.keytag);
                if held.conflicts_with(record) {
                    divergent.push(record.keytag);
                }
            }
            None => operations.push(add(record)),
        }
    }

    for record in ds {
        if !cds.contains(record.keytag) {
            operations.push(PlannedOperation {
                operation: Operation::Remove,
                keytag: record.keytag,
                record: record.clone(),
            });
        }
    }

    ReconciliationPlan {
        state: ReconcileState::BothPresent,
        operations,
        in_sync,
        divergent,
    }
}
