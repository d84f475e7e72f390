//! Registry side of the delegation: DS records held by the parent, and the
//! domains of the account.

pub mod dnsimple;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{SignerRecord, SignerRecordSet};

pub use dnsimple::DnsimpleClient;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry request failed: {0}")]
    Transport(String),

    #[error("registry returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed registry data for {domain}: {detail}")]
    Malformed { domain: String, detail: String },
}

impl From<reqwest::Error> for RegistryError {
    fn from(e: reqwest::Error) -> Self {
        RegistryError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// A DS record as stored by the registry, with the id needed to delete it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryRecord {
    pub id: u64,
    pub record: SignerRecord,
}

/// Result of a lookup by keytag. `records` holds every DS under that keytag
/// (one per digest type, typically) and is empty when the keytag is not
/// held. `total` counts all DS records of the domain, `keytags` the distinct
/// keytags among them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DsLookup {
    pub records: Vec<RegistryRecord>,
    pub total: usize,
    pub keytags: usize,
}

impl DsLookup {
    pub fn found(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn first(&self) -> Option<&RegistryRecord> {
        self.records.first()
    }

    pub fn ids(&self) -> Vec<u64> {
        self.records.iter().map(|r| r.id).collect()
    }

    /// The keytag is held and no other keytag is
    pub fn is_sole_record(&self) -> bool {
        self.remains_sole(0)
    }

    /// Like [`is_sole_record`](Self::is_sole_record), after `pending` more
    /// keytags (negative for fewer) than the registry currently holds.
    pub fn remains_sole(&self, pending: isize) -> bool {
        self.found() && self.keytags as isize + pending == 1
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountDomain {
    pub id: u64,
    pub name: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// List, create and delete DS records of one domain. Not transactional.
#[async_trait]
pub trait DelegationSignerStore: Send + Sync {
    async fn list(&self, domain: &str) -> Result<Vec<RegistryRecord>>;

    /// Returns the id the registry assigned.
    async fn create(&self, domain: &str, record: &SignerRecord) -> Result<u64>;

    async fn delete(&self, domain: &str, id: u64) -> Result<()>;

    async fn exists(&self, domain: &str, keytag: u16) -> Result<DsLookup> {
        let held = self.list(domain).await?;
        let total = held.len();
        let keytags = held
            .iter()
            .map(|r| r.record.keytag)
            .collect::<HashSet<_>>()
            .len();
        let records = held
            .into_iter()
            .filter(|r| r.record.keytag == keytag)
            .collect();
        Ok(DsLookup {
            records,
            total,
            keytags,
        })
    }

    /// Current DS set, keyed by keytag in listing order
    async fn signer_records(&self, domain: &str) -> Result<SignerRecordSet> {
        Ok(self
            .list(domain)
            .await?
            .into_iter()
            .map(|r| r.record)
            .collect())
    }
}

#[async_trait]
pub trait DomainDirectory: Send + Sync {
    /// Domains of the account, optionally filtered by a name substring.
    async fn list_domains(&self, name_like: Option<&str>) -> Result<Vec<AccountDomain>>;

    async fn domain_exists(&self, domain: &str) -> Result<bool> {
        let domains = self.list_domains(Some(domain)).await?;
        Ok(domains.iter().any(|d| d.name.eq_ignore_ascii_case(domain)))
    }
}
