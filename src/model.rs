//! Records compared and exchanged during a reconciliation pass.

use std::fmt;

use crate::dns::constants::{KSK_FLAGS, ZSK_FLAGS};
use crate::dnssec::{DnsSecAlgorithm, calculate_key_tag};

/// A CDS as published by the child, or a DS as held by the registry.
///
/// Within one set the keytag is the identity; algorithm, digest type and
/// digest are attributes. The digest is upper-case hex.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SignerRecord {
    pub keytag: u16,
    pub algorithm: u8,
    pub digest_type: u8,
    pub digest: String,
}

impl SignerRecord {
    pub fn new(keytag: u16, algorithm: u8, digest_type: u8, digest: impl Into<String>) -> Self {
        Self {
            keytag,
            algorithm,
            digest_type,
            digest: digest.into(),
        }
    }

    /// `keytag/algorithm`, the short form used in reports
    pub fn tag(&self) -> String {
        format!("{}/{}", self.keytag, self.algorithm)
    }

    /// Same keytag but a different algorithm, digest type or digest
    pub fn conflicts_with(&self, other: &SignerRecord) -> bool {
        self.keytag == other.keytag
            && (self.algorithm != other.algorithm
                || self.digest_type != other.digest_type
                || !self.digest.eq_ignore_ascii_case(&other.digest))
    }
}

impl fmt::Display for SignerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>5} {} {} {}",
            self.keytag, self.algorithm, self.digest_type, self.digest
        )
    }
}

/// Keytag-indexed records of one domain from one origin.
///
/// Iteration follows the order records were inserted, which is the order
/// the DNS response or the registry listing returned them. A second record
/// with a keytag already present replaces the first in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignerRecordSet {
    records: Vec<SignerRecord>,
}

impl SignerRecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning the one it displaced if the keytag was taken.
    pub fn insert(&mut self, record: SignerRecord) -> Option<SignerRecord> {
        match self.records.iter_mut().find(|r| r.keytag == record.keytag) {
            Some(existing) => Some(std::mem::replace(existing, record)),
            None => {
                self.records.push(record);
                None
            }
        }
    }

    pub fn get(&self, keytag: u16) -> Option<&SignerRecord> {
        self.records.iter().find(|r| r.keytag == keytag)
    }

    pub fn contains(&self, keytag: u16) -> bool {
        self.get(keytag).is_some()
    }

    pub fn remove(&mut self, keytag: u16) -> Option<SignerRecord> {
        let index = self.records.iter().position(|r| r.keytag == keytag)?;
        Some(self.records.remove(index))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignerRecord> {
        self.records.iter()
    }

    pub fn keytags(&self) -> Vec<u16> {
        self.records.iter().map(|r| r.keytag).collect()
    }

    /// `keytag/algorithm` list joined with ", "
    pub fn tags(&self) -> String {
        self.records
            .iter()
            .map(SignerRecord::tag)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromIterator<SignerRecord> for SignerRecordSet {
    fn from_iter<I: IntoIterator<Item = SignerRecord>>(iter: I) -> Self {
        let mut set = SignerRecordSet::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

impl<'a> IntoIterator for &'a SignerRecordSet {
    type Item = &'a SignerRecord;
    type IntoIter = std::slice::Iter<'a, SignerRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Role of a DNSKEY as signalled by its flags field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyRole {
    Ksk,
    Zsk,
    Other(u16),
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRole::Ksk => write!(f, "KSK"),
            KeyRole::Zsk => write!(f, "ZSK"),
            KeyRole::Other(_) => write!(f, "unknown"),
        }
    }
}

/// A DNSKEY as published in the zone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DnskeyRecord {
    pub keytag: u16,
    pub flags: u16,
    pub protocol: u8,
    pub algorithm: u8,
    pub public_key: Vec<u8>,
}

impl DnskeyRecord {
    /// Build a record, computing its keytag from the RDATA.
    pub fn new(flags: u16, protocol: u8, algorithm: u8, public_key: Vec<u8>) -> Self {
        let mut record = Self {
            keytag: 0,
            flags,
            protocol,
            algorithm,
            public_key,
        };
        record.keytag = calculate_key_tag(&record.rdata());
        record
    }

    pub fn role(&self) -> KeyRole {
        match self.flags {
            KSK_FLAGS => KeyRole::Ksk,
            ZSK_FLAGS => KeyRole::Zsk,
            other => KeyRole::Other(other),
        }
    }

    pub fn is_zsk(&self) -> bool {
        self.role() == KeyRole::Zsk
    }

    /// DNSKEY RDATA in wire format
    pub fn rdata(&self) -> Vec<u8> {
        let mut rdata = Vec::with_capacity(4 + self.public_key.len());
        rdata.extend_from_slice(&self.flags.to_be_bytes());
        rdata.push(self.protocol);
        rdata.push(self.algorithm);
        rdata.extend_from_slice(&self.public_key);
        rdata
    }
}

impl fmt::Display for DnskeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "keytag: {:>5}; flags: {} ({}); Algorithm: {} ({})",
            self.keytag,
            self.flags,
            self.role(),
            self.algorithm,
            DnsSecAlgorithm::mnemonic(self.algorithm)
        )
    }
}
