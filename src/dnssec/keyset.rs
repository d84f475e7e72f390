//! Keyset inspection: DS derivation and RRSIG coverage of a DNSKEY answer.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::{DigestType, DnsSecError};
use crate::dns::common::canonical_wire_name;
use crate::dns::enums::DNSResourceType;
use crate::dns::rdata::RrsigRdata;
use crate::model::{DnskeyRecord, SignerRecord};
use crate::resolver::TrustedAnswer;

/// Compute the DS record `key` would produce under `owner` (RFC 4034 section 5.1.4).
///
/// The digest input is the canonical owner name in wire format followed by
/// the DNSKEY RDATA.
pub fn derive_ds(
    owner: &str,
    key: &DnskeyRecord,
    digest_type: DigestType,
) -> Result<SignerRecord, DnsSecError> {
    if key.protocol != 3 {
        return Err(DnsSecError::InvalidPublicKey);
    }

    let mut input = canonical_wire_name(owner);
    input.extend_from_slice(&key.rdata());

    let digest = digest_type
        .digest(&input)
        .ok_or(DnsSecError::UnsupportedDigestType(digest_type.to_u8()))?;

    Ok(SignerRecord::new(
        key.keytag,
        key.algorithm,
        digest_type.to_u8(),
        hex::encode_upper(digest),
    ))
}

fn dnskey_signatures(answer: &TrustedAnswer) -> impl Iterator<Item = RrsigRdata> + '_ {
    answer
        .packet
        .answers_of(DNSResourceType::RRSIG)
        .filter_map(|rr| match RrsigRdata::parse(&rr.rdata) {
            Ok(sig) => Some(sig),
            Err(e) => {
                warn!("Skipping unparsable RRSIG for {}: {}", answer.name, e);
                None
            }
        })
        .filter(|sig| sig.type_covered == DNSResourceType::DNSKEY)
}

/// Number of RRSIGs over the DNSKEY RRset, per algorithm.
pub fn signing_algorithms(answer: &TrustedAnswer) -> BTreeMap<u8, usize> {
    let mut algorithms = BTreeMap::new();
    for sig in dnskey_signatures(answer) {
        debug!(
            "DNSKEY RRset of {} signed by keytag {} algorithm {}",
            answer.name, sig.key_tag, sig.algorithm
        );
        *algorithms.entry(sig.algorithm).or_insert(0) += 1;
    }
    algorithms
}

/// Whether an RRSIG made with `keytag` covers the DNSKEY RRset.
pub fn is_signed_by(answer: &TrustedAnswer, keytag: u16) -> bool {
    dnskey_signatures(answer).any(|sig| sig.key_tag == keytag)
}
