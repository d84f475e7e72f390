//! Typed views over the RDATA of the DNSSEC record types.
//!
//! DS and CDS share one wire format (RFC 7344 section 3.1), as do DNSKEY
//! and CDNSKEY, so one struct serves each pair.

use super::{ParseError, common::canonical_wire_name, enums::DNSResourceType};

/// DNSKEY / CDNSKEY RDATA (RFC 4034 section 2.1)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DnskeyRdata {
    pub flags: u16,
    pub protocol: u8,
    pub algorithm: u8,
    pub public_key: Vec<u8>,
}

impl DnskeyRdata {
    pub fn parse(rdata: &[u8]) -> Result<Self, ParseError> {
        if rdata.len() < 4 {
            return Err(ParseError::InvalidRdata("DNSKEY shorter than 4 octets"));
        }
        Ok(Self {
            flags: u16::from_be_bytes([rdata[0], rdata[1]]),
            protocol: rdata[2],
            algorithm: rdata[3],
            public_key: rdata[4..].to_vec(),
        })
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(4 + self.public_key.len());
        wire.extend_from_slice(&self.flags.to_be_bytes());
        wire.push(self.protocol);
        wire.push(self.algorithm);
        wire.extend_from_slice(&self.public_key);
        wire
    }
}

/// DS / CDS RDATA (RFC 4034 section 5.1)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DsRdata {
    pub key_tag: u16,
    pub algorithm: u8,
    pub digest_type: u8,
    pub digest: Vec<u8>,
}

impl DsRdata {
    pub fn parse(rdata: &[u8]) -> Result<Self, ParseError> {
        if rdata.len() < 4 {
            return Err(ParseError::InvalidRdata("DS shorter than 4 octets"));
        }
        Ok(Self {
            key_tag: u16::from_be_bytes([rdata[0], rdata[1]]),
            algorithm: rdata[2],
            digest_type: rdata[3],
            digest: rdata[4..].to_vec(),
        })
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(4 + self.digest.len());
        wire.extend_from_slice(&self.key_tag.to_be_bytes());
        wire.push(self.algorithm);
        wire.push(self.digest_type);
        wire.extend_from_slice(&self.digest);
        wire
    }
}

/// RRSIG RDATA (RFC 4034 section 3.1)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RrsigRdata {
    pub type_covered: DNSResourceType,
    pub algorithm: u8,
    pub labels: u8,
    pub original_ttl: u32,
    pub sig_expiration: u32,
    pub sig_inception: u32,
    pub key_tag: u16,
    pub signer_name: String,
    pub signature: Vec<u8>,
}

impl RrsigRdata {
    pub fn parse(rdata: &[u8]) -> Result<Self, ParseError> {
        if rdata.len() < 19 {
            return Err(ParseError::InvalidRdata("RRSIG shorter than 19 octets"));
        }
        let be32 = |at: usize| {
            u32::from_be_bytes([rdata[at], rdata[at + 1], rdata[at + 2], rdata[at + 3]])
        };

        // Signer name is never compressed (RFC 4034 section 3.1.7)
        let mut pos = 18;
        let mut labels = Vec::new();
        loop {
            let len = *rdata
                .get(pos)
                .ok_or(ParseError::InvalidRdata("unterminated RRSIG signer name"))?
                as usize;
            pos += 1;
            if len == 0 {
                break;
            }
            if len > 63 {
                return Err(ParseError::InvalidRdata("compressed RRSIG signer name"));
            }
            let label = rdata
                .get(pos..pos + len)
                .ok_or(ParseError::InvalidRdata("truncated RRSIG signer name"))?;
            labels.push(String::from_utf8_lossy(label).into_owned());
            pos += len;
        }

        Ok(Self {
            type_covered: u16::from_be_bytes([rdata[0], rdata[1]]).into(),
            algorithm: rdata[2],
            labels: rdata[3],
            original_ttl: be32(4),
            sig_expiration: be32(8),
            sig_inception: be32(12),
            key_tag: u16::from_be_bytes([rdata[16], rdata[17]]),
            signer_name: labels.join("."),
            signature: rdata[pos..].to_vec(),
        })
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire = Vec::new();
        wire.extend_from_slice(&u16::from(self.type_covered).to_be_bytes());
        wire.push(self.algorithm);
        wire.push(self.labels);
        wire.extend_from_slice(&self.original_ttl.to_be_bytes());
        wire.extend_from_slice(&self.sig_expiration.to_be_bytes());
        wire.extend_from_slice(&self.sig_inception.to_be_bytes());
        wire.extend_from_slice(&self.key_tag.to_be_bytes());
        wire.extend_from_slice(&canonical_wire_name(&self.signer_name));
        wire.extend_from_slice(&self.signature);
        wire
    }
}
