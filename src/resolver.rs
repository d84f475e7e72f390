//! DNSSEC-aware lookups with trust classification.
//!
//! Every query goes over TCP with RD and DO set and a 4096 octet EDNS
//! buffer. Answers that will be used to derive DS records, or to decide
//! whether CDS records exist, must come from a server that is either
//! authoritative for the zone (AA) or a validating resolver that set AD.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, trace};

use crate::dns::constants::DNSRcode;
use crate::dns::enums::DNSResourceType;
use crate::dns::rdata::{DnskeyRdata, DsRdata};
use crate::dns::{DNSPacket, ParseError};
use crate::model::{DnskeyRecord, SignerRecord, SignerRecordSet};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("transport error querying {server}: {message}")]
    Transport { server: String, message: String },

    #[error("unparsable response: {0}")]
    Parse(#[from] ParseError),

    #[error("query for {name}/{rtype} returned {}", rcode_name(.rcode))]
    UnexpectedRcode {
        name: String,
        rtype: DNSResourceType,
        rcode: u16,
    },

    #[error("response for {name}/{rtype} is neither authoritative nor validated")]
    Untrusted { name: String, rtype: DNSResourceType },

    #[error("malformed {rtype} record for {name}: {source}")]
    Malformed {
        name: String,
        rtype: DNSResourceType,
        source: ParseError,
    },
}

pub type Result<T> = std::result::Result<T, ResolveError>;

fn rcode_name(rcode: &u16) -> &'static str {
    DNSRcode::name(*rcode)
}

/// Sends one query and returns the response message.
#[async_trait]
pub trait DnsTransport: Send + Sync {
    async fn exchange(&self, query: &DNSPacket) -> Result<DNSPacket>;

    /// Where queries go, for log and error context
    fn server(&self) -> String;
}

/// Length-prefixed DNS over TCP (RFC 1035 section 4.2.2), one connection
/// per query.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    address: String,
    port: u16,
}

impl TcpTransport {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    fn io_error(&self, e: std::io::Error) -> ResolveError {
        ResolveError::Transport {
            server: self.server(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl DnsTransport for TcpTransport {
    async fn exchange(&self, query: &DNSPacket) -> Result<DNSPacket> {
        let query_bytes = query.serialize()?;

        let mut stream = TcpStream::connect((self.address.as_str(), self.port))
            .await
            .map_err(|e| self.io_error(e))?;

        let query_length = query_bytes.len() as u16;
        stream
            .write_all(&query_length.to_be_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        stream
            .write_all(&query_bytes)
            .await
            .map_err(|e| self.io_error(e))?;
        stream.flush().await.map_err(|e| self.io_error(e))?;

        let mut length_buf = [0u8; 2];
        stream
            .read_exact(&mut length_buf)
            .await
            .map_err(|e| self.io_error(e))?;
        let response_length = u16::from_be_bytes(length_buf) as usize;

        let mut response_buf = vec![0; response_length];
        stream
            .read_exact(&mut response_buf)
            .await
            .map_err(|e| self.io_error(e))?;

        trace!(
            "Raw TCP response data ({} bytes): {:02x?}",
            response_length,
            &response_buf[..response_length.min(64)]
        );

        let response = DNSPacket::parse(&response_buf)?;
        if response.header.id != query.header.id {
            return Err(ResolveError::Transport {
                server: self.server(),
                message: format!(
                    "response id {} does not match query id {}",
                    response.header.id, query.header.id
                ),
            });
        }
        Ok(response)
    }

    fn server(&self) -> String {
        if self.address.contains(':') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

/// Why an answer may be relied on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustBasis {
    Authoritative,
    Validated,
    AuthoritativeAndValidated,
}

impl fmt::Display for TrustBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustBasis::Authoritative => write!(f, "authoritative"),
            TrustBasis::Validated => write!(f, "validated"),
            TrustBasis::AuthoritativeAndValidated => write!(f, "authoritative and validated"),
        }
    }
}

/// A NOERROR or NXDOMAIN response, annotated with the AA and AD bits.
///
/// Only answers whose `basis()` is `Some` may feed DS derivation or CDS
/// presence decisions; `TrustResolver::query` enforces that.
#[derive(Debug, Clone)]
pub struct TrustedAnswer {
    pub name: String,
    pub rtype: DNSResourceType,
    pub rcode: u16,
    pub authoritative: bool,
    pub validated: bool,
    pub packet: DNSPacket,
}

impl TrustedAnswer {
    pub fn basis(&self) -> Option<TrustBasis> {
        match (self.authoritative, self.validated) {
            (true, true) => Some(TrustBasis::AuthoritativeAndValidated),
            (true, false) => Some(TrustBasis::Authoritative),
            (false, true) => Some(TrustBasis::Validated),
            (false, false) => None,
        }
    }

    pub fn is_trusted(&self) -> bool {
        self.basis().is_some()
    }

    pub fn is_nxdomain(&self) -> bool {
        self.rcode == DNSRcode::NXDOMAIN
    }

    /// Fail with `Untrusted` when neither AA nor AD is set.
    pub fn require_trust(self) -> Result<Self> {
        if self.is_trusted() {
            Ok(self)
        } else {
            Err(ResolveError::Untrusted {
                name: self.name,
                rtype: self.rtype,
            })
        }
    }
}

/// Issues queries through a transport and classifies the responses.
pub struct TrustResolver {
    transport: Box<dyn DnsTransport>,
}

impl TrustResolver {
    pub fn new(transport: Box<dyn DnsTransport>) -> Self {
        Self { transport }
    }

    /// Query and classify by response code only.
    ///
    /// NOERROR and NXDOMAIN are answers (possibly empty); any other code is
    /// `UnexpectedRcode`.
    pub async fn lookup(&self, name: &str, rtype: DNSResourceType) -> Result<TrustedAnswer> {
        let name = name.trim_end_matches('.').to_string();
        let query = DNSPacket::query(rand::random::<u16>(), &name, rtype);
        debug!(
            "Sending query for {}/{} to {}",
            name,
            rtype,
            self.transport.server()
        );

        let response = self.transport.exchange(&query).await?;
        let rcode = response.rcode();
        debug!(
            "query for {}/{} resulted in rcode {} (aa={}, ad={})",
            name,
            rtype,
            DNSRcode::name(rcode),
            response.header.aa,
            response.header.ad
        );

        if rcode != DNSRcode::NOERROR && rcode != DNSRcode::NXDOMAIN {
            return Err(ResolveError::UnexpectedRcode { name, rtype, rcode });
        }

        Ok(TrustedAnswer {
            name,
            rtype,
            rcode,
            authoritative: response.header.aa,
            validated: response.header.ad,
            packet: response,
        })
    }

    /// Query and require an authoritative or validated response.
    pub async fn query(&self, name: &str, rtype: DNSResourceType) -> Result<TrustedAnswer> {
        let answer = self.lookup(name, rtype).await?.require_trust()?;
        if let Some(basis) = answer.basis() {
            info!("Response for {}/{} is {}", answer.name, rtype, basis);
        }
        Ok(answer)
    }
}

/// DNSKEY records of the answer, indexed by keytag.
pub fn extract_dnskeys(answer: &TrustedAnswer) -> Result<BTreeMap<u16, DnskeyRecord>> {
    let mut dnskeys = BTreeMap::new();
    for rr in answer.packet.answers_of(DNSResourceType::DNSKEY) {
        let rdata = DnskeyRdata::parse(&rr.rdata).map_err(|source| ResolveError::Malformed {
            name: answer.name.clone(),
            rtype: DNSResourceType::DNSKEY,
            source,
        })?;
        let key = DnskeyRecord::new(rdata.flags, rdata.protocol, rdata.algorithm, rdata.public_key);
        debug!("got DNSKEY with keytag {} and flags {}", key.keytag, key.flags);
        dnskeys.insert(key.keytag, key);
    }
    Ok(dnskeys)
}

/// CDS records of the answer, in response order. No CDS is an empty set.
pub fn extract_cds(answer: &TrustedAnswer) -> Result<SignerRecordSet> {
    let mut cds = SignerRecordSet::new();
    for rr in answer.packet.answers_of(DNSResourceType::CDS) {
        let rdata = DsRdata::parse(&rr.rdata).map_err(|source| ResolveError::Malformed {
            name: answer.name.clone(),
            rtype: DNSResourceType::CDS,
            source,
        })?;
        debug!(
            "got CDS with keytag {} and algorithm {}",
            rdata.key_tag, rdata.algorithm
        );
        cds.insert(SignerRecord::new(
            rdata.key_tag,
            rdata.algorithm,
            rdata.digest_type,
            hex::encode_upper(&rdata.digest),
        ));
    }
    Ok(cds)
}
