//! Shared fakes and packet builders for the integration tests.

#![allow(dead_code)] // Each test file uses a different subset

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cdsync::config::Config;
use cdsync::dns::DNSPacket;
use cdsync::dns::enums::DNSResourceType;
use cdsync::dns::rdata::{DsRdata, RrsigRdata};
use cdsync::dns::resource::DNSResource;
use cdsync::dnssec::DigestType;
use cdsync::policy::Confirm;
use cdsync::registry::{
    AccountDomain, DelegationSignerStore, DomainDirectory, RegistryError, RegistryRecord,
};
use cdsync::resolver::{DnsTransport, ResolveError, TrustResolver};
use cdsync::{DnskeyRecord, SignerRecord, SyncContext};

pub const DOMAIN: &str = "example.test";

pub fn test_config() -> Config {
    Config {
        api_key: "test-token".to_string(),
        api_endpoint: None,
        account_number: "1010".to_string(),
        nameserver_addr: "127.0.0.1".to_string(),
        nameserver_port: 53,
        digest_type: DigestType::Sha256,
    }
}

/// Build a response to a query for `name`/`rtype` with the given flags.
pub fn response(
    name: &str,
    rtype: DNSResourceType,
    aa: bool,
    ad: bool,
    answers: Vec<DNSResource>,
) -> DNSPacket {
    let mut packet = DNSPacket::query(0, name, rtype);
    packet.header.qr = true;
    packet.header.ra = true;
    packet.header.aa = aa;
    packet.header.ad = ad;
    packet.answers = answers;
    packet
}

pub fn cds_rr(name: &str, keytag: u16, algorithm: u8, digest_hex: &str) -> DNSResource {
    let rdata = DsRdata {
        key_tag: keytag,
        algorithm,
        digest_type: 2,
        digest: hex::decode(digest_hex).unwrap(),
    };
    DNSResource::new(name, DNSResourceType::CDS, 3600, rdata.to_wire())
}

pub fn dnskey_rr(name: &str, key: &DnskeyRecord) -> DNSResource {
    DNSResource::new(name, DNSResourceType::DNSKEY, 3600, key.rdata())
}

pub fn rrsig_rr(name: &str, covered: DNSResourceType, algorithm: u8, keytag: u16) -> DNSResource {
    let sig = RrsigRdata {
        type_covered: covered,
        algorithm,
        labels: name.split('.').count() as u8,
        original_ttl: 3600,
        sig_expiration: 1_900_000_000,
        sig_inception: 1_700_000_000,
        key_tag: keytag,
        signer_name: name.to_string(),
        signature: vec![0xAB; 64],
    };
    DNSResource::new(name, DNSResourceType::RRSIG, 3600, sig.to_wire())
}

pub fn ksk(algorithm: u8, seed: u8) -> DnskeyRecord {
    DnskeyRecord::new(257, 3, algorithm, vec![seed; 64])
}

pub fn zsk(algorithm: u8, seed: u8) -> DnskeyRecord {
    DnskeyRecord::new(256, 3, algorithm, vec![seed; 64])
}

/// Answers queries from a fixed table keyed by name and type. Clones share
/// the table and the query log.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    responses: Arc<Mutex<HashMap<(String, DNSResourceType), DNSPacket>>>,
    pub queries: Arc<Mutex<Vec<(String, DNSResourceType)>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(&self, name: &str, rtype: DNSResourceType, packet: DNSPacket) {
        self.responses
            .lock()
            .unwrap()
            .insert((name.to_string(), rtype), packet);
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl DnsTransport for ScriptedTransport {
    async fn exchange(&self, query: &DNSPacket) -> Result<DNSPacket, ResolveError> {
        let question = &query.questions[0];
        let key = (question.name(), question.qtype);
        self.queries.lock().unwrap().push(key.clone());

        let mut packet = self
            .responses
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| ResolveError::Transport {
                server: self.server(),
                message: format!("no scripted answer for {}/{}", key.0, key.1),
            })?;
        packet.header.id = query.header.id;
        Ok(packet)
    }

    fn server(&self) -> String {
        "scripted".to_string()
    }
}

/// In-memory registry for one account.
#[derive(Default)]
pub struct FakeRegistry {
    records: Mutex<Vec<(String, RegistryRecord)>>,
    domains: Mutex<Vec<AccountDomain>>,
    next_id: Mutex<u64>,
    /// Every call, e.g. `list example.test`, `create example.test 12345`
    pub calls: Mutex<Vec<String>>,
    /// Keytags whose creation fails
    pub reject_create: Mutex<Vec<u16>>,
    pub fail_listing: Mutex<bool>,
}

impl FakeRegistry {
    pub fn new() -> Arc<Self> {
        let registry = Self::default();
        *registry.next_id.lock().unwrap() = 100;
        Arc::new(registry)
    }

    pub fn add_domain(&self, name: &str) {
        let mut domains = self.domains.lock().unwrap();
        let id = domains.len() as u64 + 1;
        domains.push(AccountDomain {
            id,
            name: name.to_string(),
            expires_at: None,
        });
    }

    pub fn hold(&self, domain: &str, record: SignerRecord) -> u64 {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let id = *next_id;
        self.records.lock().unwrap().push((
            domain.to_string(),
            RegistryRecord { id, record },
        ));
        id
    }

    pub fn keytags(&self, domain: &str) -> Vec<u16> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _)| d == domain)
            .map(|(_, r)| r.record.keytag)
            .collect()
    }

    pub fn held(&self, domain: &str, keytag: u16) -> Option<SignerRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|(d, r)| d == domain && r.record.keytag == keytag)
            .map(|(_, r)| r.record.clone())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("create") || c.starts_with("delete"))
            .collect()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl DelegationSignerStore for FakeRegistry {
    async fn list(&self, domain: &str) -> Result<Vec<RegistryRecord>, RegistryError> {
        self.log(format!("list {}", domain));
        if *self.fail_listing.lock().unwrap() {
            return Err(RegistryError::Transport("connection reset".to_string()));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _)| d == domain)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn create(&self, domain: &str, record: &SignerRecord) -> Result<u64, RegistryError> {
        self.log(format!("create {} {}", domain, record.keytag));
        if self.reject_create.lock().unwrap().contains(&record.keytag) {
            return Err(RegistryError::Status {
                status: 400,
                message: "Validation failed".to_string(),
            });
        }
        Ok(self.hold(domain, record.clone()))
    }

    async fn delete(&self, domain: &str, id: u64) -> Result<(), RegistryError> {
        self.log(format!("delete {} {}", domain, id));
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|(d, r)| !(d == domain && r.id == id));
        if records.len() == before {
            return Err(RegistryError::Status {
                status: 404,
                message: "Not found".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DomainDirectory for FakeRegistry {
    async fn list_domains(
        &self,
        name_like: Option<&str>,
    ) -> Result<Vec<AccountDomain>, RegistryError> {
        self.log("list_domains".to_string());
        if *self.fail_listing.lock().unwrap() {
            return Err(RegistryError::Transport("connection reset".to_string()));
        }
        Ok(self
            .domains
            .lock()
            .unwrap()
            .iter()
            .filter(|d| name_like.is_none_or(|n| d.name.contains(n)))
            .cloned()
            .collect())
    }
}

/// Records prompts and answers with a fixed value.
pub struct RecordingConfirm {
    pub answer: bool,
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingConfirm {
    pub fn new(answer: bool) -> Arc<Self> {
        Arc::new(Self {
            answer,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Confirm for RecordingConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answer
    }
}

pub fn context(
    transport: &ScriptedTransport,
    registry: &Arc<FakeRegistry>,
    confirm: Arc<dyn Confirm>,
) -> SyncContext {
    SyncContext {
        config: Arc::new(test_config()),
        resolver: TrustResolver::new(Box::new(transport.clone())),
        store: registry.clone(),
        directory: registry.clone(),
        confirm,
    }
}
