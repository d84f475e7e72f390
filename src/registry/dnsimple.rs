//! DNSimple v2 API client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{
    AccountDomain, DelegationSignerStore, DomainDirectory, RegistryError, RegistryRecord, Result,
};
use crate::model::SignerRecord;

pub const DEFAULT_ENDPOINT: &str = "https://api.dnsimple.com";

#[derive(Debug, Deserialize)]
struct Pagination {
    current_page: u32,
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Vec<T>,
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Single<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DsRecordData {
    id: u64,
    algorithm: String,
    digest: String,
    digest_type: String,
    keytag: String,
}

#[derive(Debug, Serialize)]
struct DsRecordCreate {
    algorithm: String,
    digest: String,
    digest_type: String,
    keytag: String,
}

#[derive(Debug, Deserialize)]
struct DomainData {
    id: u64,
    name: String,
    expires_at: Option<String>,
}

impl DsRecordData {
    fn into_record(self, domain: &str) -> Result<RegistryRecord> {
        fn number<T: std::str::FromStr>(domain: &str, field: &str, value: &str) -> Result<T> {
            value.trim().parse().map_err(|_| RegistryError::Malformed {
                domain: domain.to_string(),
                detail: format!("{} {:?} is not a valid number", field, value),
            })
        }

        Ok(RegistryRecord {
            id: self.id,
            record: SignerRecord::new(
                number(domain, "keytag", &self.keytag)?,
                number(domain, "algorithm", &self.algorithm)?,
                number(domain, "digest_type", &self.digest_type)?,
                self.digest.to_ascii_uppercase(),
            ),
        })
    }
}

impl From<&SignerRecord> for DsRecordCreate {
    fn from(record: &SignerRecord) -> Self {
        Self {
            algorithm: record.algorithm.to_string(),
            digest: record.digest.clone(),
            digest_type: record.digest_type.to_string(),
            keytag: record.keytag.to_string(),
        }
    }
}

/// Talks to one account of the DNSimple registrar.
#[derive(Clone)]
pub struct DnsimpleClient {
    http: Client,
    endpoint: String,
    account: String,
    token: String,
}

impl std::fmt::Debug for DnsimpleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsimpleClient")
            .field("endpoint", &self.endpoint)
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

impl DnsimpleClient {
    pub fn new(endpoint: Option<&str>, account: &str, token: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("cdsync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint
                .unwrap_or(DEFAULT_ENDPOINT)
                .trim_end_matches('/')
                .to_string(),
            account: account.to_string(),
            token: token.to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/v2/{}{}", self.endpoint, self.account, path);
        debug!("{} {}", method, url);
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        trace!("error body: {}", body);
        let message = serde_json::from_str::<ApiMessage>(&body)
            .ok()
            .and_then(|m| m.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

        Err(RegistryError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response, domain: &str) -> Result<T> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| RegistryError::Malformed {
            domain: domain.to_string(),
            detail: e.to_string(),
        })
    }

    /// Fetch every page of a listing.
    async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        context: &str,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1u32;
        loop {
            let page_str = page.to_string();
            let response = self
                .request(Method::GET, path)
                .query(query)
                .query(&[("page", page_str.as_str())])
                .send()
                .await?;
            let listing: Page<T> = Self::decode(Self::check(response).await?, context).await?;
            items.extend(listing.data);

            match listing.pagination {
                Some(p) if p.current_page < p.total_pages => page = p.current_page + 1,
                _ => break,
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl DelegationSignerStore for DnsimpleClient {
    async fn list(&self, domain: &str) -> Result<Vec<RegistryRecord>> {
        let path = format!("/domains/{}/ds_records", domain);
        let records: Vec<DsRecordData> = self.list_all(&path, &[], domain).await?;
        debug!("registry holds {} DS record(s) for {}", records.len(), domain);
        records.into_iter().map(|r| r.into_record(domain)).collect()
    }

    async fn create(&self, domain: &str, record: &SignerRecord) -> Result<u64> {
        let path = format!("/domains/{}/ds_records", domain);
        let response = self
            .request(Method::POST, &path)
            .json(&DsRecordCreate::from(record))
            .send()
            .await?;
        let response = Self::check(response).await?;
        if response.status() != StatusCode::CREATED {
            debug!("unexpected status {} creating DS for {}", response.status(), domain);
        }
        let created: Single<DsRecordData> = Self::decode(response, domain).await?;
        debug!(
            "DS record with keytag {} alg {} created for {} with ID {}",
            record.keytag, record.algorithm, domain, created.data.id
        );
        Ok(created.data.id)
    }

    async fn delete(&self, domain: &str, id: u64) -> Result<()> {
        let path = format!("/domains/{}/ds_records/{}", domain, id);
        let response = self.request(Method::DELETE, &path).send().await?;
        Self::check(response).await?;
        debug!("DS record {} deleted from {}", id, domain);
        Ok(())
    }
}

#[async_trait]
impl DomainDirectory for DnsimpleClient {
    async fn list_domains(&self, name_like: Option<&str>) -> Result<Vec<AccountDomain>> {
        let mut query = vec![("sort", "expiration:desc")];
        if let Some(name) = name_like {
            query.push(("name_like", name));
        }
        let domains: Vec<DomainData> = self
            .list_all("/domains", &query, name_like.unwrap_or("account"))
            .await?;

        Ok(domains
            .into_iter()
            .map(|d| AccountDomain {
                expires_at: d.expires_at.as_deref().and_then(parse_expiry),
                id: d.id,
                name: d.name,
            })
            .collect())
    }
}

fn parse_expiry(value: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(t) => Some(t.with_timezone(&Utc)),
        Err(e) => {
            debug!("failed to parse expiry date ({}): {}", value, e);
            None
        }
    }
}
