use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnsSecError {
    #[error("Unsupported digest type: {0}")]
    UnsupportedDigestType(u8),
    #[error("Invalid DNSKEY public key format")]
    InvalidPublicKey,
}

pub type Result<T> = std::result::Result<T, DnsSecError>;
