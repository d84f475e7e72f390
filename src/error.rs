use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::dnssec::DnsSecError;
use crate::registry::RegistryError;
use crate::resolver::ResolveError;

/// Coarse classification used to decide whether a failure stops a
/// domain, an operation, or the whole run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    UntrustedAnswer,
    NotFound,
    PolicyAbort,
    PartialApply,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Transport => "transport error",
            ErrorKind::UntrustedAnswer => "untrusted answer",
            ErrorKind::NotFound => "not found",
            ErrorKind::PolicyAbort => "aborted by policy",
            ErrorKind::PartialApply => "partially applied",
            ErrorKind::Config => "configuration error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    DnsSec(#[from] DnsSecError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{what} not found in {domain}")]
    NotFound { domain: String, what: String },

    #[error("{operation} aborted for {domain}")]
    PolicyAbort { domain: String, operation: String },

    #[error("{failed} of {total} operation(s) failed for {domain}")]
    PartialApply {
        domain: String,
        failed: usize,
        total: usize,
    },
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Resolve(ResolveError::Untrusted { .. }) => ErrorKind::UntrustedAnswer,
            SyncError::Resolve(_) | SyncError::Registry(_) => ErrorKind::Transport,
            // Bad key material or an uncomputable digest stops the operation
            // like a transport failure
            SyncError::DnsSec(_) => ErrorKind::Transport,
            SyncError::Config(_) => ErrorKind::Config,
            SyncError::NotFound { .. } => ErrorKind::NotFound,
            SyncError::PolicyAbort { .. } => ErrorKind::PolicyAbort,
            SyncError::PartialApply { .. } => ErrorKind::PartialApply,
        }
    }

    /// Only configuration problems stop a whole run.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Config
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
