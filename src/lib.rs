pub mod config;
pub mod controller;
pub mod dns;
pub mod dnssec;
pub mod error;
pub mod model;
pub mod policy;
pub mod reconcile;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod telemetry;

pub use controller::{Controller, RunOptions, SyncContext};
pub use dns::DNSPacket;
pub use error::{ErrorKind, SyncError};
pub use model::{DnskeyRecord, SignerRecord, SignerRecordSet};
