pub mod algorithm;
pub mod digest;
pub mod errors;
pub mod key_tag;
pub mod keyset;

pub use algorithm::DnsSecAlgorithm;
pub use digest::DigestType;
pub use errors::DnsSecError;
pub use key_tag::calculate_key_tag;
pub use keyset::{derive_ds, is_signed_by, signing_algorithms};
