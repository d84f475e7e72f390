/// DNS Response Code constants from RFC 1035 and subsequent RFCs
pub struct DNSRcode;

impl DNSRcode {
    pub const NOERROR: u16 = 0; // No error
    pub const FORMERR: u16 = 1; // Format error
    pub const SERVFAIL: u16 = 2; // Server failure
    pub const NXDOMAIN: u16 = 3; // Name error
    pub const NOTIMP: u16 = 4; // Not implemented
    pub const REFUSED: u16 = 5; // Query refused
    pub const BADVERS: u16 = 16; // Bad OPT version (EDNS)

    /// Mnemonic for a response code, as dig prints it
    pub fn name(rcode: u16) -> &'static str {
        match rcode {
            Self::NOERROR => "NOERROR",
            Self::FORMERR => "FORMERR",
            Self::SERVFAIL => "SERVFAIL",
            Self::NXDOMAIN => "NXDOMAIN",
            Self::NOTIMP => "NOTIMP",
            Self::REFUSED => "REFUSED",
            6 => "YXDOMAIN",
            7 => "YXRRSET",
            8 => "NXRRSET",
            9 => "NOTAUTH",
            10 => "NOTZONE",
            Self::BADVERS => "BADVERS",
            _ => "UNKNOWN",
        }
    }
}

/// Payload size advertised in the EDNS OPT record of every query
pub const EDNS_PAYLOAD_SIZE: u16 = 4096;

/// DNSSEC OK bit inside the EDNS flags word
pub const DO_FLAG: u16 = 0x8000;

/// Compression pointers followed before a name is rejected as a loop
pub const MAX_POINTER_HOPS: usize = 16;

pub const KSK_FLAGS: u16 = 257;
pub const ZSK_FLAGS: u16 = 256;
