use super::{
    ParseError,
    constants::{DO_FLAG, EDNS_PAYLOAD_SIZE},
    enums::{DNSResourceClass, DNSResourceType},
    resource::DNSResource,
};

/// EDNS0 OPT pseudo-record (RFC 6891)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdnsOpt {
    /// Payload size the sender can reassemble
    pub udp_payload_size: u16,
    /// Upper 8 bits of the 12-bit extended RCODE
    pub extended_rcode: u8,
    pub version: u8,
    pub flags: u16,
    pub options: Vec<EdnsOption>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdnsOption {
    pub code: u16,
    pub data: Vec<u8>,
}

impl Default for EdnsOpt {
    fn default() -> Self {
        Self {
            udp_payload_size: EDNS_PAYLOAD_SIZE,
            extended_rcode: 0,
            version: 0,
            flags: 0,
            options: Vec::new(),
        }
    }
}

impl EdnsOpt {
    pub fn with_payload_size(payload_size: u16) -> Self {
        Self {
            udp_payload_size: payload_size,
            ..Self::default()
        }
    }

    /// DNSSEC OK
    pub fn do_flag(&self) -> bool {
        self.flags & DO_FLAG != 0
    }

    pub fn set_do_flag(&mut self, value: bool) {
        if value {
            self.flags |= DO_FLAG;
        } else {
            self.flags &= !DO_FLAG;
        }
    }

    /// Decode an OPT record pulled from the additional section.
    ///
    /// The CLASS field holds the payload size and the TTL packs
    /// extended RCODE, version and flags.
    pub fn from_resource(resource: &DNSResource) -> Result<Self, ParseError> {
        let ttl = resource.ttl;
        let rdata = &resource.rdata;

        let mut options = Vec::new();
        let mut pos = 0;
        while pos < rdata.len() {
            let header = rdata
                .get(pos..pos + 4)
                .ok_or(ParseError::InvalidRdata("truncated EDNS option header"))?;
            let code = u16::from_be_bytes([header[0], header[1]]);
            let len = u16::from_be_bytes([header[2], header[3]]) as usize;
            pos += 4;
            let data = rdata
                .get(pos..pos + len)
                .ok_or(ParseError::InvalidRdata("truncated EDNS option"))?;
            options.push(EdnsOption {
                code,
                data: data.to_vec(),
            });
            pos += len;
        }

        Ok(Self {
            udp_payload_size: resource.rclass.into(),
            extended_rcode: (ttl >> 24) as u8,
            version: (ttl >> 16) as u8,
            flags: ttl as u16,
            options,
        })
    }

    pub fn to_resource(&self) -> DNSResource {
        let mut rdata = Vec::new();
        for option in &self.options {
            rdata.extend_from_slice(&option.code.to_be_bytes());
            rdata.extend_from_slice(&(option.data.len() as u16).to_be_bytes());
            rdata.extend_from_slice(&option.data);
        }

        DNSResource {
            labels: Vec::new(),
            rtype: DNSResourceType::OPT,
            rclass: DNSResourceClass::from(self.udp_payload_size),
            ttl: (u32::from(self.extended_rcode) << 24)
                | (u32::from(self.version) << 16)
                | u32::from(self.flags),
            rdata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_do_flag() {
        let mut opt = EdnsOpt::default();
        assert!(!opt.do_flag());

        opt.set_do_flag(true);
        assert!(opt.do_flag());
        assert_eq!(opt.flags & 0x8000, 0x8000);

        opt.set_do_flag(false);
        assert!(!opt.do_flag());
    }

    #[test]
    fn test_resource_conversion_keeps_payload_and_flags() {
        let mut opt = EdnsOpt::with_payload_size(1232);
        opt.set_do_flag(true);
        opt.options.push(EdnsOption {
            code: 3,
            data: vec![0x01, 0x02, 0x03],
        });

        let resource = opt.to_resource();
        assert_eq!(resource.rtype, DNSResourceType::OPT);
        assert_eq!(u16::from(resource.rclass), 1232);

        let parsed = EdnsOpt::from_resource(&resource).unwrap();
        assert_eq!(parsed, opt);
    }

    #[test]
    fn test_truncated_option_is_rejected() {
        let mut resource = EdnsOpt::default().to_resource();
        resource.rdata = vec![0x00, 0x03, 0x00, 0x05, 0x01];
        assert!(EdnsOpt::from_resource(&resource).is_err());
    }
}
