pub mod common;
pub mod constants;
pub mod edns;
pub mod enums;
pub mod header;
pub mod question;
pub mod rdata;
pub mod resource;

use bitstream_io::{BigEndian, BitReader, BitWriter};
use common::PacketComponent;
use constants::EDNS_PAYLOAD_SIZE;
use edns::EdnsOpt;
use enums::DNSResourceType;
use header::DNSHeader;
use question::DNSQuestion;
use resource::DNSResource;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSPacket {
    pub header: DNSHeader,
    pub questions: Vec<DNSQuestion>,
    pub answers: Vec<DNSResource>,
    pub authorities: Vec<DNSResource>,
    pub resources: Vec<DNSResource>,
    /// EDNS0 OPT record if present (extracted from additional records)
    pub edns: Option<EdnsOpt>,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid DNS header")]
    InvalidHeader,
    #[error("Invalid DNS label")]
    InvalidLabel,
    #[error("Compression pointer loop")]
    CompressionLoop,
    #[error("Invalid rdata: {0}")]
    InvalidRdata(&'static str),
    #[error("Invalid bit stream: {0}")]
    InvalidBitStream(String),
}

impl From<std::io::Error> for ParseError {
    fn from(e: std::io::Error) -> Self {
        ParseError::InvalidBitStream(e.to_string())
    }
}

impl DNSPacket {
    /// Build a recursive query with EDNS0, a 4096 octet buffer and DO set.
    pub fn query(id: u16, name: &str, qtype: DNSResourceType) -> Self {
        let mut packet = DNSPacket {
            header: DNSHeader {
                id,
                rd: true,
                qdcount: 1,
                ..Default::default()
            },
            questions: vec![DNSQuestion::new(name, qtype)],
            ..Default::default()
        };
        packet.add_edns(EDNS_PAYLOAD_SIZE, true);
        packet
    }

    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        trace!("Parsing DNS packet, size: {} bytes", buf.len());
        if buf.len() < 12 {
            return Err(ParseError::InvalidHeader);
        }
        let mut reader = BitReader::<_, BigEndian>::new(buf);
        let mut packet = DNSPacket::default();
        packet.header.read(&mut reader, buf)?;
        debug!(
            "Parsed DNS header: id={}, rcode={}, aa={}, ad={}, answers={}",
            packet.header.id,
            packet.header.rcode,
            packet.header.aa,
            packet.header.ad,
            packet.header.ancount
        );

        for _ in 0..packet.header.qdcount {
            let mut question = DNSQuestion::default();
            question.read(&mut reader, buf)?;
            packet.questions.push(question);
        }

        for _ in 0..packet.header.ancount {
            let mut answer = DNSResource::default();
            answer.read(&mut reader, buf)?;
            packet.answers.push(answer);
        }

        for _ in 0..packet.header.nscount {
            let mut authority = DNSResource::default();
            authority.read(&mut reader, buf)?;
            packet.authorities.push(authority);
        }

        for _ in 0..packet.header.arcount {
            let mut resource = DNSResource::default();
            resource.read(&mut reader, buf)?;

            if resource.rtype == DNSResourceType::OPT && resource.labels.is_empty() {
                packet.edns = Some(EdnsOpt::from_resource(&resource)?);
                continue;
            }

            packet.resources.push(resource);
        }

        Ok(packet)
    }

    /// Serialize the packet. Section counts are taken from the sections
    /// themselves, not from the header.
    pub fn serialize(&self) -> Result<Vec<u8>, ParseError> {
        let mut buf = Vec::new();
        let mut writer: BitWriter<&mut Vec<u8>, BigEndian> = BitWriter::new(&mut buf);

        let mut header = self.header.clone();
        header.qdcount = self.questions.len() as u16;
        header.ancount = self.answers.len() as u16;
        header.nscount = self.authorities.len() as u16;
        header.arcount = self.resources.len() as u16 + u16::from(self.edns.is_some());
        header.write(&mut writer)?;

        for question in &self.questions {
            question.write(&mut writer)?;
        }
        for answer in &self.answers {
            answer.write(&mut writer)?;
        }
        for authority in &self.authorities {
            authority.write(&mut writer)?;
        }
        for resource in &self.resources {
            resource.write(&mut writer)?;
        }
        if let Some(edns) = &self.edns {
            edns.to_resource().write(&mut writer)?;
        }

        Ok(buf)
    }

    pub fn add_edns(&mut self, payload_size: u16, do_flag: bool) {
        let mut edns = EdnsOpt::with_payload_size(payload_size);
        edns.set_do_flag(do_flag);
        self.edns = Some(edns);
    }

    /// Check if DNSSEC is requested (DO flag)
    pub fn dnssec_requested(&self) -> bool {
        self.edns.as_ref().is_some_and(|edns| edns.do_flag())
    }

    /// Full 12-bit response code: the header's four bits extended by the
    /// upper eight from the OPT record (RFC 6891 section 6.1.3)
    pub fn rcode(&self) -> u16 {
        let extended = self.edns.as_ref().map_or(0, |edns| edns.extended_rcode);
        (u16::from(extended) << 4) | u16::from(self.header.rcode & 0x0F)
    }

    /// Split `rcode` between the header and the OPT record. Codes above 15
    /// are only representable when the packet carries EDNS.
    pub fn set_rcode(&mut self, rcode: u16) {
        self.header.rcode = (rcode & 0x0F) as u8;
        if let Some(edns) = self.edns.as_mut() {
            edns.extended_rcode = (rcode >> 4) as u8;
        }
    }

    /// Answer records of one type, in response order
    pub fn answers_of(&self, rtype: DNSResourceType) -> impl Iterator<Item = &DNSResource> {
        self.answers.iter().filter(move |rr| rr.rtype == rtype)
    }
}
