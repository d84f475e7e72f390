use cdsync::dns::enums::DNSResourceType;
use cdsync::dns::rdata::{DnskeyRdata, DsRdata, RrsigRdata};
use cdsync::dns::{DNSPacket, ParseError};

fn header(id: u16, flags: u16, qd: u16, an: u16, ar: u16) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&id.to_be_bytes());
    buf.extend_from_slice(&flags.to_be_bytes());
    buf.extend_from_slice(&qd.to_be_bytes());
    buf.extend_from_slice(&an.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes());
    buf.extend_from_slice(&ar.to_be_bytes());
    buf
}

fn push_rr(buf: &mut Vec<u8>, name: &[u8], rtype: u16, rdata: &[u8]) {
    buf.extend_from_slice(name);
    buf.extend_from_slice(&rtype.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes());
    buf.extend_from_slice(&3600u32.to_be_bytes());
    buf.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
    buf.extend_from_slice(rdata);
}

/// Response to `example.test CDS` with answers using a pointer to the question name.
fn compressed_cds_response() -> Vec<u8> {
    // QR, AA, RD, RA, AD
    let flags = 0x8000 | 0x0400 | 0x0100 | 0x0080 | 0x0020;
    let mut buf = header(0xBEEF, flags, 1, 2, 1);
    buf.extend_from_slice(b"\x07example\x04test\x00");
    buf.extend_from_slice(&59u16.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes());

    let cds_a = DsRdata {
        key_tag: 12345,
        algorithm: 13,
        digest_type: 2,
        digest: vec![0xAA; 32],
    };
    let cds_b = DsRdata {
        key_tag: 54321,
        algorithm: 13,
        digest_type: 2,
        digest: vec![0xBB; 32],
    };
    push_rr(&mut buf, &[0xC0, 12], 59, &cds_a.to_wire());
    push_rr(&mut buf, &[0xC0, 12], 59, &cds_b.to_wire());

    // OPT: root owner, class = payload size, TTL with DO set
    buf.push(0);
    buf.extend_from_slice(&41u16.to_be_bytes());
    buf.extend_from_slice(&1232u16.to_be_bytes());
    buf.extend_from_slice(&0x0000_8000u32.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes());
    buf
}

#[test]
fn test_compressed_answers_and_flags() {
    let packet = DNSPacket::parse(&compressed_cds_response()).unwrap();

    assert_eq!(packet.header.id, 0xBEEF);
    assert!(packet.header.qr);
    assert!(packet.header.aa);
    assert!(packet.header.ad);
    assert!(!packet.header.cd);
    assert_eq!(packet.questions[0].name(), "example.test");
    assert_eq!(packet.questions[0].qtype, DNSResourceType::CDS);

    let cds: Vec<_> = packet.answers_of(DNSResourceType::CDS).collect();
    assert_eq!(cds.len(), 2);
    assert_eq!(cds[0].name(), "example.test");
    assert_eq!(DsRdata::parse(&cds[1].rdata).unwrap().key_tag, 54321);

    let edns = packet.edns.as_ref().unwrap();
    assert_eq!(edns.udp_payload_size, 1232);
    assert!(edns.do_flag());
    assert!(packet.resources.is_empty());
}

#[test]
fn test_pointer_loop_is_rejected() {
    let mut buf = header(1, 0x8000, 1, 0, 0);
    // question name is a pointer to itself
    buf.extend_from_slice(&[0xC0, 12]);
    buf.extend_from_slice(&59u16.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes());

    assert!(matches!(
        DNSPacket::parse(&buf),
        Err(ParseError::CompressionLoop)
    ));
}

#[test]
fn test_truncated_packets_are_errors() {
    assert!(matches!(
        DNSPacket::parse(&[0u8; 5]),
        Err(ParseError::InvalidHeader)
    ));

    let full = compressed_cds_response();
    assert!(DNSPacket::parse(&full[..full.len() - 20]).is_err());
}

#[test]
fn test_serialized_query_parses_back() {
    let query = DNSPacket::query(42, "Example.Test.", DNSResourceType::DNSKEY);
    let parsed = DNSPacket::parse(&query.serialize().unwrap()).unwrap();

    assert_eq!(parsed.header.id, 42);
    assert!(parsed.header.rd);
    assert_eq!(parsed.questions[0].name(), "Example.Test");
    assert!(parsed.dnssec_requested());
}

#[test]
fn test_unknown_type_survives() {
    let mut buf = header(9, 0x8400, 0, 1, 0);
    push_rr(&mut buf, b"\x04test\x00", 65280, &[1, 2, 3]);
    let packet = DNSPacket::parse(&buf).unwrap();
    assert_eq!(packet.answers[0].rtype, DNSResourceType::Unknown(65280));

    let again = DNSPacket::parse(&packet.serialize().unwrap()).unwrap();
    assert_eq!(again.answers[0].rtype, DNSResourceType::Unknown(65280));
    assert_eq!(again.answers[0].rdata, vec![1, 2, 3]);
}

#[test]
fn test_short_rdata_is_rejected() {
    assert!(DnskeyRdata::parse(&[1, 1, 3]).is_err());
    assert!(DsRdata::parse(&[0, 1]).is_err());
    assert!(RrsigRdata::parse(&[0; 18]).is_err());
}
