mod common;

use cdsync::dns::DNSPacket;
use cdsync::dns::constants::DNSRcode;
use cdsync::dns::enums::DNSResourceType;
use cdsync::resolver::{
    ResolveError, TcpTransport, TrustBasis, TrustResolver, extract_cds, extract_dnskeys,
};
use common::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Serve one TCP query. `respond` turns the parsed query into the reply.
async fn fake_nameserver<F>(respond: F) -> (u16, oneshot::Receiver<DNSPacket>)
where
    F: FnOnce(&DNSPacket) -> DNSPacket + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (seen_tx, seen_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut len = [0u8; 2];
        stream.read_exact(&mut len).await.unwrap();
        let mut buf = vec![0u8; u16::from_be_bytes(len) as usize];
        stream.read_exact(&mut buf).await.unwrap();

        let query = DNSPacket::parse(&buf).unwrap();
        let reply = respond(&query).serialize().unwrap();
        let _ = seen_tx.send(query);

        stream
            .write_all(&(reply.len() as u16).to_be_bytes())
            .await
            .unwrap();
        stream.write_all(&reply).await.unwrap();
    });

    (port, seen_rx)
}

fn resolver(port: u16) -> TrustResolver {
    TrustResolver::new(Box::new(TcpTransport::new("127.0.0.1", port)))
}

fn reply_to(
    query: &DNSPacket,
    aa: bool,
    ad: bool,
    rcode: u16,
    cds: &[(u16, u8, &str)],
) -> DNSPacket {
    let name = query.questions[0].name();
    let records = cds
        .iter()
        .map(|(k, a, d)| cds_rr(&name, *k, *a, d))
        .collect();
    let mut packet = response(&name, query.questions[0].qtype, aa, ad, records);
    packet.header.id = query.header.id;
    packet.set_rcode(rcode);
    packet
}

#[tokio::test]
async fn test_query_sends_rd_and_do_over_tcp() {
    let (port, seen) = fake_nameserver(|q| {
        reply_to(q, true, false, DNSRcode::NOERROR, &[(12345, 13, "AA")])
    })
    .await;

    let answer = resolver(port)
        .query(DOMAIN, DNSResourceType::CDS)
        .await
        .unwrap();
    assert_eq!(answer.basis(), Some(TrustBasis::Authoritative));
    assert_eq!(extract_cds(&answer).unwrap().tags(), "12345/13");

    let query = seen.await.unwrap();
    assert!(query.header.rd);
    assert!(query.dnssec_requested());
    assert_eq!(query.edns.as_ref().map(|e| e.udp_payload_size), Some(4096));
    assert_eq!(query.questions[0].qtype, DNSResourceType::CDS);
}

#[tokio::test]
async fn test_unauthenticated_answer_is_untrusted() {
    let (port, _seen) = fake_nameserver(|q| {
        reply_to(q, false, false, DNSRcode::NOERROR, &[(1, 13, "AA")])
    })
    .await;

    let err = resolver(port)
        .query(DOMAIN, DNSResourceType::CDS)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::Untrusted { .. }));
}

#[tokio::test]
async fn test_lookup_does_not_require_trust() {
    let (port, _seen) = fake_nameserver(|q| {
        reply_to(q, false, false, DNSRcode::NOERROR, &[])
    })
    .await;

    let answer = resolver(port)
        .lookup(DOMAIN, DNSResourceType::CDS)
        .await
        .unwrap();
    assert_eq!(answer.basis(), None);
    assert!(!answer.is_trusted());
}

#[tokio::test]
async fn test_validated_nxdomain_is_an_empty_answer() {
    let (port, _seen) = fake_nameserver(|q| {
        reply_to(q, false, true, DNSRcode::NXDOMAIN, &[])
    })
    .await;

    let answer = resolver(port)
        .query(DOMAIN, DNSResourceType::DNSKEY)
        .await
        .unwrap();
    assert!(answer.is_nxdomain());
    assert!(extract_dnskeys(&answer).unwrap().is_empty());
}

#[tokio::test]
async fn test_servfail_is_unexpected() {
    let (port, _seen) = fake_nameserver(|q| {
        reply_to(q, true, false, DNSRcode::SERVFAIL, &[])
    })
    .await;

    let err = resolver(port)
        .query(DOMAIN, DNSResourceType::CDS)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ResolveError::UnexpectedRcode {
            rcode: DNSRcode::SERVFAIL,
            ..
        }
    ));
    assert!(err.to_string().contains("SERVFAIL"));
}

#[tokio::test]
async fn test_extended_rcode_is_not_mistaken_for_noerror() {
    let (port, _seen) = fake_nameserver(|q| {
        reply_to(q, true, false, DNSRcode::BADVERS, &[(1, 13, "AA")])
    })
    .await;

    let err = resolver(port)
        .query(DOMAIN, DNSResourceType::CDS)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ResolveError::UnexpectedRcode {
            rcode: DNSRcode::BADVERS,
            ..
        }
    ));
    assert!(err.to_string().contains("BADVERS"));
}

#[tokio::test]
async fn test_mismatched_id_is_a_transport_error() {
    let (port, _seen) = fake_nameserver(|q| {
        let mut reply = reply_to(q, true, false, DNSRcode::NOERROR, &[]);
        reply.header.id = q.header.id.wrapping_add(1);
        reply
    })
    .await;

    let err = resolver(port)
        .query(DOMAIN, DNSResourceType::CDS)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::Transport { .. }));
}

#[tokio::test]
async fn test_connection_refused_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = resolver(port)
        .query(DOMAIN, DNSResourceType::CDS)
        .await
        .unwrap_err();
    match err {
        ResolveError::Transport { server, .. } => assert_eq!(server, format!("127.0.0.1:{}", port)),
        other => panic!("expected Transport, got {:?}", other),
    }
}
