//! End-to-end engine behavior against scripted loopback resolvers.

mod helpers;

use helpers::{spawn_truncating_dual, spawn_udp, UdpBehavior};
use lodestone_dns_client::{ClientOptions, DnsClient, RData, RecordClass, RecordType, ResolveError};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

fn client(endpoints: &[String], options: ClientOptions) -> DnsClient {
    DnsClient::from_endpoints(endpoints, options).unwrap()
}

fn fast(options: ClientOptions) -> ClientOptions {
    ClientOptions {
        use_random_server: false,
        ..options
    }
}

#[tokio::test]
async fn cache_hit_answers_second_query_without_a_wire_exchange() {
    helpers::init_tracing();
    let server = spawn_udp(UdpBehavior::AnswerA {
        ip: [1, 2, 3, 4],
        ttl: 60,
    })
    .await;
    let client = client(&[server.addr.to_string()], fast(ClientOptions::default()));

    let first = client
        .query("example.com", RecordType::A, RecordClass::IN)
        .await
        .unwrap();
    let second = client
        .query("example.com", RecordType::A, RecordClass::IN)
        .await
        .unwrap();

    assert_eq!(server.hits.load(Ordering::SeqCst), 1);
    assert_eq!(first.answers[0].data, RData::A("1.2.3.4".parse().unwrap()));
    assert_eq!(first.answers[0].data, second.answers[0].data);
    assert_eq!(first.answers[0].ttl, second.answers[0].ttl);
}

#[tokio::test]
async fn fingerprints_are_case_insensitive() {
    let server = spawn_udp(UdpBehavior::AnswerA {
        ip: [1, 2, 3, 4],
        ttl: 60,
    })
    .await;
    let client = client(&[server.addr.to_string()], fast(ClientOptions::default()));

    client
        .query("Example.COM", RecordType::A, RecordClass::IN)
        .await
        .unwrap();
    client
        .query("example.com", RecordType::A, RecordClass::IN)
        .await
        .unwrap();

    assert_eq!(server.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn truncated_udp_response_upgrades_to_tcp_keeping_the_id() {
    let server = spawn_truncating_dual([5, 6, 7, 8], 120).await;
    let options = ClientOptions {
        enable_audit_trail: true,
        ..fast(ClientOptions::default())
    };
    let client = client(&[server.addr.to_string()], options);

    let response = client
        .query("example.com", RecordType::A, RecordClass::IN)
        .await
        .unwrap();

    assert_eq!(response.answers[0].data, RData::A("5.6.7.8".parse().unwrap()));
    assert_eq!(server.udp_hits.load(Ordering::SeqCst), 1, "one UDP attempt");
    assert_eq!(server.tcp_hits.load(Ordering::SeqCst), 1, "exactly one TCP re-attempt");
    assert_eq!(
        server.udp_id.load(Ordering::SeqCst),
        server.tcp_id.load(Ordering::SeqCst),
        "the upgrade re-sends the same transaction id"
    );

    let audit = response.audit.as_deref().expect("audit trail enabled");
    assert!(audit.contains("Truncated, retrying in TCP mode."), "{audit}");
}

#[tokio::test]
async fn truncation_upgrade_does_not_consume_retries() {
    let server = spawn_truncating_dual([5, 6, 7, 8], 120).await;
    let options = ClientOptions {
        retries: 0,
        ..fast(ClientOptions::default())
    };
    let client = client(&[server.addr.to_string()], options);

    let response = client
        .query("example.com", RecordType::A, RecordClass::IN)
        .await
        .unwrap();
    assert_eq!(response.answers.len(), 1);
}

#[tokio::test]
async fn servfail_continues_to_the_next_server() {
    let failing = spawn_udp(UdpBehavior::Rcode(2)).await;
    let healthy = spawn_udp(UdpBehavior::AnswerA {
        ip: [9, 9, 9, 9],
        ttl: 60,
    })
    .await;
    let client = client(
        &[failing.addr.to_string(), healthy.addr.to_string()],
        fast(ClientOptions::default()),
    );

    let response = client
        .query("example.com", RecordType::A, RecordClass::IN)
        .await
        .unwrap();

    assert_eq!(response.answers[0].data, RData::A("9.9.9.9".parse().unwrap()));
    assert_eq!(
        failing.hits.load(Ordering::SeqCst),
        1,
        "protocol-level errors are not retried on the same server"
    );
    assert_eq!(healthy.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn all_timeouts_exhaust_retries_then_report_connection_timeout() {
    let server = spawn_udp(UdpBehavior::Silent).await;
    let options = ClientOptions {
        timeout: Duration::from_millis(50),
        retries: 2,
        ..fast(ClientOptions::default())
    };
    let client = client(&[server.addr.to_string()], options);

    let started = Instant::now();
    let err = client
        .query("example.com", RecordType::A, RecordClass::IN)
        .await
        .unwrap_err();

    assert!(
        matches!(err.kind(), ResolveError::ConnectionTimeout { servers } if servers.len() == 1),
        "{err}"
    );
    assert_eq!(server.hits.load(Ordering::SeqCst), 3, "1 + retries attempts");
    assert!(started.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn retry_budget_applies_per_server() {
    let first = spawn_udp(UdpBehavior::Silent).await;
    let second = spawn_udp(UdpBehavior::Silent).await;
    let options = ClientOptions {
        timeout: Duration::from_millis(40),
        retries: 1,
        ..fast(ClientOptions::default())
    };
    let client = client(&[first.addr.to_string(), second.addr.to_string()], options);

    let err = client
        .query("example.com", RecordType::A, RecordClass::IN)
        .await
        .unwrap_err();

    assert!(matches!(
        err.kind(),
        ResolveError::ConnectionTimeout { servers } if servers.len() == 2
    ));
    assert_eq!(first.hits.load(Ordering::SeqCst), 2);
    assert_eq!(second.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failover_is_deterministic_with_zero_retries() {
    let broken = spawn_udp(UdpBehavior::Silent).await;
    let healthy = spawn_udp(UdpBehavior::AnswerA {
        ip: [7, 7, 7, 7],
        ttl: 60,
    })
    .await;
    let options = ClientOptions {
        timeout: Duration::from_millis(50),
        retries: 0,
        ..fast(ClientOptions::default())
    };
    let client = client(&[broken.addr.to_string(), healthy.addr.to_string()], options);

    let response = client
        .query("example.com", RecordType::A, RecordClass::IN)
        .await
        .unwrap();

    assert_eq!(response.answers[0].data, RData::A("7.7.7.7".parse().unwrap()));
    assert_eq!(broken.hits.load(Ordering::SeqCst), 1);
    assert_eq!(healthy.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn throw_errors_surfaces_the_rcode() {
    let server = spawn_udp(UdpBehavior::Rcode(2)).await;
    let options = ClientOptions {
        throw_errors: true,
        ..fast(ClientOptions::default())
    };
    let client = client(&[server.addr.to_string()], options);

    let err = client
        .query("example.com", RecordType::A, RecordClass::IN)
        .await
        .unwrap_err();
    match err.kind() {
        ResolveError::DnsError { rcode, .. } => {
            assert_eq!(rcode.as_str(), "SERVFAIL");
        }
        other => panic!("expected DnsError, got {:?}", other),
    }
}

#[tokio::test]
async fn error_response_is_returned_when_not_throwing() {
    let server = spawn_udp(UdpBehavior::Rcode(2)).await;
    let client = client(&[server.addr.to_string()], fast(ClientOptions::default()));

    let response = client
        .query("example.com", RecordType::A, RecordClass::IN)
        .await
        .unwrap();
    assert_eq!(response.rcode().as_str(), "SERVFAIL");
    assert!(response.answers.is_empty());
}

#[tokio::test]
async fn single_server_keeps_being_tried_across_queries() {
    let server = spawn_udp(UdpBehavior::Silent).await;
    let options = ClientOptions {
        timeout: Duration::from_millis(40),
        retries: 1,
        use_cache: false,
        ..fast(ClientOptions::default())
    };
    let client = client(&[server.addr.to_string()], options);

    for _ in 0..2 {
        let err = client
            .query("example.com", RecordType::A, RecordClass::IN)
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), ResolveError::ConnectionTimeout { .. }));
    }
    // a disabled server would have short-circuited the second query
    assert_eq!(server.hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn round_robin_rotates_the_starting_server() {
    let mut servers = Vec::new();
    let mut endpoints = Vec::new();
    for _ in 0..3 {
        let server = spawn_udp(UdpBehavior::AnswerA {
            ip: [8, 8, 8, 8],
            ttl: 60,
        })
        .await;
        endpoints.push(server.addr.to_string());
        servers.push(server);
    }
    let options = ClientOptions {
        use_cache: false,
        use_random_server: true,
        ..ClientOptions::default()
    };
    let client = client(&endpoints, options);

    for _ in 0..3 {
        client
            .query("example.com", RecordType::A, RecordClass::IN)
            .await
            .unwrap();
    }
    for server in &servers {
        assert_eq!(server.hits.load(Ordering::SeqCst), 1);
    }

    client
        .query("example.com", RecordType::A, RecordClass::IN)
        .await
        .unwrap();
    assert_eq!(servers[0].hits.load(Ordering::SeqCst), 2, "rotation wrapped around");
}
