use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;

use rootward::protocol::*;
use rootward::resolver::Resolver;
use rootward::settings::{Name, RootHint, Settings};

#[tokio::test]
async fn resolution_is_short_circuited_by_the_cache() {
    // no nameserver listens on the upstream port, so any exchange
    // would fail: an answer can only have come from the cache.
    let resolver = Resolver::new(&settings_with_hints(Vec::new(), 1));
    let address = Ipv4Addr::new(93, 184, 216, 34);
    resolver.cache().insert("example.com.", vec![address]);

    let name = DomainName::from_dotted_string("example.com.").unwrap();
    assert_eq!(vec![address], resolver.resolve(&name).await);
}

#[tokio::test]
async fn authoritative_answer_from_a_hint() {
    let address = Ipv4Addr::new(93, 184, 216, 34);
    let (port, exchanges) = spawn_mock_nameserver(move |_, query| {
        let mut response = query.make_response();
        response.answers.push(a_record(&query.questions[0].name, address));
        response
    })
    .await;

    let resolver = Resolver::new(&settings_with_hints(vec!["ns.test."], port));
    let name = DomainName::from_dotted_string("example.com.").unwrap();

    // the hint's own address is pre-cached, so the answer takes
    // exactly one exchange
    assert_eq!(vec![address], resolver.resolve(&name).await);
    assert_eq!(1, exchanges.load(Ordering::SeqCst));

    // the answer is cached, so a second resolution takes none
    assert_eq!(vec![address], resolver.resolve(&name).await);
    assert_eq!(1, exchanges.load(Ordering::SeqCst));
    assert_eq!(
        Some(vec![address]),
        resolver.cache().lookup("example.com.")
    );
}

#[tokio::test]
async fn referral_walk_follows_glue() {
    let address = Ipv4Addr::new(93, 184, 216, 34);
    let (port, exchanges) = spawn_mock_nameserver(move |request_number, query| {
        let mut response = query.make_response();
        if request_number == 0 {
            // refer to a delegated nameserver, with glue
            let ns = DomainName::from_dotted_string("ns1.example.com.").unwrap();
            response.authority.push(ResourceRecord {
                name: query.questions[0].name.clone(),
                data: RecordData::NS { nsdname: ns.clone() },
                rclass: RecordClass::IN,
                ttl: 300,
            });
            response
                .additional
                .push(a_record(&ns, Ipv4Addr::LOCALHOST));
        } else {
            response.answers.push(a_record(&query.questions[0].name, address));
        }
        response
    })
    .await;

    let resolver = Resolver::new(&settings_with_hints(vec!["a.hint."], port));
    let name = DomainName::from_dotted_string("example.com.").unwrap();

    // one exchange for the referral, one for the answer
    assert_eq!(vec![address], resolver.resolve(&name).await);
    assert_eq!(2, exchanges.load(Ordering::SeqCst));

    // the glue went through the cache
    assert_eq!(
        Some(vec![Ipv4Addr::LOCALHOST]),
        resolver.cache().lookup("ns1.example.com.")
    );
}

#[tokio::test]
async fn unresponsive_nameserver_yields_no_answer() {
    // bound but never reads or replies
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();

    let resolver = Resolver::new(&settings_with_hints(vec!["ns.test."], port));
    let name = DomainName::from_dotted_string("example.com.").unwrap();

    assert_eq!(Vec::<Ipv4Addr>::new(), resolver.resolve(&name).await);
}

#[tokio::test]
async fn unsupported_qtype_gets_not_implemented() {
    let resolver = Resolver::new(&settings_with_hints(Vec::new(), 1));
    let query = Message::from_question(
        0x1234,
        Question {
            name: DomainName::from_dotted_string("example.com.").unwrap(),
            qtype: RecordType::MX,
            qclass: RecordClass::IN,
        },
    );

    let response = resolver.handle_query(&query.to_octets()).await.unwrap();
    let (header, qdcount, ancount, nscount, arcount) =
        Header::deserialise(&mut ConsumableBuffer::new(&response)).unwrap();

    assert_eq!(0x1234, header.id);
    assert!(header.is_response);
    assert_eq!(Rcode::NotImplemented, header.rcode);
    assert_eq!((0, 0, 0, 0), (qdcount, ancount, nscount, arcount));
}

#[tokio::test]
async fn query_with_response_flag_gets_format_error() {
    let resolver = Resolver::new(&settings_with_hints(Vec::new(), 1));
    let mut query = Message::from_question(
        0x1234,
        Question {
            name: DomainName::from_dotted_string("example.com.").unwrap(),
            qtype: RecordType::A,
            qclass: RecordClass::IN,
        },
    );
    query.header.is_response = true;

    let response = resolver.handle_query(&query.to_octets()).await.unwrap();
    let (header, _, _, _, _) =
        Header::deserialise(&mut ConsumableBuffer::new(&response)).unwrap();

    assert_eq!(0x1234, header.id);
    assert_eq!(Rcode::FormatError, header.rcode);
}

#[tokio::test]
async fn mangled_datagrams_get_format_error_or_silence() {
    let resolver = Resolver::new(&settings_with_hints(Vec::new(), 1));

    // too short to even carry an ID: nothing to reply to
    assert_eq!(None, resolver.handle_query(&[0x12]).await);

    // a parseable ID but no questions: a format error, linked by ID
    let mut octets = vec![0x12, 0x34];
    octets.resize(12, 0);
    let response = resolver.handle_query(&octets).await.unwrap();
    let (header, _, _, _, _) =
        Header::deserialise(&mut ConsumableBuffer::new(&response)).unwrap();

    assert_eq!(0x1234, header.id);
    assert_eq!(Rcode::FormatError, header.rcode);
}

fn settings_with_hints(hints: Vec<&str>, upstream_port: u16) -> Settings {
    Settings {
        upstream_port,
        query_timeout_seconds: 1,
        root_hints: hints
            .into_iter()
            .map(|hostname| RootHint {
                hostname: Name {
                    domain: DomainName::from_dotted_string(hostname).unwrap(),
                },
                address: Ipv4Addr::LOCALHOST,
                operator: String::new(),
            })
            .collect(),
        ..Settings::default()
    }
}

fn a_record(name: &DomainName, address: Ipv4Addr) -> ResourceRecord {
    ResourceRecord {
        name: name.clone(),
        data: RecordData::A { address },
        rclass: RecordClass::IN,
        ttl: 300,
    }
}

/// A nameserver which answers every query with whatever the closure
/// builds, told how many requests came before this one.  Also returns
/// a counter of exchanges served, so tests can assert how many it
/// took to reach an answer.
async fn spawn_mock_nameserver<F>(respond: F) -> (u16, Arc<AtomicUsize>)
where
    F: Fn(usize, &Message) -> Message + Send + 'static,
{
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();
    let exchanges = Arc::new(AtomicUsize::new(0));

    let counter = exchanges.clone();
    tokio::spawn(async move {
        let mut buf = vec![0u8; 512];
        loop {
            let (size, peer) = socket.recv_from(&mut buf).await.unwrap();
            let query = Message::from_octets(&buf[..size]).unwrap();
            let request_number = counter.fetch_add(1, Ordering::SeqCst);
            let response = respond(request_number, &query);
            socket.send_to(&response.to_octets(), peer).await.unwrap();
        }
    });

    (port, exchanges)
}
