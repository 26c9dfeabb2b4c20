use fake::{Fake, Faker};

use rootward::protocol::*;

#[test]
fn roundtrip_message() {
    for _ in 0..100 {
        let original = arbitrary_message();
        let deserialised = Message::from_octets(&original.clone().to_octets());

        assert_eq!(Ok(original), deserialised);
    }
}

#[test]
fn roundtrip_header() {
    for _ in 0..100 {
        let original = arbitrary_header();

        let mut buffer = WritableBuffer::default();
        original.serialise(&mut buffer);
        // the count fields live on the wire, not on the struct
        buffer.write_u16(1);
        buffer.write_u16(0);
        buffer.write_u16(0);
        buffer.write_u16(0);
        let deserialised = Header::deserialise(&mut ConsumableBuffer::new(&buffer.octets));

        assert_eq!(Ok((original, 1, 0, 0, 0)), deserialised);
    }
}

#[test]
fn roundtrip_question() {
    for _ in 0..100 {
        let original = arbitrary_question();

        let mut buffer = WritableBuffer::default();
        original.clone().serialise(&mut buffer);
        let deserialised = Question::deserialise(0, &mut ConsumableBuffer::new(&buffer.octets));

        assert_eq!(Ok(original), deserialised);
    }
}

#[test]
fn roundtrip_resourcerecord() {
    for _ in 0..100 {
        let original = arbitrary_resourcerecord();

        let mut buffer = WritableBuffer::default();
        original.clone().serialise(&mut buffer);
        let deserialised =
            ResourceRecord::deserialise(0, &mut ConsumableBuffer::new(&buffer.octets));

        assert_eq!(Ok(original), deserialised);
    }
}

#[test]
fn roundtrip_domainname() {
    for _ in 0..100 {
        let original = arbitrary_domainname();

        let mut buffer = WritableBuffer::default();
        original.clone().serialise(&mut buffer);
        let deserialised = DomainName::deserialise(0, &mut ConsumableBuffer::new(&buffer.octets));

        assert_eq!(Ok(original), deserialised);
    }
}

#[test]
fn compressed_name_expands_to_the_earlier_occurrence() {
    // "www.example.com." at offset 0, then "foo" + a pointer to
    // offset 0.
    let mut octets = Vec::new();
    octets.extend_from_slice(b"\x03www\x07example\x03com\x00");
    let pointer_target = 0u16;
    let second_name_at = octets.len();
    octets.extend_from_slice(b"\x03foo");
    octets.extend_from_slice(&(0b1100_0000_0000_0000 | pointer_target).to_be_bytes());

    let buffer = ConsumableBuffer::new(&octets);
    let deserialised = DomainName::deserialise(0, &mut buffer.at_offset(second_name_at));

    assert_eq!(
        Ok(DomainName::from_dotted_string("foo.www.example.com.").unwrap()),
        deserialised
    );
}

#[test]
fn pointer_to_self_is_rejected() {
    let octets = [0xc0, 0x00];
    let deserialised = DomainName::deserialise(7, &mut ConsumableBuffer::new(&octets));

    assert_eq!(Err(ProtocolError::DomainPointerInvalid(7)), deserialised);
}

#[test]
fn forward_pointer_is_rejected() {
    // "a" then a pointer past its own end
    let octets = [0x01, b'a', 0xc0, 0x09];
    let deserialised = DomainName::deserialise(7, &mut ConsumableBuffer::new(&octets));

    assert_eq!(Err(ProtocolError::DomainPointerInvalid(7)), deserialised);
}

#[test]
fn pointer_cycle_is_rejected() {
    // name at offset 2 points to offset 0, which points back to 2
    let octets = [0xc0, 0x02, 0xc0, 0x00];
    let buffer = ConsumableBuffer::new(&octets);
    let deserialised = DomainName::deserialise(7, &mut buffer.at_offset(2));

    assert_eq!(Err(ProtocolError::DomainPointerInvalid(7)), deserialised);
}

#[test]
fn deserialise_rejects_truncated_datagrams() {
    assert_eq!(
        Err(ProtocolError::CompletelyBusted),
        Message::from_octets(&[0x12])
    );

    assert_eq!(
        Err(ProtocolError::HeaderTooShort(0x1234)),
        Message::from_octets(&[0x12, 0x34, 0x00, 0x00])
    );
}

#[test]
fn deserialise_rejects_empty_question_section() {
    let mut octets = vec![0x12, 0x34];
    octets.resize(12, 0);

    assert_eq!(
        Err(ProtocolError::EmptyQuestionSection(0x1234)),
        Message::from_octets(&octets)
    );
}

#[test]
fn deserialise_rejects_unknown_record_type() {
    let query = Message::from_question(
        0x1234,
        Question {
            name: DomainName::from_dotted_string("example.com.").unwrap(),
            qtype: RecordType::A,
            qclass: RecordClass::IN,
        },
    );
    let mut octets = query.to_octets();
    // the qtype field is the 2 octets after the name, which ends with
    // its null label
    let qtype_at = octets.len() - 4;
    octets[qtype_at] = 0x00;
    octets[qtype_at + 1] = 17;

    assert_eq!(
        Err(ProtocolError::UnknownRecordType {
            id: 0x1234,
            value: 17
        }),
        Message::from_octets(&octets)
    );
}

#[test]
fn deserialise_rejects_bad_a_record_length() {
    let rr = ResourceRecord {
        name: DomainName::from_dotted_string("example.com.").unwrap(),
        data: RecordData::A {
            address: "1.2.3.4".parse().unwrap(),
        },
        rclass: RecordClass::IN,
        ttl: 300,
    };

    let mut buffer = WritableBuffer::default();
    rr.serialise(&mut buffer);
    let rdlength_at = buffer.octets.len() - 6;
    buffer.octets[rdlength_at + 1] = 3;

    assert_eq!(
        Err(ProtocolError::ResourceRecordInvalid(0)),
        ResourceRecord::deserialise(0, &mut ConsumableBuffer::new(&buffer.octets))
    );
}

fn arbitrary_message() -> Message {
    let qdcount: u16 = (1..10).fake();
    let ancount: u16 = (0..10).fake();
    let nscount: u16 = (0..10).fake();
    let arcount: u16 = (0..10).fake();

    let mut questions = Vec::with_capacity(qdcount as usize);
    let mut answers = Vec::with_capacity(ancount as usize);
    let mut authority = Vec::with_capacity(nscount as usize);
    let mut additional = Vec::with_capacity(arcount as usize);

    for _ in 0..qdcount {
        questions.push(arbitrary_question());
    }
    for _ in 0..ancount {
        answers.push(arbitrary_resourcerecord());
    }
    for _ in 0..nscount {
        authority.push(arbitrary_resourcerecord());
    }
    for _ in 0..arcount {
        additional.push(arbitrary_resourcerecord());
    }

    Message {
        header: arbitrary_header(),
        questions,
        answers,
        authority,
        additional,
    }
}

fn arbitrary_header() -> Header {
    Header {
        id: Faker.fake(),
        is_response: Faker.fake(),
        opcode: arbitrary_opcode(),
        is_authoritative: Faker.fake(),
        is_truncated: Faker.fake(),
        recursion_desired: Faker.fake(),
        recursion_available: Faker.fake(),
        rcode: arbitrary_rcode(),
    }
}

fn arbitrary_question() -> Question {
    Question {
        name: arbitrary_domainname(),
        qtype: arbitrary_recordtype(),
        qclass: RecordClass::IN,
    }
}

fn arbitrary_resourcerecord() -> ResourceRecord {
    ResourceRecord {
        name: arbitrary_domainname(),
        data: arbitrary_recorddata(),
        rclass: RecordClass::IN,
        ttl: Faker.fake(),
    }
}

fn arbitrary_recorddata() -> RecordData {
    // this should match the `RecordData` deserialisation
    match arbitrary_recordtype() {
        RecordType::A => RecordData::A {
            address: std::net::Ipv4Addr::new(
                Faker.fake(),
                Faker.fake(),
                Faker.fake(),
                Faker.fake(),
            ),
        },
        RecordType::NS => RecordData::NS {
            nsdname: arbitrary_domainname(),
        },
        RecordType::CNAME => RecordData::CNAME {
            cname: arbitrary_domainname(),
        },
        RecordType::PTR => RecordData::PTR {
            ptrdname: arbitrary_domainname(),
        },
        tag => RecordData::Null {
            tag,
            octets: arbitrary_octets((0..64).fake()),
        },
    }
}

fn arbitrary_domainname() -> DomainName {
    let num_labels = (1..5).fake::<usize>();
    let mut labels = Vec::<Vec<u8>>::new();
    let mut octets = Vec::<u8>::new();

    for _ in 0..num_labels {
        let label_len = (1..63).fake();
        let mut label = Vec::with_capacity(label_len as usize);
        octets.push(label_len);

        for _ in 0..label_len {
            let octet = Faker.fake::<u8>().to_ascii_lowercase();
            label.push(octet);
            octets.push(octet);
        }

        labels.push(label);
    }

    labels.push(Vec::new());
    octets.push(0);

    DomainName { labels, octets }
}

fn arbitrary_opcode() -> Opcode {
    // opcode is a 4-bit field
    (Faker.fake::<u8>() & 0b0000_1111).into()
}

fn arbitrary_rcode() -> Rcode {
    // rcode is a 4-bit field
    (Faker.fake::<u8>() & 0b0000_1111).into()
}

fn arbitrary_recordtype() -> RecordType {
    let value: u16 = (1..=16).fake();
    RecordType::try_from(value).unwrap()
}

fn arbitrary_octets(len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(Faker.fake());
    }
    out
}
