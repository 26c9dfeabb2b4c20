//! Deserialisation of DNS messages from the network.  See the
//! `wire_types` module for details of the format.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use crate::protocol::wire_types::*;

impl Message {
    pub fn from_octets(octets: &[u8]) -> Result<Self, ProtocolError> {
        Self::deserialise(&mut ConsumableBuffer::new(octets))
    }

    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, ProtocolError> {
        let (header, qdcount, ancount, nscount, arcount) = Header::deserialise(buffer)?;

        if qdcount == 0 {
            return Err(ProtocolError::EmptyQuestionSection(header.id));
        }

        let mut questions = Vec::with_capacity(qdcount.into());
        let mut answers = Vec::with_capacity(ancount.into());
        let mut authority = Vec::with_capacity(nscount.into());
        let mut additional = Vec::with_capacity(arcount.into());

        for _ in 0..qdcount {
            questions.push(Question::deserialise(header.id, buffer)?);
        }
        for _ in 0..ancount {
            answers.push(ResourceRecord::deserialise(header.id, buffer)?);
        }
        for _ in 0..nscount {
            authority.push(ResourceRecord::deserialise(header.id, buffer)?);
        }
        for _ in 0..arcount {
            additional.push(ResourceRecord::deserialise(header.id, buffer)?);
        }

        Ok(Self {
            header,
            questions,
            answers,
            authority,
            additional,
        })
    }
}

impl Header {
    /// Returns the header along with the four section counts, which
    /// only exist on the wire.
    pub fn deserialise(
        buffer: &mut ConsumableBuffer,
    ) -> Result<(Self, u16, u16, u16, u16), ProtocolError> {
        let id = buffer.next_u16().ok_or(ProtocolError::CompletelyBusted)?;
        let flags1 = buffer.next_u8().ok_or(ProtocolError::HeaderTooShort(id))?;
        let flags2 = buffer.next_u8().ok_or(ProtocolError::HeaderTooShort(id))?;
        let qdcount = buffer.next_u16().ok_or(ProtocolError::HeaderTooShort(id))?;
        let ancount = buffer.next_u16().ok_or(ProtocolError::HeaderTooShort(id))?;
        let nscount = buffer.next_u16().ok_or(ProtocolError::HeaderTooShort(id))?;
        let arcount = buffer.next_u16().ok_or(ProtocolError::HeaderTooShort(id))?;

        let header = Self {
            id,
            is_response: flags1 & 0b1000_0000 != 0,
            opcode: Opcode::from((flags1 & 0b0111_1000) >> 3),
            is_authoritative: flags1 & 0b0000_0100 != 0,
            is_truncated: flags1 & 0b0000_0010 != 0,
            recursion_desired: flags1 & 0b0000_0001 != 0,
            recursion_available: flags2 & 0b1000_0000 != 0,
            rcode: Rcode::from(flags2 & 0b0000_1111),
        };

        Ok((header, qdcount, ancount, nscount, arcount))
    }
}

impl Question {
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, ProtocolError> {
        let name = DomainName::deserialise(id, buffer)?;
        let qtype = RecordType::deserialise(id, buffer)?;
        let qclass = RecordClass::deserialise(id, buffer)?;

        Ok(Self {
            name,
            qtype,
            qclass,
        })
    }
}

impl ResourceRecord {
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, ProtocolError> {
        let name = DomainName::deserialise(id, buffer)?;
        let rtype = RecordType::deserialise(id, buffer)?;
        let rclass = RecordClass::deserialise(id, buffer)?;
        let ttl = buffer
            .next_u32()
            .ok_or(ProtocolError::ResourceRecordTooShort(id))?;
        let rdlength = buffer
            .next_u16()
            .ok_or(ProtocolError::ResourceRecordTooShort(id))?;

        // records which contain domain names are deserialised fully,
        // to expand compression pointers.
        let data = match rtype {
            RecordType::A => {
                if rdlength != 4 {
                    return Err(ProtocolError::ResourceRecordInvalid(id));
                }
                match buffer.take(4) {
                    Some(&[a, b, c, d]) => RecordData::A {
                        address: Ipv4Addr::new(a, b, c, d),
                    },
                    _ => return Err(ProtocolError::ResourceRecordTooShort(id)),
                }
            }
            RecordType::NS => RecordData::NS {
                nsdname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::CNAME => RecordData::CNAME {
                cname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::PTR => RecordData::PTR {
                ptrdname: DomainName::deserialise(id, buffer)?,
            },
            tag => {
                if let Some(octets) = buffer.take(rdlength as usize) {
                    RecordData::Null {
                        tag,
                        octets: octets.to_vec(),
                    }
                } else {
                    return Err(ProtocolError::ResourceRecordTooShort(id));
                }
            }
        };

        Ok(Self {
            name,
            data,
            rclass,
            ttl,
        })
    }
}

impl DomainName {
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, ProtocolError> {
        Self::deserialise_guarded(id, buffer, &mut HashSet::new())
    }

    /// `followed` accumulates the pointer offsets already expanded
    /// while decoding this one name, so a crafted pointer chain which
    /// loops is an error rather than unbounded recursion.
    fn deserialise_guarded(
        id: u16,
        buffer: &mut ConsumableBuffer,
        followed: &mut HashSet<usize>,
    ) -> Result<Self, ProtocolError> {
        let mut octets = Vec::<u8>::with_capacity(255);
        let mut labels = Vec::<Vec<u8>>::with_capacity(5);
        let start = buffer.position;

        'outer: loop {
            let size = buffer.next_u8().ok_or(ProtocolError::DomainTooShort(id))?;

            if size <= 63 {
                let mut label = Vec::with_capacity(size.into());
                octets.push(size);

                if size == 0 {
                    labels.push(label);
                    break 'outer;
                }

                if let Some(os) = buffer.take(size as usize) {
                    for o in os {
                        let lowered = o.to_ascii_lowercase();
                        octets.push(lowered);
                        label.push(lowered);
                    }
                } else {
                    return Err(ProtocolError::DomainTooShort(id));
                }

                labels.push(label);

                if octets.len() > 255 {
                    break 'outer;
                }
            } else if size >= 192 {
                let hi = size & 0b0011_1111;
                let lo = buffer.next_u8().ok_or(ProtocolError::DomainTooShort(id))?;
                let ptr = u16::from_be_bytes([hi, lo]).into();

                // a pointer must be to an earlier occurrence (not
                // merely a different one: RFC 1035 section 4.1.4),
                // and may not be followed twice for one name.
                if ptr >= start || !followed.insert(ptr) {
                    return Err(ProtocolError::DomainPointerInvalid(id));
                }

                let mut other =
                    DomainName::deserialise_guarded(id, &mut buffer.at_offset(ptr), followed)?;
                octets.append(&mut other.octets);
                labels.append(&mut other.labels);
                break 'outer;
            } else {
                return Err(ProtocolError::DomainLabelInvalid(id));
            }
        }

        if octets.len() <= 255 {
            Ok(DomainName { octets, labels })
        } else {
            Err(ProtocolError::DomainTooLong(id))
        }
    }
}

impl RecordType {
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, ProtocolError> {
        let value = buffer
            .next_u16()
            .ok_or(ProtocolError::RecordTypeTooShort(id))?;
        Self::try_from(value).map_err(|value| ProtocolError::UnknownRecordType { id, value })
    }
}

impl RecordClass {
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, ProtocolError> {
        let value = buffer
            .next_u16()
            .ok_or(ProtocolError::RecordTypeTooShort(id))?;
        Self::try_from(value).map_err(|value| ProtocolError::UnknownRecordClass { id, value })
    }
}

/// Errors encountered when parsing a datagram.  In all the errors
/// which have a `u16` parameter, that is the ID from the header - so
/// that an error response can be sent.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ProtocolError {
    /// The datagram is not even 2 octets long, so it doesn't even
    /// contain a valid ID.  An error cannot even be sent back to the
    /// client in this case as, without an ID, it cannot be linked
    /// with the correct query.
    CompletelyBusted,

    /// The header is missing one or more required fields.
    HeaderTooShort(u16),

    /// The message declares no questions at all.
    EmptyQuestionSection(u16),

    /// A type or class field ends before its two octets.
    RecordTypeTooShort(u16),

    /// A resource record ends with an incomplete field.
    ResourceRecordTooShort(u16),

    /// A resource record's payload does not fit its type, such as an
    /// A record whose RDLENGTH is not 4.
    ResourceRecordInvalid(u16),

    /// A domain is incomplete.
    DomainTooShort(u16),

    /// A domain is over 255 octets in size.
    DomainTooLong(u16),

    /// A domain pointer points to or after the current record, or
    /// forms a cycle.
    DomainPointerInvalid(u16),

    /// A domain label is longer than 63 octets, but not a pointer.
    DomainLabelInvalid(u16),

    /// A type or class value is outside the known enumeration.
    UnknownRecordType { id: u16, value: u16 },
    UnknownRecordClass { id: u16, value: u16 },

    /// A question's type decodes validly but is not in the configured
    /// supported set.
    UnsupportedQuestionType { id: u16, qtype: RecordType },
}

impl ProtocolError {
    pub fn id(self) -> Option<u16> {
        match self {
            ProtocolError::CompletelyBusted => None,
            ProtocolError::HeaderTooShort(id) => Some(id),
            ProtocolError::EmptyQuestionSection(id) => Some(id),
            ProtocolError::RecordTypeTooShort(id) => Some(id),
            ProtocolError::ResourceRecordTooShort(id) => Some(id),
            ProtocolError::ResourceRecordInvalid(id) => Some(id),
            ProtocolError::DomainTooShort(id) => Some(id),
            ProtocolError::DomainTooLong(id) => Some(id),
            ProtocolError::DomainPointerInvalid(id) => Some(id),
            ProtocolError::DomainLabelInvalid(id) => Some(id),
            ProtocolError::UnknownRecordType { id, .. } => Some(id),
            ProtocolError::UnknownRecordClass { id, .. } => Some(id),
            ProtocolError::UnsupportedQuestionType { id, .. } => Some(id),
        }
    }

    /// The response code a server should answer with when a client's
    /// query fails with this error.
    pub fn rcode(self) -> Rcode {
        match self {
            ProtocolError::UnsupportedQuestionType { .. } => Rcode::NotImplemented,
            _ => Rcode::FormatError,
        }
    }
}

/// A buffer which will be consumed by the parsing process.
pub struct ConsumableBuffer<'a> {
    octets: &'a [u8],
    position: usize,
}

impl<'a> ConsumableBuffer<'a> {
    pub fn new(octets: &'a [u8]) -> Self {
        Self {
            octets,
            position: 0,
        }
    }

    pub fn next_u8(&mut self) -> Option<u8> {
        if self.octets.len() > self.position {
            let a = self.octets[self.position];
            self.position += 1;
            Some(a)
        } else {
            None
        }
    }

    pub fn next_u16(&mut self) -> Option<u16> {
        if self.octets.len() > self.position + 1 {
            let a = self.octets[self.position];
            let b = self.octets[self.position + 1];
            self.position += 2;
            Some(u16::from_be_bytes([a, b]))
        } else {
            None
        }
    }

    pub fn next_u32(&mut self) -> Option<u32> {
        if self.octets.len() > self.position + 3 {
            let a = self.octets[self.position];
            let b = self.octets[self.position + 1];
            let c = self.octets[self.position + 2];
            let d = self.octets[self.position + 3];
            self.position += 4;
            Some(u32::from_be_bytes([a, b, c, d]))
        } else {
            None
        }
    }

    pub fn take(&mut self, size: usize) -> Option<&'a [u8]> {
        if self.octets.len() >= self.position + size {
            let slice = &self.octets[self.position..self.position + size];
            self.position += size;
            Some(slice)
        } else {
            None
        }
    }

    pub fn at_offset(&self, position: usize) -> ConsumableBuffer<'a> {
        Self {
            octets: self.octets,
            position,
        }
    }
}
