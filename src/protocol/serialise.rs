//! Serialisation of DNS messages to the wire format.  See the
//! `wire_types` module for details of the format.
//!
//! Names are always written in their uncompressed form: generating
//! compression pointers is out of scope, and every consumer of this
//! format must accept uncompressed names.

use crate::protocol::wire_types::*;

impl Message {
    pub fn to_octets(self) -> Vec<u8> {
        let mut buffer = WritableBuffer::default();
        self.serialise(&mut buffer);
        buffer.octets
    }

    pub fn serialise(self, buffer: &mut WritableBuffer) {
        // the counts are only authoritative on the wire: they always
        // reflect the actual section lengths.
        let qdcount = section_count(&self.questions);
        let ancount = section_count(&self.answers);
        let nscount = section_count(&self.authority);
        let arcount = section_count(&self.additional);

        self.header.serialise(buffer);
        buffer.write_u16(qdcount);
        buffer.write_u16(ancount);
        buffer.write_u16(nscount);
        buffer.write_u16(arcount);

        for question in self.questions {
            question.serialise(buffer);
        }
        for rr in self.answers {
            rr.serialise(buffer);
        }
        for rr in self.authority {
            rr.serialise(buffer);
        }
        for rr in self.additional {
            rr.serialise(buffer);
        }
    }
}

/// # Panics
///
/// If the section holds more than 65535 entries, which indicates a
/// bug in whatever built the message.
fn section_count<T>(section: &[T]) -> u16 {
    section
        .len()
        .try_into()
        .expect("section length does not fit in a u16")
}

impl Header {
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        let flags1 = (if self.is_response { 0b1000_0000 } else { 0 })
            | (0b0111_1000 & (u8::from(self.opcode) << 3))
            | (if self.is_authoritative { 0b0000_0100 } else { 0 })
            | (if self.is_truncated { 0b0000_0010 } else { 0 })
            | (if self.recursion_desired {
                0b0000_0001
            } else {
                0
            });
        let flags2 = (if self.recursion_available {
            0b1000_0000
        } else {
            0
        }) | (0b0000_1111 & u8::from(self.rcode));

        buffer.write_u16(self.id);
        buffer.write_u8(flags1);
        buffer.write_u8(flags2);
    }
}

impl Question {
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        self.name.serialise(buffer);
        self.qtype.serialise(buffer);
        self.qclass.serialise(buffer);
    }
}

impl ResourceRecord {
    /// # Panics
    ///
    /// If the RDATA is over 65535 octets, which cannot be constructed
    /// from the wire and indicates a bug in internally built records.
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        let rtype = self.data.rtype();
        let rdata = match self.data {
            RecordData::A { address } => address.octets().to_vec(),
            RecordData::NS { nsdname } => nsdname.octets,
            RecordData::CNAME { cname } => cname.octets,
            RecordData::PTR { ptrdname } => ptrdname.octets,
            RecordData::Null { octets, .. } => octets,
        };

        self.name.serialise(buffer);
        rtype.serialise(buffer);
        self.rclass.serialise(buffer);
        buffer.write_u32(self.ttl);
        buffer.write_u16(rdata.len().try_into().expect("rdata does not fit in a u16"));
        buffer.write_octets(rdata);
    }
}

impl DomainName {
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        buffer.write_octets(self.octets);
    }
}

impl RecordType {
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        buffer.write_u16(self.into());
    }
}

impl RecordClass {
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        buffer.write_u16(self.into());
    }
}

/// A buffer which can be written to, for serialisation purposes.
pub struct WritableBuffer {
    pub octets: Vec<u8>,
}

impl Default for WritableBuffer {
    fn default() -> Self {
        Self {
            octets: Vec::with_capacity(512),
        }
    }
}

impl WritableBuffer {
    pub fn write_u8(&mut self, octet: u8) {
        self.octets.push(octet);
    }

    pub fn write_u16(&mut self, value: u16) {
        for octet in value.to_be_bytes() {
            self.octets.push(octet);
        }
    }

    pub fn write_u32(&mut self, value: u32) {
        for octet in value.to_be_bytes() {
            self.octets.push(octet);
        }
    }

    pub fn write_octets(&mut self, octets: Vec<u8>) {
        for octet in octets {
            self.octets.push(octet);
        }
    }
}
