pub mod deserialise;
pub mod serialise;
pub mod wire_types;

pub use self::deserialise::{ConsumableBuffer, ProtocolError};
pub use self::serialise::WritableBuffer;
pub use self::wire_types::*;

impl Message {
    /// Build a query message holding a single question, with every
    /// flag clear.  All internally built queries go through here, so
    /// a query can never have an empty question section.
    pub fn from_question(id: u16, question: Question) -> Self {
        Self {
            header: Header {
                id,
                is_response: false,
                opcode: Opcode::Standard,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: false,
                recursion_available: false,
                rcode: Rcode::NoError,
            },
            questions: vec![question],
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// Build a response to this message: same ID, questions echoed,
    /// no flags set other than QR.  Answers are appended by the
    /// caller.
    pub fn make_response(&self) -> Self {
        Self {
            header: Header {
                id: self.header.id,
                is_response: true,
                opcode: Opcode::Standard,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: false,
                recursion_available: false,
                rcode: Rcode::NoError,
            },
            questions: self.questions.clone(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// A response carrying only an error code.  This is the one shape
    /// of message with no questions: there is nothing to echo when the
    /// query could not be (fully) parsed, and nothing useful to echo
    /// when it could not be served.  It is only ever serialised.
    pub fn make_error_response(id: u16, rcode: Rcode) -> Self {
        Self {
            header: Header {
                id,
                is_response: true,
                opcode: Opcode::Standard,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: false,
                recursion_available: false,
                rcode,
            },
            questions: Vec::new(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    pub fn make_format_error_response(id: u16) -> Self {
        Self::make_error_response(id, Rcode::FormatError)
    }

    pub fn make_not_implemented_response(id: u16) -> Self {
        Self::make_error_response(id, Rcode::NotImplemented)
    }

    /// Check every question against the configured supported type
    /// set.  Types outside it parse fine but must be answered with
    /// "not implemented" rather than silently passed through.
    pub fn validate_supported(&self, supported: &[RecordType]) -> Result<(), ProtocolError> {
        for question in &self.questions {
            if !supported.contains(&question.qtype) {
                return Err(ProtocolError::UnsupportedQuestionType {
                    id: self.header.id,
                    qtype: question.qtype,
                });
            }
        }
        Ok(())
    }
}

impl DomainName {
    pub fn root_domain() -> Self {
        Self {
            octets: vec![0],
            labels: vec![Vec::new()],
        }
    }

    pub fn to_dotted_string(&self) -> String {
        let mut out = String::with_capacity(self.octets.len());
        let mut dot = false;
        for label in &self.labels {
            for octet in label {
                out.push(*octet as char);
            }
            if !label.is_empty() {
                out.push('.');
                dot = true;
            }
        }
        if !dot {
            out.push('.');
        }

        out
    }

    pub fn from_dotted_string(s: &str) -> Option<Self> {
        let mut labels = Vec::<Vec<u8>>::with_capacity(5);
        let mut blank_label = false;

        for label in s.split('.') {
            if blank_label {
                return None;
            }

            let label = label.as_bytes();
            blank_label = label.is_empty();
            labels.push(label.into());
        }

        if !blank_label {
            labels.push(Vec::new());
        }

        Self::from_labels(labels)
    }

    pub fn from_labels(mixed_case_labels: Vec<Vec<u8>>) -> Option<Self> {
        if mixed_case_labels.is_empty() {
            return None;
        }

        let mut labels = Vec::<Vec<u8>>::with_capacity(mixed_case_labels.len());
        let mut octets = Vec::<u8>::with_capacity(255);
        let mut blank_label = false;

        for mc_label in &mixed_case_labels {
            if blank_label {
                return None;
            }

            blank_label = mc_label.is_empty();

            match mc_label.len().try_into() {
                Ok(n) if n <= 63 => {
                    octets.push(n);
                    let mut label = Vec::<u8>::with_capacity(mc_label.len());
                    for octet in mc_label {
                        let octet = octet.to_ascii_lowercase();
                        label.push(octet);
                        octets.push(octet);
                    }
                    labels.push(label);
                }
                _ => return None,
            }
        }

        if blank_label && octets.len() <= 255 {
            Some(Self { octets, labels })
        } else {
            None
        }
    }
}
