use config::{Config, ConfigError, File};
use serde::de::{self, Deserializer, Unexpected, Visitor};
use serde::Deserialize;
use std::fmt;
use std::net::Ipv4Addr;

use crate::protocol::{DomainName, RecordType};

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct Settings {
    /// Interface to bind on.
    #[serde(default = "default_interface")]
    pub interface: Ipv4Addr,

    /// Port to serve on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Port to query remote nameservers on.  Only ever changed from
    /// 53 to point tests at a local mock server.
    #[serde(default = "default_port")]
    pub upstream_port: u16,

    /// How long to wait for a single nameserver exchange before
    /// abandoning that candidate.
    #[serde(default = "default_query_timeout_seconds")]
    pub query_timeout_seconds: u64,

    /// How deep a chain of nameservers-resolving-nameservers may get
    /// before it is abandoned as circular.
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: usize,

    /// The question types accepted from clients.  Anything else gets
    /// a "not implemented" response.
    #[serde(default = "default_supported_qtypes")]
    pub supported_qtypes: Vec<RecordType>,

    /// Where every resolution starts when nothing useful is cached.
    #[serde(default = "default_root_hints")]
    pub root_hints: Vec<RootHint>,
}

impl Settings {
    pub fn new(filename: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(filename))
            .build()?
            .try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            port: default_port(),
            upstream_port: default_port(),
            query_timeout_seconds: default_query_timeout_seconds(),
            recursion_limit: default_recursion_limit(),
            supported_qtypes: default_supported_qtypes(),
            root_hints: default_root_hints(),
        }
    }
}

/// A bootstrap nameserver: a hostname and the address it is known to
/// have, so that resolution has somewhere to start.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct RootHint {
    pub hostname: Name,
    pub address: Ipv4Addr,
    /// Human label only, never interpreted.
    #[serde(default)]
    pub operator: String,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Name {
    pub domain: DomainName,
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct NameVisitor;

        impl<'de> Visitor<'de> for NameVisitor {
            type Value = Name;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("struct Name")
            }

            fn visit_str<E>(self, v: &str) -> Result<Name, E>
            where
                E: de::Error,
            {
                match DomainName::from_dotted_string(v) {
                    Some(domain) => Ok(Name { domain }),
                    None => Err(de::Error::invalid_value(
                        Unexpected::Str(v),
                        &"a valid domain name",
                    )),
                }
            }
        }

        deserializer.deserialize_str(NameVisitor)
    }
}

impl<'de> Deserialize<'de> for RecordType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RecordTypeVisitor;

        impl<'de> Visitor<'de> for RecordTypeVisitor {
            type Value = RecordType;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a DNS record type mnemonic")
            }

            fn visit_str<E>(self, v: &str) -> Result<RecordType, E>
            where
                E: de::Error,
            {
                match v.to_ascii_uppercase().as_str() {
                    "A" => Ok(RecordType::A),
                    "NS" => Ok(RecordType::NS),
                    "MD" => Ok(RecordType::MD),
                    "MF" => Ok(RecordType::MF),
                    "CNAME" => Ok(RecordType::CNAME),
                    "SOA" => Ok(RecordType::SOA),
                    "MB" => Ok(RecordType::MB),
                    "MG" => Ok(RecordType::MG),
                    "MR" => Ok(RecordType::MR),
                    "NULL" => Ok(RecordType::NULL),
                    "WKS" => Ok(RecordType::WKS),
                    "PTR" => Ok(RecordType::PTR),
                    "HINFO" => Ok(RecordType::HINFO),
                    "MINFO" => Ok(RecordType::MINFO),
                    "MX" => Ok(RecordType::MX),
                    "TXT" => Ok(RecordType::TXT),
                    _ => Err(de::Error::invalid_value(
                        Unexpected::Str(v),
                        &"a DNS record type mnemonic",
                    )),
                }
            }
        }

        deserializer.deserialize_str(RecordTypeVisitor)
    }
}

fn default_interface() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

fn default_port() -> u16 {
    53
}

fn default_query_timeout_seconds() -> u64 {
    5
}

fn default_recursion_limit() -> usize {
    8
}

fn default_supported_qtypes() -> Vec<RecordType> {
    vec![
        RecordType::A,
        RecordType::NS,
        RecordType::CNAME,
        RecordType::PTR,
        RecordType::NULL,
    ]
}

/// The root nameservers, per <https://www.iana.org/domains/root/servers>.
fn default_root_hints() -> Vec<RootHint> {
    [
        ("a.root-servers.net.", [198, 41, 0, 4], "Verisign, Inc."),
        (
            "b.root-servers.net.",
            [199, 9, 14, 201],
            "University of Southern California, Information Sciences Institute",
        ),
        (
            "c.root-servers.net.",
            [192, 33, 4, 12],
            "Cogent Communications",
        ),
        (
            "d.root-servers.net.",
            [199, 7, 91, 13],
            "University of Maryland",
        ),
        (
            "e.root-servers.net.",
            [192, 203, 230, 10],
            "NASA (Ames Research Center)",
        ),
        (
            "f.root-servers.net.",
            [192, 5, 5, 241],
            "Internet Systems Consortium, Inc.",
        ),
        (
            "g.root-servers.net.",
            [192, 112, 36, 4],
            "US Department of Defense (NIC)",
        ),
        (
            "h.root-servers.net.",
            [198, 97, 190, 53],
            "US Army (Research Lab)",
        ),
        ("i.root-servers.net.", [192, 36, 148, 17], "Netnod"),
        ("j.root-servers.net.", [192, 58, 128, 30], "Verisign, Inc."),
        ("k.root-servers.net.", [193, 0, 14, 129], "RIPE NCC"),
        ("l.root-servers.net.", [199, 7, 83, 42], "ICANN"),
        ("m.root-servers.net.", [202, 12, 27, 33], "WIDE Project"),
    ]
    .into_iter()
    .map(|(hostname, octets, operator)| RootHint {
        hostname: Name {
            domain: DomainName::from_dotted_string(hostname)
                .expect("root hint hostnames are well-formed"),
        },
        address: Ipv4Addr::from(octets),
        operator: operator.to_string(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_coherent() {
        let settings = Settings::default();

        assert_eq!(13, settings.root_hints.len());
        assert_eq!(53, settings.port);
        assert!(settings.supported_qtypes.contains(&RecordType::A));
        assert!(!settings.supported_qtypes.contains(&RecordType::MX));
    }

    #[test]
    fn root_hint_hostnames_are_canonical() {
        for hint in Settings::default().root_hints {
            let dotted = hint.hostname.domain.to_dotted_string();
            assert!(dotted.ends_with("root-servers.net."));
        }
    }
}
