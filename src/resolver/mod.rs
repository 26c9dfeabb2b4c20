//! Iterative resolution: walk the delegation hierarchy from the root
//! hints, following NS referrals until an address record turns up or
//! the candidates run out.

pub mod cache;
pub mod queue;
pub mod transport;

use async_recursion::async_recursion;
use rand::Rng;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::Instrument;

use crate::protocol::{
    DomainName, Message, Question, RecordClass, RecordData, RecordType, ResourceRecord,
};
use crate::resolver::cache::SharedCache;
use crate::resolver::queue::CandidateQueue;
use crate::settings::Settings;

/// The resolution engine: the shared address cache plus the
/// configuration of the walk.  One `Resolver` serves every client
/// query for the lifetime of the process; per-query state lives on
/// the stack of the task handling that query.
#[derive(Debug, Clone)]
pub struct Resolver {
    hints: Vec<String>,
    supported_qtypes: Vec<RecordType>,
    recursion_limit: usize,
    query_timeout: Duration,
    upstream_port: u16,
    cache: SharedCache,
}

impl Resolver {
    /// Build a resolver from the settings, seeding the cache with the
    /// root hint addresses so the hints themselves never need a
    /// network exchange to resolve.
    pub fn new(settings: &Settings) -> Self {
        let cache = SharedCache::new();
        let mut hints = Vec::with_capacity(settings.root_hints.len());

        for hint in &settings.root_hints {
            let hostname = hint.hostname.domain.to_dotted_string();
            cache.insert(&hostname, vec![hint.address]);
            hints.push(hostname);
        }

        Self {
            hints,
            supported_qtypes: settings.supported_qtypes.clone(),
            recursion_limit: settings.recursion_limit,
            query_timeout: Duration::from_secs(settings.query_timeout_seconds),
            upstream_port: settings.upstream_port,
            cache,
        }
    }

    /// The shared cache, for seeding and inspection.
    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// The byte-to-byte entry point: decode a client query, resolve
    /// its first question, and encode the response.
    ///
    /// `None` means no reply should be sent at all: the datagram was
    /// so damaged that not even its ID could be read.
    pub async fn handle_query(&self, octets: &[u8]) -> Option<Vec<u8>> {
        let query = match Message::from_octets(octets) {
            Ok(query) => query,
            Err(err) => {
                tracing::debug!(?err, "could not parse query");
                return err
                    .id()
                    .map(|id| Message::make_error_response(id, err.rcode()).to_octets());
            }
        };

        if query.header.is_response {
            tracing::debug!(id = query.header.id, "query has the response flag set");
            return Some(Message::make_format_error_response(query.header.id).to_octets());
        }

        if let Err(err) = query.validate_supported(&self.supported_qtypes) {
            tracing::debug!(?err, "query for an unsupported type");
            return Some(Message::make_error_response(query.header.id, err.rcode()).to_octets());
        }

        // multi-question messages are not resolved as such: every
        // question is echoed back, but only the first is answered.
        let question_name = query.questions[0].name.clone();
        let addresses = self.resolve(&question_name).await;

        let mut response = query.make_response();
        for address in addresses {
            response.answers.push(ResourceRecord {
                name: question_name.clone(),
                data: RecordData::A { address },
                rclass: RecordClass::IN,
                ttl: 0,
            });
        }

        Some(response.to_octets())
    }

    /// Resolve a domain name to its addresses.  An empty result means
    /// the name could not be resolved; that is an answer, not a
    /// fault.
    pub async fn resolve(&self, name: &DomainName) -> Vec<Ipv4Addr> {
        let span = tracing::error_span!("resolve", %name);
        self.resolve_hostname(&name.to_dotted_string(), 0)
            .instrument(span)
            .await
    }

    /// One level of the iterative walk.  `name` is a canonical dotted
    /// hostname (lowercase, trailing dot), which is also the cache
    /// key format.
    ///
    /// `depth` counts how many nested nameserver-address resolutions
    /// led here.  Delegation graphs can be circular (two zones whose
    /// nameservers live in each other), so the walk carries an
    /// explicit budget instead of trusting the graph to bottom out.
    #[async_recursion]
    async fn resolve_hostname(&self, name: &str, depth: usize) -> Vec<Ipv4Addr> {
        if let Some(addresses) = self.cache.lookup(name) {
            tracing::trace!(%name, "cache HIT");
            return addresses;
        }
        tracing::trace!(%name, "cache MISS");

        if depth >= self.recursion_limit {
            tracing::warn!(%name, depth, "hit recursion limit resolving nameserver chain");
            return Vec::new();
        }

        let target = match DomainName::from_dotted_string(name) {
            Some(target) => target,
            None => {
                tracing::debug!(%name, "not a resolvable name");
                return Vec::new();
            }
        };

        let mut candidates = CandidateQueue::new(name, self.hints.iter().cloned());

        while let Some(ns) = candidates.dequeue() {
            let addresses = match self.cache.lookup(&ns) {
                Some(addresses) => addresses,
                None => {
                    let found = self.resolve_hostname(&ns, depth + 1).await;
                    self.cache.insert(&ns, found.clone());
                    found
                }
            };

            let address = match addresses.first() {
                Some(address) => *address,
                None => {
                    tracing::debug!(nameserver = %ns, "candidate has no address, skipping");
                    continue;
                }
            };

            match self.query_nameserver(&target, &ns, address).await {
                Some(NameserverAnswer::Addresses(found)) => {
                    self.cache.insert(name, found.clone());
                    return found;
                }
                Some(NameserverAnswer::Referral(nameservers)) => {
                    for nameserver in nameservers {
                        candidates.enqueue(&nameserver);
                    }
                }
                None => (),
            }
        }

        tracing::debug!(%name, "exhausted all candidates without an answer");
        Vec::new()
    }

    /// Ask one nameserver for `target`'s A records.  Three outcomes:
    /// addresses, a referral to (hopefully closer) nameservers, or
    /// nothing useful - including any transport or decode failure,
    /// which is recovered from by just moving to the next candidate.
    ///
    /// Glue addresses found for referred-to nameservers are cached
    /// here, keyed by the nameserver's name, so the walk does not
    /// have to resolve them from scratch.
    async fn query_nameserver(
        &self,
        target: &DomainName,
        ns: &str,
        address: Ipv4Addr,
    ) -> Option<NameserverAnswer> {
        let question = Question {
            name: target.clone(),
            qtype: RecordType::A,
            qclass: RecordClass::IN,
        };
        let request = Message::from_question(rand::thread_rng().gen(), question);
        let request_id = request.header.id;

        tracing::debug!(nameserver = %ns, %address, name = %target, "querying");

        let raw = match transport::exchange(
            address,
            self.upstream_port,
            &request.to_octets(),
            self.query_timeout,
        )
        .await
        {
            Ok(raw) => raw,
            Err(err) => {
                tracing::debug!(nameserver = %ns, %err, "exchange failed, skipping candidate");
                return None;
            }
        };

        let response = match Message::from_octets(&raw) {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(nameserver = %ns, ?err, "unparseable response, skipping candidate");
                return None;
            }
        };

        if response.header.id != request_id || !response.header.is_response {
            tracing::debug!(nameserver = %ns, "response does not match query, skipping candidate");
            return None;
        }

        let addresses: Vec<Ipv4Addr> = response
            .answers
            .iter()
            .filter_map(|rr| match rr.data {
                RecordData::A { address } if rr.name == *target => Some(address),
                _ => None,
            })
            .collect();

        if !addresses.is_empty() {
            tracing::debug!(name = %target, count = addresses.len(), "got answer");
            return Some(NameserverAnswer::Addresses(addresses));
        }

        let mut referred = Vec::new();
        for rr in &response.authority {
            if let RecordData::NS { nsdname } = &rr.data {
                let ns_name = nsdname.to_dotted_string();

                let glue: Vec<Ipv4Addr> = response
                    .additional
                    .iter()
                    .filter_map(|ar| match ar.data {
                        RecordData::A { address } if ar.name == *nsdname => Some(address),
                        _ => None,
                    })
                    .collect();
                self.cache.insert(&ns_name, glue);

                referred.push(ns_name);
            }
        }

        if referred.is_empty() {
            tracing::debug!(nameserver = %ns, "nothing useful in response");
            None
        } else {
            tracing::debug!(nameserver = %ns, count = referred.len(), "got referral");
            Some(NameserverAnswer::Referral(referred))
        }
    }
}

/// What a single nameserver exchange produced.
enum NameserverAnswer {
    /// A records for the name being resolved.
    Addresses(Vec<Ipv4Addr>),
    /// NS hostnames to try next, closest first once they go through
    /// the candidate queue.
    Referral(Vec<String>),
}
