use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::OwnershipCache;
use crate::error::{Error, Result};

/// Owner description cached and displayed when a lookup fails.
///
/// ip2location reports reserved and private ranges with `-` in every field,
/// which renders to this same string.
pub const UNKNOWN_OWNER: &str = "- / -";

/// Base URL of the ip2location.io lookup API.
pub const DEFAULT_ENDPOINT: &str = "https://api.ip2location.io/";

/// Environment variable holding the lookup credential.
pub const API_KEY_ENV: &str = "IP2LOCATION_API_KEY";

/// Default per-request timeout for the lookup agent.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A service that can describe who owns an IP address.
///
/// Implementations return a single display line; the resolver takes care of
/// caching and of turning errors into [`UNKNOWN_OWNER`].
pub trait OwnerLookup {
    fn lookup(&self, ip: &str) -> Result<String>;
}

impl<T: OwnerLookup + ?Sized> OwnerLookup for &T {
    fn lookup(&self, ip: &str) -> Result<String> {
        (**self).lookup(ip)
    }
}

/// The owner of one IP and whether it was already known before this call.
///
/// `cached` only selects the emphasis style; it never changes `owner`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnershipResult {
    pub owner: String,
    pub cached: bool,
}

/// Resolves IP owners through an [`OwnershipCache`], falling back to an
/// [`OwnerLookup`] on a miss.
///
/// Every miss is written back to the cache, failures included, so a given IP
/// is looked up at most once per cache lifetime.
pub struct OwnershipResolver<'c, L> {
    cache: &'c mut OwnershipCache,
    service: L,
    lookups: usize,
    hits: usize,
}

impl<'c, L: OwnerLookup> OwnershipResolver<'c, L> {
    pub fn new(cache: &'c mut OwnershipCache, service: L) -> Self {
        Self {
            cache,
            service,
            lookups: 0,
            hits: 0,
        }
    }

    pub fn resolve(&mut self, ip: &str) -> OwnershipResult {
        if let Some(owner) = self.cache.get(ip) {
            self.hits += 1;
            return OwnershipResult {
                owner: owner.to_owned(),
                cached: true,
            };
        }

        self.lookups += 1;
        debug!(ip, "looking up owner");
        let owner = match self.service.lookup(ip) {
            Ok(owner) => owner,
            Err(err) => {
                warn!(ip, error = %err, "owner lookup failed, caching {:?}", UNKNOWN_OWNER);
                UNKNOWN_OWNER.to_owned()
            }
        };

        self.cache.put(ip, owner.clone());
        OwnershipResult {
            owner,
            cached: false,
        }
    }

    pub fn cache(&self) -> &OwnershipCache {
        self.cache
    }

    /// Number of calls that reached the lookup service.
    pub fn lookups(&self) -> usize {
        self.lookups
    }

    /// Number of calls served from the cache.
    pub fn hits(&self) -> usize {
        self.hits
    }
}

/// The subset of an ip2location.io response used to describe an owner.
#[derive(Debug, Default, Deserialize)]
struct Location {
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default, rename = "as")]
    as_name: Option<String>,
    #[serde(default)]
    asn: Option<String>,
}

impl Location {
    /// Render as `"<country> / <as>"`, using `AS<asn>` when the AS name is
    /// absent.
    fn describe(self, ip: &str) -> Result<String> {
        let country = non_empty(self.country_code).ok_or_else(|| Error::MissingField {
            ip: ip.to_owned(),
            field: "country_code",
        })?;

        let system = match (non_empty(self.as_name), non_empty(self.asn)) {
            (Some(name), _) => name,
            (None, Some(asn)) => format!("AS{}", asn),
            (None, None) => {
                return Err(Error::MissingField {
                    ip: ip.to_owned(),
                    field: "as",
                })
            }
        };

        Ok(single_line(&format!("{} / {}", country, system)))
    }
}

#[inline]
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Owner descriptions are spliced into a single output line.
fn single_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

/// [`OwnerLookup`] backed by the ip2location.io HTTP API.
///
/// Issues `GET <endpoint>?key=<key>&ip=<ip>` synchronously, without retries.
#[derive(Clone)]
pub struct Ip2Location {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
}

impl fmt::Debug for Ip2Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ip2Location")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl Ip2Location {
    /// Create a client for the public endpoint. An empty key is rejected.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::MissingApiKey);
        }

        Ok(Self {
            agent: build_agent(DEFAULT_TIMEOUT),
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            api_key,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new().timeout(timeout).build()
}

impl OwnerLookup for Ip2Location {
    fn lookup(&self, ip: &str) -> Result<String> {
        let response = self
            .agent
            .get(&self.endpoint)
            .query("key", &self.api_key)
            .query("ip", ip)
            .call()
            .map_err(|source| Error::LookupRequest {
                ip: ip.to_owned(),
                source: Box::new(source),
            })?;

        let body = response.into_string().map_err(|source| Error::LookupBody {
            ip: ip.to_owned(),
            source,
        })?;

        let location: Location =
            serde_json::from_str(&body).map_err(|source| Error::LookupDecode {
                ip: ip.to_owned(),
                source,
            })?;

        location.describe(ip)
    }
}
