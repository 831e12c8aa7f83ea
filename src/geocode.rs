use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::{RegionProfile, ViewBox};
use crate::errors::AppResult;

/// A resolved position. Latitude and longitude always travel together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

/// Constraints attached to every outbound query.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionBias {
    pub country_codes: String,
    pub viewbox: ViewBox,
    pub bounded: bool,
}

impl From<&RegionProfile> for RegionBias {
    fn from(profile: &RegionProfile) -> Self {
        Self {
            country_codes: profile.country_code.clone(),
            viewbox: profile.viewbox,
            bounded: true,
        }
    }
}

/// The external coordinate lookup capability.
///
/// Implementations return every match the service produced for `text`; the
/// client decides what counts as a usable answer.
pub trait GeocodeLookup {
    fn query(&self, text: &str, bias: &RegionBias) -> AppResult<Vec<Coordinate>>;

    /// `false` for backends that can never produce a match, so callers can
    /// skip throttling and retries entirely.
    fn is_available(&self) -> bool {
        true
    }
}

impl<L: GeocodeLookup + ?Sized> GeocodeLookup for Box<L> {
    fn query(&self, text: &str, bias: &RegionBias) -> AppResult<Vec<Coordinate>> {
        (**self).query(text, bias)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

/// Source of time for throttling.
pub trait Pacer {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

impl<P: Pacer + ?Sized> Pacer for &P {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPacer;

impl Pacer for SystemPacer {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookupPolicy {
    /// Minimum spacing between any two outbound queries in a run.
    pub min_interval: Duration,
    /// Attempts per candidate.
    pub attempts: u32,
    /// Pause after a failed attempt when another attempt follows.
    pub retry_delay: Duration,
}

impl Default for LookupPolicy {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(1),
            attempts: 2,
            retry_delay: Duration::from_millis(800),
        }
    }
}

struct RateLimiter {
    min_interval: Duration,
    last_tick: Mutex<Option<Instant>>,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_tick: Mutex::new(None),
        }
    }

    fn wait(&self, pacer: &dyn Pacer) {
        let mut guard = self.last_tick.lock();
        if let Some(prev) = *guard {
            let elapsed = pacer.now().saturating_duration_since(prev);
            if elapsed < self.min_interval {
                pacer.sleep(self.min_interval - elapsed);
            }
        }
        *guard = Some(pacer.now());
    }
}

/// Throttled, retrying front for a [`GeocodeLookup`].
pub struct RateLimitedLookupClient<L, P> {
    lookup: L,
    pacer: P,
    limiter: RateLimiter,
    policy: LookupPolicy,
    bias: RegionBias,
    queries_issued: AtomicU64,
}

impl<L: GeocodeLookup, P: Pacer> RateLimitedLookupClient<L, P> {
    pub fn new(lookup: L, pacer: P, policy: LookupPolicy, bias: RegionBias) -> Self {
        Self {
            lookup,
            pacer,
            limiter: RateLimiter::new(policy.min_interval),
            policy: LookupPolicy {
                attempts: policy.attempts.max(1),
                ..policy
            },
            bias,
            queries_issued: AtomicU64::new(0),
        }
    }

    /// Tries each candidate in order and returns the first unambiguous match.
    /// `None` means every candidate used up its attempts.
    pub fn resolve(&self, candidates: &[String]) -> Option<Coordinate> {
        if !self.lookup.is_available() {
            trace!("lookup backend unavailable; not querying");
            return None;
        }
        let attempts = self.policy.attempts as usize;
        let total = candidates.len() * attempts;
        let mut issued = 0;

        for candidate in candidates {
            for attempt in 1..=attempts {
                issued += 1;
                if let Some(coordinate) = self.attempt(candidate, attempt) {
                    return Some(coordinate);
                }
                if issued < total {
                    self.pacer.sleep(self.policy.retry_delay);
                }
            }
        }
        None
    }

    pub fn queries_issued(&self) -> u64 {
        self.queries_issued.load(Ordering::SeqCst)
    }

    fn attempt(&self, candidate: &str, attempt: usize) -> Option<Coordinate> {
        self.limiter.wait(&self.pacer);
        self.queries_issued.fetch_add(1, Ordering::SeqCst);

        match self.lookup.query(candidate, &self.bias) {
            Ok(matches) if matches.len() == 1 => {
                trace!(candidate, attempt, "geocode hit");
                Some(matches[0])
            }
            Ok(matches) if matches.is_empty() => {
                debug!(candidate, attempt, "geocode returned no match");
                None
            }
            Ok(matches) => {
                debug!(
                    candidate,
                    attempt,
                    count = matches.len(),
                    "geocode answer ambiguous; treating as a miss"
                );
                None
            }
            Err(err) => {
                warn!(?err, candidate, attempt, "geocode query failed");
                None
            }
        }
    }
}

/// Offline lookup table: query text to the matches it should produce.
///
/// The file is a JSON object such as
/// `{"Jalan Tibung Sari, Denpasar": [{"lat": -8.65, "lon": 115.21}]}`;
/// keys match case-insensitively.
#[derive(Debug, Default, Clone)]
pub struct GazetteerLookup {
    entries: HashMap<String, Vec<Coordinate>>,
}

impl GazetteerLookup {
    pub fn load(path: &Path) -> AppResult<Self> {
        let contents = fs::read_to_string(path)?;
        let raw: HashMap<String, Vec<Coordinate>> = serde_json::from_str(&contents)?;
        Ok(Self::from_entries(raw))
    }

    pub fn from_entries(raw: HashMap<String, Vec<Coordinate>>) -> Self {
        let entries = raw
            .into_iter()
            .map(|(key, value)| (key.trim().to_lowercase(), value))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl GeocodeLookup for GazetteerLookup {
    fn query(&self, text: &str, bias: &RegionBias) -> AppResult<Vec<Coordinate>> {
        let matches = self
            .entries
            .get(&text.trim().to_lowercase())
            .map(|found| {
                found
                    .iter()
                    .copied()
                    .filter(|c| !bias.bounded || bias.viewbox.contains(c.lat, c.lon))
                    .collect()
            })
            .unwrap_or_default();
        Ok(matches)
    }
}

/// Used when no lookup backend is configured; only cached addresses resolve.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineLookup;

impl GeocodeLookup for OfflineLookup {
    fn query(&self, _text: &str, _bias: &RegionBias) -> AppResult<Vec<Coordinate>> {
        Ok(Vec::new())
    }

    fn is_available(&self) -> bool {
        false
    }
}
