use crate::{
    clock::{Clock, SystemClock},
    config::SiweConfig,
    crypto::nonce::generate_nonce,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Issuer and tracker of single-use sign-in nonces
///
/// A token is valid iff it was issued by this store, has not expired and has
/// not been consumed. Implementations backed by shared storage must make
/// [`NonceStore::try_consume`] atomic so that exactly one of several
/// concurrent callers wins a given token.
pub trait NonceStore: Send + Sync {
    /// Create and remember a fresh token
    fn issue(&self) -> String;

    fn is_valid(&self, token: &str) -> bool;

    /// Mark `token` used if it is currently valid; returns whether this call did so
    fn try_consume(&self, token: &str) -> bool;

    /// Mark `token` used. Unknown, expired and already used tokens are left alone.
    fn consume(&self, token: &str) {
        self.try_consume(token);
    }
}

/// Book-keeping for one issued token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceRecord {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub used: bool,
    pub expires_at: DateTime<Utc>,
}

impl NonceRecord {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_live(now) && !self.used
    }
}

/// Process-local [`NonceStore`] keeping records in a mutex-guarded map
///
/// Expired records are dropped lazily on access and by
/// [`InMemoryNonceStore::purge_expired`].
pub struct InMemoryNonceStore {
    records: Mutex<HashMap<String, NonceRecord>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    consumed_grace: Duration,
    nonce_length: usize,
}

impl InMemoryNonceStore {
    pub fn new(config: &SiweConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &SiweConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            clock,
            ttl: config.nonce_ttl(),
            consumed_grace: config.consumed_grace(),
            nonce_length: config.effective_nonce_length(),
        }
    }

    /// Snapshot of the record for `token`, if one is still held
    pub fn record(&self, token: &str) -> Option<NonceRecord> {
        let now = self.clock.now();
        let mut records = self.lock();
        Self::live_record(&mut records, token, now).cloned()
    }

    /// Drop every expired record, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut records = self.lock();
        let before = records.len();
        records.retain(|_, record| record.is_live(now));
        before - records.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, NonceRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live_record<'a>(
        records: &'a mut HashMap<String, NonceRecord>,
        token: &str,
        now: DateTime<Utc>,
    ) -> Option<&'a mut NonceRecord> {
        let expired = records.get(token).is_some_and(|record| !record.is_live(now));
        if expired {
            records.remove(token);
            return None;
        }
        records.get_mut(token)
    }
}

fn expiry(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now.checked_add_signed(window)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl NonceStore for InMemoryNonceStore {
    fn issue(&self) -> String {
        let now = self.clock.now();
        let mut records = self.lock();
        let token = loop {
            let candidate = generate_nonce(self.nonce_length);
            let taken = records
                .get(&candidate)
                .is_some_and(|record| record.is_live(now));
            if !taken {
                break candidate;
            }
        };

        records.insert(
            token.clone(),
            NonceRecord {
                token: token.clone(),
                issued_at: now,
                used: false,
                expires_at: expiry(now, self.ttl),
            },
        );
        tracing::debug!(nonce = %token, ttl_secs = self.ttl.num_seconds(), "issued nonce");
        token
    }

    fn is_valid(&self, token: &str) -> bool {
        let now = self.clock.now();
        let mut records = self.lock();
        Self::live_record(&mut records, token, now).is_some_and(|record| !record.used)
    }

    fn try_consume(&self, token: &str) -> bool {
        let now = self.clock.now();
        let mut records = self.lock();
        match Self::live_record(&mut records, token, now) {
            Some(record) if !record.used => {
                record.used = true;
                record.expires_at = expiry(now, self.consumed_grace);
                tracing::debug!(nonce = %token, "consumed nonce");
                true
            }
            _ => false,
        }
    }
}
