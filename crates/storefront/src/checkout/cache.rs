//! Per-pincode lookup caches with an in-flight guard.
//!
//! Entries live for the lifetime of the process and are never persisted.
//! Claiming a pincode and marking it as checking happen under one lock, so
//! at most one lookup per pincode is outstanding at any time. A claim that is
//! dropped before it settles (a cancelled lookup) puts the previous entry
//! back, so a pincode never stays "checking" without a lookup behind it.

use std::collections::HashMap;

use parking_lot::Mutex;
use rust_decimal::Decimal;

use craftmart_core::Pincode;

/// A cached lookup result that can also represent "lookup in progress".
pub trait PincodeEntry: Clone {
    /// Placeholder stored while the lookup is outstanding.
    fn checking() -> Self;

    fn is_checking(&self) -> bool;
}

/// Prepaid serviceability for one pincode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceabilityEntry {
    pub checking: bool,
    /// `None` when the partner gave no answer or the lookup failed.
    pub prepaid: Option<bool>,
    pub error: Option<String>,
}

impl ServiceabilityEntry {
    /// Known to refuse prepaid orders.
    #[must_use]
    pub const fn is_unserviceable(&self) -> bool {
        matches!(self.prepaid, Some(false))
    }
}

impl PincodeEntry for ServiceabilityEntry {
    fn checking() -> Self {
        Self {
            checking: true,
            ..Self::default()
        }
    }

    fn is_checking(&self) -> bool {
        self.checking
    }
}

/// Delivery charge for one pincode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryChargeEntry {
    pub checking: bool,
    pub value: Option<Decimal>,
    pub error: Option<String>,
}

impl PincodeEntry for DeliveryChargeEntry {
    fn checking() -> Self {
        Self {
            checking: true,
            ..Self::default()
        }
    }

    fn is_checking(&self) -> bool {
        self.checking
    }
}

/// What a caller should do after trying to claim a pincode.
#[derive(Debug)]
pub enum Claim<'a, E: PincodeEntry> {
    /// The caller now owns the lookup and must settle it through the guard.
    Fetch(ClaimGuard<'a, E>),
    /// Another lookup is outstanding or a result is cached.
    Existing(E),
}

/// Ownership of an outstanding lookup for one pincode.
///
/// Dropping the guard without [`ClaimGuard::settle`] restores whatever was
/// cached before the claim.
#[must_use = "dropping the guard abandons the lookup"]
pub struct ClaimGuard<'a, E: PincodeEntry> {
    cache: &'a PincodeCache<E>,
    pincode: Pincode,
    previous: Option<E>,
    settled: bool,
}

impl<E: PincodeEntry> ClaimGuard<'_, E> {
    /// Store the result of the lookup.
    pub fn settle(mut self, entry: E) {
        self.cache.entries.lock().insert(self.pincode.clone(), entry);
        self.settled = true;
    }
}

impl<E: PincodeEntry> Drop for ClaimGuard<'_, E> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut entries = self.cache.entries.lock();
        match self.previous.take() {
            Some(previous) => {
                entries.insert(self.pincode.clone(), previous);
            }
            None => {
                entries.remove(&self.pincode);
            }
        }
    }
}

impl<E: PincodeEntry> std::fmt::Debug for ClaimGuard<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimGuard")
            .field("pincode", &self.pincode.as_str())
            .field("settled", &self.settled)
            .finish_non_exhaustive()
    }
}

/// Map of pincode → entry.
#[derive(Debug)]
pub struct PincodeCache<E> {
    entries: Mutex<HashMap<Pincode, E>>,
}

impl<E> Default for PincodeCache<E> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<E: PincodeEntry> PincodeCache<E> {
    #[must_use]
    pub fn get(&self, pincode: &Pincode) -> Option<E> {
        self.entries.lock().get(pincode).cloned()
    }

    /// Claim `pincode` for a lookup.
    ///
    /// An outstanding lookup is never duplicated. A settled result is reused
    /// unless `refetch` is set.
    pub fn claim(&self, pincode: &Pincode, refetch: bool) -> Claim<'_, E> {
        let mut entries = self.entries.lock();
        match entries.get(pincode) {
            Some(entry) if entry.is_checking() || !refetch => Claim::Existing(entry.clone()),
            _ => {
                let previous = entries.insert(pincode.clone(), E::checking());
                Claim::Fetch(ClaimGuard {
                    cache: self,
                    pincode: pincode.clone(),
                    previous,
                    settled: false,
                })
            }
        }
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pin(s: &str) -> Pincode {
        Pincode::parse(s).unwrap()
    }

    fn failed(reason: &str) -> ServiceabilityEntry {
        ServiceabilityEntry {
            checking: false,
            prepaid: None,
            error: Some(reason.to_string()),
        }
    }

    #[test]
    fn test_second_claim_while_checking_does_not_fetch() {
        let cache: PincodeCache<ServiceabilityEntry> = PincodeCache::default();
        let p = pin("400001");
        let _guard = cache.claim(&p, false);
        assert!(matches!(
            cache.claim(&p, false),
            Claim::Existing(e) if e == ServiceabilityEntry::checking()
        ));
        // Even a forced refetch waits for the outstanding lookup.
        assert!(matches!(cache.claim(&p, true), Claim::Existing(_)));
    }

    #[test]
    fn test_settled_result_is_reused_unless_refetching() {
        let cache: PincodeCache<ServiceabilityEntry> = PincodeCache::default();
        let p = pin("560001");
        let Claim::Fetch(guard) = cache.claim(&p, false) else {
            panic!("first claim should fetch");
        };
        guard.settle(failed("timeout"));

        assert!(matches!(
            cache.claim(&p, false),
            Claim::Existing(e) if e == failed("timeout")
        ));
        assert!(matches!(cache.claim(&p, true), Claim::Fetch(_)));
    }

    #[test]
    fn test_abandoned_claim_frees_the_pincode() {
        let cache: PincodeCache<ServiceabilityEntry> = PincodeCache::default();
        let p = pin("400001");
        let claim = cache.claim(&p, false);
        assert!(cache.get(&p).unwrap().checking);
        drop(claim);

        assert!(cache.get(&p).is_none());
        assert!(matches!(cache.claim(&p, false), Claim::Fetch(_)));
    }

    #[test]
    fn test_abandoned_refetch_restores_previous_result() {
        let cache: PincodeCache<ServiceabilityEntry> = PincodeCache::default();
        let p = pin("600001");
        if let Claim::Fetch(guard) = cache.claim(&p, false) {
            guard.settle(failed("timeout"));
        }

        drop(cache.claim(&p, true));
        assert_eq!(cache.get(&p), Some(failed("timeout")));
    }

    #[test]
    fn test_pincodes_are_independent() {
        let cache: PincodeCache<DeliveryChargeEntry> = PincodeCache::default();
        let first = cache.claim(&pin("110001"), false);
        let second = cache.claim(&pin("110002"), false);
        assert!(matches!(first, Claim::Fetch(_)));
        assert!(matches!(second, Claim::Fetch(_)));
        drop((first, second));
        cache.clear();
        assert!(cache.get(&pin("110001")).is_none());
    }
}
