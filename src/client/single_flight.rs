use std::{
    collections::HashSet,
    hash::Hash,
    sync::{Arc, Mutex, PoisonError},
};

/// Forms that can be submitted independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormId {
    Auth,
    ForgotPassword,
}

/// Allows at most one outstanding submission per key.
#[derive(Debug)]
pub struct SingleFlight<K> {
    active: Arc<Mutex<HashSet<K>>>,
}

impl<K> Clone for SingleFlight<K> {
    fn clone(&self) -> Self {
        Self {
            active: Arc::clone(&self.active),
        }
    }
}

impl<K> Default for SingleFlight<K> {
    fn default() -> Self {
        Self {
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

impl<K: Eq + Hash + Clone> SingleFlight<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `key`, or returns `None` if it is already claimed. The claim is
    /// released when the guard drops.
    pub fn try_acquire(&self, key: K) -> Option<FlightGuard<K>> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(key.clone()) {
            return None;
        }
        Some(FlightGuard {
            active: Arc::clone(&self.active),
            key,
        })
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

pub struct FlightGuard<K: Eq + Hash> {
    active: Arc<Mutex<HashSet<K>>>,
    key: K,
}

impl<K: Eq + Hash> Drop for FlightGuard<K> {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused_until_release() {
        let sf = SingleFlight::new();
        let guard = sf.try_acquire(FormId::Auth).unwrap();
        assert!(sf.try_acquire(FormId::Auth).is_none());
        assert!(sf.is_in_flight(&FormId::Auth));

        drop(guard);
        assert!(!sf.is_in_flight(&FormId::Auth));
        assert!(sf.try_acquire(FormId::Auth).is_some());
    }

    #[test]
    fn keys_are_independent() {
        let sf = SingleFlight::new();
        let _auth = sf.try_acquire(FormId::Auth).unwrap();
        assert!(sf.try_acquire(FormId::ForgotPassword).is_some());
    }

    #[test]
    fn clones_share_claims() {
        let a = SingleFlight::new();
        let b = a.clone();
        let _g = a.try_acquire(FormId::ForgotPassword).unwrap();
        assert!(b.try_acquire(FormId::ForgotPassword).is_none());
    }
}
