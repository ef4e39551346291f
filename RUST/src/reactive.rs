//! Versioned inputs and lazily recomputed derived values.
//!
//! Every write to a [`Signal`] bumps its version. A [`Memo`] remembers the
//! versions it was computed from and recomputes on the next read whenever
//! they differ, so a derived value can never be observed stale.

use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct Signal<T> {
    value: T,
    version: u64,
}

impl<T> Signal<T> {
    pub fn new(value: T) -> Self {
        Self { value, version: 0 }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Unconditional write; dependents are invalidated even for an equal value.
    pub fn set(&mut self, value: T) {
        self.value = value;
        self.version = self.version.wrapping_add(1);
    }

    /// Write only when the value differs. Returns whether it did.
    pub fn set_if_changed(&mut self, value: T) -> bool
    where
        T: PartialEq,
    {
        if self.value == value {
            return false;
        }
        self.set(value);
        true
    }
}

impl<T: Default> Default for Signal<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Cached value keyed by the versions of its inputs.
#[derive(Debug)]
pub struct Memo<K, T> {
    cache: RefCell<Option<(K, Rc<T>)>>,
    computations: RefCell<u64>,
}

impl<K: PartialEq, T> Memo<K, T> {
    pub fn new() -> Self {
        Self {
            cache: RefCell::new(None),
            computations: RefCell::new(0),
        }
    }

    /// Cached value for `key`, running `compute` first if the key moved.
    pub fn get_or_compute(&self, key: K, compute: impl FnOnce() -> T) -> Rc<T> {
        if let Some((k, v)) = self.cache.borrow().as_ref() {
            if *k == key {
                return Rc::clone(v);
            }
        }
        let value = Rc::new(compute());
        *self.computations.borrow_mut() += 1;
        *self.cache.borrow_mut() = Some((key, Rc::clone(&value)));
        value
    }

    pub fn is_fresh(&self, key: &K) -> bool {
        matches!(self.cache.borrow().as_ref(), Some((k, _)) if k == key)
    }

    pub fn invalidate(&self) {
        *self.cache.borrow_mut() = None;
    }

    /// How many times the value has been (re)computed.
    pub fn computations(&self) -> u64 {
        *self.computations.borrow()
    }
}

impl<K: PartialEq, T> Default for Memo<K, T> {
    fn default() -> Self {
        Self::new()
    }
}
