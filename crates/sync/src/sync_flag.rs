//! The "engine is seeking" flag that gates drift correction.
//!
//! Raising the flag returns a [`SyncGuard`]; dropping the guard lowers it.
//! Each raise gets a fresh generation, and a guard only lowers the flag if
//! no newer raise happened since, so a superseded seek finishing late
//! cannot cut a newer seek's protection short.

use std::sync::atomic::{AtomicU64, Ordering};

/// Generation value meaning "not syncing".
const IDLE: u64 = 0;

#[derive(Debug, Default)]
pub struct SyncFlag {
    /// Generation of the seek currently holding the flag, or [`IDLE`].
    active: AtomicU64,
    next: AtomicU64,
}

impl SyncFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.active.load(Ordering::Acquire) != IDLE
    }

    /// Raise the flag for the lifetime of the returned guard.
    pub fn raise(&self) -> SyncGuard<'_> {
        let generation = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        self.active.store(generation, Ordering::Release);
        SyncGuard {
            flag: self,
            generation,
        }
    }
}

/// Lowers its [`SyncFlag`] on drop, on every exit path including unwinding.
#[derive(Debug)]
pub struct SyncGuard<'a> {
    flag: &'a SyncFlag,
    generation: u64,
}

impl SyncGuard<'_> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `false` once a newer seek has raised the flag.
    pub fn is_current(&self) -> bool {
        self.flag.active.load(Ordering::Acquire) == self.generation
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        let _ = self.flag.active.compare_exchange(
            self.generation,
            IDLE,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_lowers_flag_on_drop() {
        let flag = SyncFlag::new();
        assert!(!flag.is_set());
        {
            let guard = flag.raise();
            assert!(flag.is_set());
            assert!(guard.is_current());
        }
        assert!(!flag.is_set());
    }

    #[test]
    fn superseded_guard_does_not_lower_newer_flag() {
        let flag = SyncFlag::new();
        let older = flag.raise();
        let newer = flag.raise();
        assert!(!older.is_current());

        drop(older);
        assert!(flag.is_set());

        drop(newer);
        assert!(!flag.is_set());
    }

    #[test]
    fn flag_is_lowered_when_seek_panics() {
        let flag = SyncFlag::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = flag.raise();
            panic!("seek blew up");
        }));
        assert!(result.is_err());
        assert!(!flag.is_set());
    }

    #[test]
    fn generations_increase() {
        let flag = SyncFlag::new();
        let a = flag.raise().generation();
        let b = flag.raise().generation();
        assert!(b > a);
    }
}
