//! Mutex used for batch bookkeeping (consumers, progress, reports).
//!
//! `parking_lot::Mutex` with the `fast-lock` feature, `std::sync::Mutex`
//! otherwise. Graphs themselves are never shared between threads; only the
//! small bits of state a parallel batch reports into go through here.

#[cfg(feature = "fast-lock")]
use parking_lot::Mutex as ParkingLotMutex;

#[cfg(not(feature = "fast-lock"))]
use std::sync::Mutex as StdMutex;

/// Mutex type selected by the `fast-lock` feature.
///
/// ```rust
/// use annograph::sync::{lock, Mutex};
///
/// let done = Mutex::new(Vec::new());
/// lock(&done).push("utterance 1");
/// assert_eq!(lock(&done).len(), 1);
/// ```
#[cfg(feature = "fast-lock")]
pub type Mutex<T> = ParkingLotMutex<T>;

/// Mutex type selected by the `fast-lock` feature.
#[cfg(not(feature = "fast-lock"))]
pub type Mutex<T> = StdMutex<T>;

/// Lock a mutex. A poisoned std mutex yields its guard anyway: a panicking
/// fragment worker must not hide the results of the others.
#[cfg(feature = "fast-lock")]
pub fn lock<T>(mutex: &Mutex<T>) -> parking_lot::MutexGuard<'_, T> {
    mutex.lock()
}

/// Lock a mutex. A poisoned std mutex yields its guard anyway: a panicking
/// fragment worker must not hide the results of the others.
#[cfg(not(feature = "fast-lock"))]
pub fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Take the value out of a mutex that is no longer shared.
#[cfg(feature = "fast-lock")]
pub fn into_inner<T>(mutex: Mutex<T>) -> T {
    mutex.into_inner()
}

/// Take the value out of a mutex that is no longer shared.
#[cfg(not(feature = "fast-lock"))]
pub fn into_inner<T>(mutex: Mutex<T>) -> T {
    mutex.into_inner().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn lock_across_threads() {
        let counter = Arc::new(Mutex::new(0usize));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        *lock(&counter) += 1;
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lock(&counter), 400);
    }

    #[test]
    fn into_inner_returns_value() {
        let m = Mutex::new(vec![1, 2]);
        lock(&m).push(3);
        assert_eq!(into_inner(m), vec![1, 2, 3]);
    }
}
