//! Object pool for transport-level scratch objects
//!
//! Built on a lock-free `ArrayQueue`. Instances are handed out wrapped in a
//! [`Pooled`] guard that resets the instance and returns it to the pool when
//! dropped, so every exit path releases exactly once and nothing can touch the
//! instance after release.

use crossbeam::queue::ArrayQueue;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use turbogate_types::{DEFAULT_MAP_CAPACITY, TransportRequest, TransportResponse};

/// A type that can live in an [`ObjectPool`]
///
/// `Default` must not allocate; the guard swaps it in when handing the
/// instance back.
pub trait Poolable: Default + Send + 'static {
    /// Allocate a fresh instance with pre-sized internal collections
    fn new_pooled() -> Self;

    /// Clear every field while keeping allocated capacity
    fn reset(&mut self);
}

impl Poolable for TransportRequest {
    fn new_pooled() -> Self {
        TransportRequest::with_capacity(DEFAULT_MAP_CAPACITY)
    }

    fn reset(&mut self) {
        TransportRequest::reset(self);
    }
}

impl Poolable for TransportResponse {
    fn new_pooled() -> Self {
        TransportResponse::with_capacity(DEFAULT_MAP_CAPACITY)
    }

    fn reset(&mut self) {
        TransportResponse::reset(self);
    }
}

/// Snapshot of pool counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Acquisitions served by an idle instance
    pub reused: u64,
    /// Acquisitions that had to allocate
    pub allocated: u64,
    /// Instances returned to the pool
    pub released: u64,
    /// Instances dropped on release because the pool was full
    pub discarded: u64,
    /// Idle instances currently in the pool
    pub idle: usize,
}

/// Bounded pool of reusable instances
pub struct ObjectPool<T: Poolable> {
    idle: ArrayQueue<T>,
    reused: AtomicU64,
    allocated: AtomicU64,
    released: AtomicU64,
    discarded: AtomicU64,
}

impl<T: Poolable> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("capacity", &self.idle.capacity())
            .field("stats", &self.stats())
            .finish()
    }
}

impl<T: Poolable> ObjectPool<T> {
    /// Create a pool holding at most `max_idle` idle instances, `prewarm` of
    /// them allocated up front
    ///
    /// A `max_idle` of 0 is raised to 1.
    pub fn new(prewarm: usize, max_idle: usize) -> Arc<Self> {
        let idle = ArrayQueue::new(max_idle.max(1));
        for _ in 0..prewarm.min(idle.capacity()) {
            let _ = idle.push(T::new_pooled());
        }

        Arc::new(Self {
            idle,
            reused: AtomicU64::new(0),
            allocated: AtomicU64::new(0),
            released: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        })
    }

    /// Take an instance from the pool or allocate a new one
    ///
    /// The instance is zeroed: it was reset either on release or at creation.
    #[inline]
    pub fn acquire(self: &Arc<Self>) -> Pooled<T> {
        let value = match self.idle.pop() {
            Some(value) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                value
            }
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                T::new_pooled()
            }
        };

        Pooled {
            value,
            pool: Arc::clone(self),
            detached: false,
        }
    }

    #[inline]
    fn release(&self, mut value: T) {
        value.reset();
        if self.idle.push(value).is_ok() {
            self.released.fetch_add(1, Ordering::Relaxed);
        } else {
            self.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Current counters
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            reused: self.reused.load(Ordering::Relaxed),
            allocated: self.allocated.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            idle: self.idle.len(),
        }
    }
}

/// Exclusive handle on a pooled instance; releases on drop
pub struct Pooled<T: Poolable> {
    value: T,
    pool: Arc<ObjectPool<T>>,
    detached: bool,
}

impl<T: Poolable> Pooled<T> {
    /// Detach the instance from the pool; it will not be returned
    pub fn into_inner(mut self) -> T {
        self.detached = true;
        std::mem::take(&mut self.value)
    }
}

impl<T: Poolable> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Poolable> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: Poolable + fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pooled").field(&self.value).finish()
    }
}

impl<T: Poolable> Drop for Pooled<T> {
    fn drop(&mut self) {
        if !self.detached {
            self.pool.release(std::mem::take(&mut self.value));
        }
    }
}

/// Pools for both transport representations, scoped to one gateway
#[derive(Debug, Clone)]
pub struct TransportPools {
    /// Request pool
    pub requests: Arc<ObjectPool<TransportRequest>>,
    /// Response pool
    pub responses: Arc<ObjectPool<TransportResponse>>,
}

impl TransportPools {
    /// Create both pools with the same sizing
    pub fn new(prewarm: usize, max_idle: usize) -> Self {
        Self {
            requests: ObjectPool::new(prewarm, max_idle),
            responses: ObjectPool::new(prewarm, max_idle),
        }
    }
}

impl Default for TransportPools {
    fn default() -> Self {
        Self::new(0, 64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_resets_request() {
        let pool = ObjectPool::<TransportRequest>::new(0, 4);

        {
            let mut request = pool.acquire();
            request.headers.insert("X".into(), "1".into());
            request.query.insert("q".into(), "v".into());
            request.path_params.insert("id".into(), "7".into());
            request.method.push_str("POST");
            request.body.extend_from_slice(b"payload");
        }

        let request = pool.acquire();
        assert_eq!(request.headers.len(), 0);
        assert!(request.query.is_empty());
        assert!(request.path_params.is_empty());
        assert!(request.method.is_empty());
        assert!(request.body.is_empty());
        assert_eq!(pool.stats().reused, 1);
    }

    #[test]
    fn test_release_resets_response_status() {
        let pool = ObjectPool::<TransportResponse>::new(1, 1);
        {
            let mut response = pool.acquire();
            response.status_code = 503;
            response.set_header("Retry-After", "1");
        }
        let response = pool.acquire();
        assert_eq!(response.status_code, 0);
        assert!(response.headers.is_empty());
    }

    #[test]
    fn test_full_pool_discards() {
        let pool = ObjectPool::<TransportResponse>::new(0, 1);
        let a = pool.acquire();
        let b = pool.acquire();
        drop(a);
        drop(b);

        let stats = pool.stats();
        assert_eq!(stats.allocated, 2);
        assert_eq!(stats.released, 1);
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.idle, 1);
    }

    #[test]
    fn test_into_inner_skips_release() {
        let pool = ObjectPool::<TransportRequest>::new(0, 2);
        let request = pool.acquire().into_inner();
        assert!(request.headers.is_empty());
        assert_eq!(pool.stats().released, 0);
        assert_eq!(pool.stats().idle, 0);
    }

    #[test]
    fn test_prewarm_capped_by_capacity() {
        let pool = ObjectPool::<TransportRequest>::new(10, 3);
        assert_eq!(pool.stats().idle, 3);
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let pool = ObjectPool::<TransportRequest>::new(4, 8);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let mut request = pool.acquire();
                        assert!(request.headers.is_empty());
                        request.set_header("X-Thread", i.to_string());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = pool.stats();
        assert_eq!(stats.reused + stats.allocated, 800);
        assert_eq!(stats.released + stats.discarded, 800);
    }
}
