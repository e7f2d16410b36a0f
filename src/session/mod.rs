//! Lifecycle management for one expensive external handle.
//!
//! A plugin process owns at most one live session (e.g. an open browser).
//! The manager creates it lazily on first use, hands out shared references
//! while an idle timer has not elapsed, and tears it down on idle timeout
//! or explicit shutdown. Concurrent creation attempts collapse to a single
//! instance, and a teardown in progress makes concurrent `acquire` calls
//! wait and concurrent `release` calls no-op: the `closing` flag is checked
//! before both paths, so there is no double-close and no use-after-close.
//! The idle timer defers while the handle is still held by an in-flight
//! operation; it only destroys a handle nobody is using.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::PluginResult;

/// How long a waiter sleeps while a teardown is in progress.
const TEARDOWN_POLL: Duration = Duration::from_millis(5);

/// Creates and destroys the external handle.
#[async_trait]
pub trait SessionFactory: Send + Sync + 'static {
    type Handle: Send + Sync + 'static;

    async fn create(&self) -> PluginResult<Self::Handle>;
    async fn destroy(&self, handle: &Self::Handle) -> PluginResult<()>;
}

struct State<H> {
    handle: Option<Arc<H>>,
    /// Bumped on every acquire and teardown; an idle timer armed for an
    /// older epoch is stale and must not fire.
    epoch: u64,
    /// Teardown-in-progress flag.
    closing: bool,
}

struct Inner<F: SessionFactory> {
    factory: F,
    idle_timeout: Duration,
    state: Mutex<State<F::Handle>>,
}

/// Owner of the single lazily-created session handle.
pub struct SessionManager<F: SessionFactory> {
    inner: Arc<Inner<F>>,
}

impl<F: SessionFactory> Clone for SessionManager<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: SessionFactory> SessionManager<F> {
    pub fn new(factory: F, idle_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                factory,
                idle_timeout,
                state: Mutex::new(State {
                    handle: None,
                    epoch: 0,
                    closing: false,
                }),
            }),
        }
    }

    /// Return the live handle, creating one if none exists.
    ///
    /// Idempotent: two sequential calls within the idle window return the
    /// same instance. Every successful call resets the idle timer. The
    /// creation happens while the state lock is held, so concurrent callers
    /// cannot race a second session into existence.
    pub async fn acquire(&self) -> PluginResult<Arc<F::Handle>> {
        loop {
            let mut state = self.inner.state.lock().await;
            if state.closing {
                drop(state);
                tokio::time::sleep(TEARDOWN_POLL).await;
                continue;
            }

            let handle = match state.handle.as_ref() {
                Some(existing) => Arc::clone(existing),
                None => {
                    let created = Arc::new(self.inner.factory.create().await?);
                    state.handle = Some(Arc::clone(&created));
                    tracing::info!("session handle created");
                    created
                }
            };
            state.epoch += 1;
            let epoch = state.epoch;
            drop(state);

            self.arm_idle_timer(epoch);
            return Ok(handle);
        }
    }

    /// Tear down the handle if one is live. Idempotent; a call racing an
    /// in-progress teardown is a no-op.
    pub async fn release(&self) {
        Inner::teardown(&self.inner, None).await;
    }

    /// Whether a handle currently exists.
    pub async fn is_live(&self) -> bool {
        self.inner.state.lock().await.handle.is_some()
    }

    fn arm_idle_timer(&self, epoch: u64) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(inner.idle_timeout).await;
                if Inner::teardown(&inner, Some(epoch)).await {
                    return;
                }
            }
        });
    }
}

impl<F: SessionFactory> Inner<F> {
    /// Take and destroy the handle. With `expected_epoch` set this is an
    /// idle-timer expiry: it only proceeds when no acquire has happened
    /// since the timer was armed AND the handle has no outstanding user.
    /// A handle whose operation is still mid-flight must never be closed
    /// out from under that operation.
    ///
    /// Returns `true` when the caller's timer is finished (torn down,
    /// stale, or nothing to do) and `false` when the handle was still in
    /// use and the timer should re-arm.
    async fn teardown(inner: &Arc<Self>, expected_epoch: Option<u64>) -> bool {
        let taken = {
            let mut state = inner.state.lock().await;
            if state.closing {
                return true;
            }
            if let Some(expected) = expected_epoch {
                if state.epoch != expected {
                    return true;
                }
                if let Some(handle) = state.handle.as_ref() {
                    if Arc::strong_count(handle) > 1 {
                        tracing::debug!("session handle still in use, deferring idle teardown");
                        return false;
                    }
                }
            }
            match state.handle.take() {
                Some(handle) => {
                    state.closing = true;
                    state.epoch += 1;
                    handle
                }
                None => return true,
            }
        };

        if expected_epoch.is_some() {
            tracing::debug!("idle timeout elapsed, destroying session handle");
        }
        if let Err(err) = inner.factory.destroy(&taken).await {
            tracing::warn!(error = %err, "session teardown failed");
        } else {
            tracing::info!("session handle destroyed");
        }
        inner.state.lock().await.closing = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::error::PluginError;

    #[derive(Debug)]
    struct TestHandle {
        serial: u64,
    }

    #[derive(Default)]
    struct CountingFactory {
        created: Arc<AtomicU64>,
        destroyed: Arc<AtomicU64>,
        create_delay: Duration,
        fail_create: bool,
    }

    #[async_trait]
    impl SessionFactory for CountingFactory {
        type Handle = TestHandle;

        async fn create(&self) -> PluginResult<TestHandle> {
            if self.fail_create {
                return Err(PluginError::Session("factory offline".to_string()));
            }
            if !self.create_delay.is_zero() {
                tokio::time::sleep(self.create_delay).await;
            }
            let serial = self.created.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(TestHandle { serial })
        }

        async fn destroy(&self, _handle: &TestHandle) -> PluginResult<()> {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    const IDLE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_acquire_within_idle_window_reuses_handle() {
        let created = Arc::new(AtomicU64::new(0));
        let factory = CountingFactory {
            created: Arc::clone(&created),
            ..CountingFactory::default()
        };
        let manager = SessionManager::new(factory, IDLE);

        let first = manager.acquire().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        let second = manager.acquire().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_after_idle_timeout_creates_fresh_handle() {
        let created = Arc::new(AtomicU64::new(0));
        let destroyed = Arc::new(AtomicU64::new(0));
        let factory = CountingFactory {
            created: Arc::clone(&created),
            destroyed: Arc::clone(&destroyed),
            ..CountingFactory::default()
        };
        let manager = SessionManager::new(factory, IDLE);

        let first = manager.acquire().await.unwrap();
        assert_eq!(first.serial, 1);
        drop(first);

        tokio::time::sleep(IDLE + Duration::from_secs(1)).await;
        assert!(!manager.is_live().await);

        let second = manager.acquire().await.unwrap();
        assert_eq!(second.serial, 2);
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_teardown_defers_while_handle_is_held() {
        let destroyed = Arc::new(AtomicU64::new(0));
        let factory = CountingFactory {
            destroyed: Arc::clone(&destroyed),
            ..CountingFactory::default()
        };
        let manager = SessionManager::new(factory, IDLE);

        // Simulates an external call that outlives the idle window: the
        // handle stays held across two full expiries.
        let held = manager.acquire().await.unwrap();
        tokio::time::sleep(IDLE * 2).await;
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);
        assert!(manager.is_live().await);

        // Once the operation finishes, the deferred timer may collect it.
        drop(held);
        tokio::time::sleep(IDLE + Duration::from_secs(1)).await;
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert!(!manager.is_live().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_keeps_resetting_idle_timer() {
        let destroyed = Arc::new(AtomicU64::new(0));
        let factory = CountingFactory {
            destroyed: Arc::clone(&destroyed),
            ..CountingFactory::default()
        };
        let manager = SessionManager::new(factory, IDLE);

        let first = manager.acquire().await.unwrap();
        tokio::time::sleep(Duration::from_secs(40)).await;
        let second = manager.acquire().await.unwrap();
        // 80s since the first acquire but only 40s since the second; the
        // stale timer from the first acquire must not fire.
        tokio::time::sleep(Duration::from_secs(40)).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert!(manager.is_live().await);
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquires_collapse_to_one_session() {
        let created = Arc::new(AtomicU64::new(0));
        let factory = CountingFactory {
            created: Arc::clone(&created),
            create_delay: Duration::from_millis(50),
            ..CountingFactory::default()
        };
        let manager = SessionManager::new(factory, IDLE);

        let (a, b) = tokio::join!(manager.acquire(), manager.acquire());
        let (a, b) = (a.unwrap(), b.unwrap());

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_is_idempotent() {
        let destroyed = Arc::new(AtomicU64::new(0));
        let factory = CountingFactory {
            destroyed: Arc::clone(&destroyed),
            ..CountingFactory::default()
        };
        let manager = SessionManager::new(factory, IDLE);

        let _ = manager.acquire().await.unwrap();
        manager.release().await;
        manager.release().await;

        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert!(!manager.is_live().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_without_session_is_a_noop() {
        let destroyed = Arc::new(AtomicU64::new(0));
        let factory = CountingFactory {
            destroyed: Arc::clone(&destroyed),
            ..CountingFactory::default()
        };
        let manager = SessionManager::new(factory, IDLE);

        manager.release().await;
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_failure_surfaces_and_allows_retry() {
        let manager = SessionManager::new(
            CountingFactory {
                fail_create: true,
                ..CountingFactory::default()
            },
            IDLE,
        );

        assert!(manager.acquire().await.is_err());
        assert!(!manager.is_live().await);
        // A second attempt hits the factory again rather than a poisoned state.
        assert!(manager.acquire().await.is_err());
    }
}
