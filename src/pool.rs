use crate::error::{Error, Result};
use crate::guard::Guard;
use crate::resource::Factory;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout_at, Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

/// Fixed interval between idle-age sweeps of the reaper task.
pub const REAP_INTERVAL: Duration = Duration::from_secs(5);

/// Tuning knobs fixed at pool construction.
#[derive(Clone, Copy, Debug)]
pub struct PoolConfig {
    /// Ceiling on concurrently-live resources, idle and checked out combined.
    pub max_count: usize,
    /// How long [`Pool::acquire`] waits for a resource before failing.
    pub acquire_timeout: Duration,
    /// Idle resources older than this are evicted by the reaper.
    pub max_idle_age: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_count: 20,
            acquire_timeout: Duration::from_secs(3),
            max_idle_age: Duration::from_secs(300),
        }
    }
}

/// A point-in-time snapshot of the pool's accounting.
#[derive(Clone, Copy, Debug)]
pub struct PoolStatus {
    pub idle: usize,
    pub busy: usize,
    pub max: usize,
}

/// Bounded, thread-safe pool of reusable resources.
///
/// Resources are pre-created up to `max_count` at construction and handed
/// out most-recently-idled first. When the pool is exhausted, `acquire`
/// suspends the caller until a resource is released or the timeout elapses.
/// A background reaper evicts idle resources older than `max_idle_age`.
pub struct Pool<F: Factory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: Factory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F: Factory> Pool<F> {
    /// Builds a pool filled to capacity and starts its reaper.
    ///
    /// Every resource is created eagerly; the first creation failure
    /// destroys the resources created so far and propagates.
    pub async fn new(factory: F, config: PoolConfig) -> Result<Self> {
        let mut created = Vec::with_capacity(config.max_count);
        for _ in 0..config.max_count {
            match factory.create().await {
                Ok(resource) => created.push(resource),
                Err(err) => {
                    warn!(
                        created = created.len(),
                        "pool construction failed, destroying partial set"
                    );
                    for resource in created {
                        factory.destroy(resource);
                    }
                    return Err(Error::CreationFailed(err.into()));
                }
            }
        }
        let now = Instant::now();
        let inner = Arc::new(PoolInner {
            factory,
            state: Mutex::new(PoolState {
                idle: created
                    .into_iter()
                    .map(|resource| IdleEntry {
                        resource,
                        idled_at: now,
                    })
                    .collect(),
                busy: 0,
                max: config.max_count,
            }),
            notify: Notify::new(),
            acquire_timeout: config.acquire_timeout,
            max_idle_age: config.max_idle_age,
            reaper: Mutex::new(None),
        });
        // anchor the sweep schedule to construction time, not to the
        // reaper task's first poll
        let mut ticker = interval(REAP_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        *inner.reaper.lock() = Some(spawn_reaper(&inner, ticker));
        debug!(max = config.max_count, "pool started");
        Ok(Self { inner })
    }

    /// [`Pool::new`] with the default timeouts.
    pub async fn with_capacity(factory: F, max_count: usize) -> Result<Self> {
        Self::new(
            factory,
            PoolConfig {
                max_count,
                ..PoolConfig::default()
            },
        )
        .await
    }

    /// Checks out a resource, suspending until one is available or the
    /// acquire timeout elapses.
    ///
    /// An idle resource is reused if present (most recently idled first);
    /// otherwise one is created if the pool is under capacity. The ceiling
    /// is never exceeded: a slot is reserved before the factory runs and
    /// given back if creation fails.
    pub async fn acquire(&self) -> Result<Guard<F>> {
        let inner = &self.inner;
        let deadline = Instant::now() + inner.acquire_timeout;
        loop {
            match inner.try_grab() {
                Grab::Idle(resource) => {
                    return Ok(Guard::new(resource, Arc::downgrade(inner)));
                }
                Grab::Reserved => {
                    return match inner.factory.create().await {
                        Ok(resource) => Ok(Guard::new(resource, Arc::downgrade(inner))),
                        Err(err) => {
                            inner.forfeit_slot();
                            Err(Error::CreationFailed(err.into()))
                        }
                    };
                }
                Grab::Exhausted => {
                    if timeout_at(deadline, inner.notify.notified()).await.is_err() {
                        return Err(Error::AcquireTimeout);
                    }
                }
            }
        }
    }

    /// Resizes the pool ceiling.
    ///
    /// If the new ceiling is below the current total, idle resources are
    /// evicted newest-first until the idle set fits (busy resources are
    /// never touched; they are destroyed on release instead of re-idled if
    /// still over the ceiling then). If the idle set ends up below its
    /// target, it is refilled eagerly rather than on demand.
    pub async fn set_capacity(&self, new_max: usize) -> Result<()> {
        let inner = &self.inner;
        let target = {
            let mut state = inner.state.lock();
            let old_max = state.max;
            state.max = new_max;
            let target = idle_target(state.idle.len(), state.busy, new_max);
            let mut evicted = 0;
            while state.idle.len() > target {
                if let Some(entry) = state.idle.pop_back() {
                    inner.factory.destroy(entry.resource);
                    evicted += 1;
                }
            }
            debug!(old_max, new_max, evicted, "pool resized");
            target
        };
        loop {
            {
                let state = inner.state.lock();
                if state.idle.len() >= target || state.idle.len() + state.busy >= state.max {
                    break;
                }
            }
            let resource = match inner.factory.create().await {
                Ok(resource) => resource,
                Err(err) => return Err(Error::CreationFailed(err.into())),
            };
            let mut state = inner.state.lock();
            if state.idle.len() + state.busy < state.max {
                state.idle.push_back(IdleEntry {
                    resource,
                    idled_at: Instant::now(),
                });
            } else {
                // lost a race against a concurrent shrink
                inner.factory.destroy(resource);
            }
        }
        inner.notify.notify_waiters();
        inner.notify.notify_one();
        Ok(())
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        PoolStatus {
            idle: state.idle.len(),
            busy: state.busy,
            max: state.max,
        }
    }

    pub fn factory(&self) -> &F {
        &self.inner.factory
    }
}

fn idle_target(idle: usize, busy: usize, new_max: usize) -> usize {
    if idle + busy > new_max {
        new_max.saturating_sub(busy)
    } else {
        idle
    }
}

struct IdleEntry<T> {
    resource: T,
    idled_at: Instant,
}

struct PoolState<T> {
    idle: VecDeque<IdleEntry<T>>,
    busy: usize,
    max: usize,
}

enum Grab<T> {
    Idle(T),
    Reserved,
    Exhausted,
}

pub(crate) struct PoolInner<F: Factory> {
    factory: F,
    state: Mutex<PoolState<F::Resource>>,
    notify: Notify,
    acquire_timeout: Duration,
    max_idle_age: Duration,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl<F: Factory> PoolInner<F> {
    /// Takes an idle resource or reserves a busy slot for a fresh one.
    /// Leaves a wakeup behind whenever another waiter could also proceed,
    /// so chained releases do not strand waiters.
    fn try_grab(&self) -> Grab<F::Resource> {
        let mut state = self.state.lock();
        if let Some(entry) = state.idle.pop_back() {
            state.busy += 1;
            if !state.idle.is_empty() || state.idle.len() + state.busy < state.max {
                self.notify.notify_one();
            }
            return Grab::Idle(entry.resource);
        }
        if state.idle.len() + state.busy < state.max {
            state.busy += 1;
            if state.idle.len() + state.busy < state.max {
                self.notify.notify_one();
            }
            return Grab::Reserved;
        }
        Grab::Exhausted
    }

    /// Gives back a slot reserved by [`try_grab`](Self::try_grab) when the
    /// factory failed to fill it.
    fn forfeit_slot(&self) {
        {
            let mut state = self.state.lock();
            state.busy -= 1;
        }
        self.notify.notify_one();
    }

    /// Returns a checked-out resource. Non-discarded resources re-idle with
    /// a fresh timestamp unless the pool has shrunk below them; everything
    /// else is destroyed. Wakes one waiter either way.
    pub(crate) fn release(&self, resource: F::Resource, discard: bool) {
        {
            let mut state = self.state.lock();
            state.busy -= 1;
            if !discard && state.idle.len() + state.busy < state.max {
                state.idle.push_back(IdleEntry {
                    resource,
                    idled_at: Instant::now(),
                });
            } else {
                trace!(discard, "destroying resource on release");
                self.factory.destroy(resource);
            }
        }
        self.notify.notify_one();
    }

    /// Swaps a checked-out resource for a freshly created one, reusing its
    /// busy slot so the accounting never drifts. If creation fails the slot
    /// is released and the caller is left holding nothing.
    pub(crate) async fn replace(&self, old: F::Resource) -> Result<F::Resource> {
        self.factory.destroy(old);
        match self.factory.create().await {
            Ok(fresh) => Ok(fresh),
            Err(err) => {
                self.forfeit_slot();
                Err(Error::CreationFailed(err.into()))
            }
        }
    }

    pub(crate) async fn validate(&self, resource: &F::Resource) -> bool {
        self.factory.validate(resource).await
    }

    /// One reaper sweep: evict idle entries older than `max_idle_age`,
    /// oldest first, but never the most recently idled entry, so a sweep
    /// can never fully drain a pool that holds a single resource.
    fn reap(&self) {
        let now = Instant::now();
        let mut state = self.state.lock();
        if state.idle.is_empty() || state.idle.len() + state.busy <= 1 {
            return;
        }
        let mut evicted = 0;
        while state.idle.len() > 1 {
            match state.idle.front() {
                Some(entry) if now.duration_since(entry.idled_at) >= self.max_idle_age => {
                    if let Some(entry) = state.idle.pop_front() {
                        self.factory.destroy(entry.resource);
                        evicted += 1;
                    }
                }
                _ => break,
            }
        }
        if evicted > 0 {
            trace!(evicted, idle = state.idle.len(), "reaped stale idle resources");
        }
    }
}

impl<F: Factory> Drop for PoolInner<F> {
    fn drop(&mut self) {
        if let Some(handle) = self.reaper.lock().take() {
            handle.abort();
        }
        let state = self.state.get_mut();
        debug!(idle = state.idle.len(), busy = state.busy, "tearing down pool");
        for entry in state.idle.drain(..) {
            self.factory.destroy(entry.resource);
        }
    }
}

fn spawn_reaper<F: Factory>(
    inner: &Arc<PoolInner<F>>,
    mut ticker: tokio::time::Interval,
) -> JoinHandle<()> {
    let weak = Arc::downgrade(inner);
    tokio::spawn(async move {
        ticker.tick().await; // the first tick fires immediately
        loop {
            ticker.tick().await;
            match weak.upgrade() {
                Some(inner) => inner.reap(),
                None => break,
            }
        }
    })
}
