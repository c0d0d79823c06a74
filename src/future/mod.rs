//! Single-assignment awaitable result used to coordinate asynchronous
//! callers of entry operations.
//!
//! [`FutureAdapter`] can be completed exactly once, by value, by error, or
//! by cancellation. A fast-path [`AtomicU8`] tag lets [`FutureAdapter::
//! listen`] and the terminal check inside [`FutureAdapter::get`] avoid
//! taking the inner lock once the result is in; the lock only guards the
//! (rarely contended) waiter/listener bookkeeping and the one-time write of
//! the terminal value, mirroring the spin-then-park shape used by
//! [`crate::candidate`]'s owner and by the teacher's own commit notifier
//! (`Arc<(Mutex<bool>, Condvar)>` in its group-commit loop).

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::CacheError;

const PENDING: u8 = 0;
const TERMINAL: u8 = 1;

type Notifier = Arc<(Mutex<bool>, Condvar)>;

struct Inner<T> {
    terminal: Option<Result<T, CacheError>>,
    waiters: Vec<Notifier>,
    listeners: Vec<Box<dyn FnOnce(Result<T, CacheError>) + Send>>,
}

impl<T> Default for Inner<T> {
    fn default() -> Self {
        Self {
            terminal: None,
            waiters: Vec::new(),
            listeners: Vec::new(),
        }
    }
}

/// A result that can be assigned exactly once and awaited by any number of
/// parked threads or registered listeners.
pub struct FutureAdapter<T> {
    state: Arc<AtomicU8>,
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for FutureAdapter<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> FutureAdapter<T> {
    /// Creates a new, unresolved future.
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(PENDING)),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// `true` iff this future has reached a terminal state.
    pub fn is_done(&self) -> bool {
        self.state.load(Ordering::Acquire) == TERMINAL
    }

    /// Completes the future with a value. Returns `true` iff this call
    /// performed the transition.
    pub fn on_done(&self, value: T) -> bool {
        self.complete(Ok(value))
    }

    /// Completes the future with an error. Returns `true` iff this call
    /// performed the transition.
    pub fn on_error(&self, error: CacheError) -> bool {
        self.complete(Err(error))
    }

    /// Completes the future with the `CANCELLED` sentinel. Returns `true`
    /// iff this call performed the transition.
    pub fn on_cancelled(&self) -> bool {
        self.complete(Err(CacheError::Cancelled))
    }

    fn complete(&self, result: Result<T, CacheError>) -> bool {
        if self
            .state
            .compare_exchange(PENDING, TERMINAL, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let (listeners, waiters) = {
            let mut guard = self.inner.lock();
            guard.terminal = Some(result.clone());
            (
                std::mem::take(&mut guard.listeners),
                std::mem::take(&mut guard.waiters),
            )
        };
        // LIFO: the state is conceptually a stack of wait-nodes, so the
        // most recently registered listener/waiter is notified first.
        for listener in listeners.into_iter().rev() {
            listener(result.clone());
        }
        for notifier in waiters.into_iter().rev() {
            let (lock, cvar) = &*notifier;
            let mut signaled = lock.lock();
            *signaled = true;
            cvar.notify_all();
        }
        true
    }

    fn peek(&self) -> Option<Result<T, CacheError>> {
        if self.state.load(Ordering::Acquire) != TERMINAL {
            return None;
        }
        self.inner.lock().terminal.clone()
    }

    /// Registers `cb` to run when the future completes. If already
    /// terminal, `cb` runs synchronously on the calling thread before this
    /// call returns.
    pub fn listen<F>(&self, cb: F)
    where
        F: FnOnce(Result<T, CacheError>) + Send + 'static,
    {
        if let Some(result) = self.peek() {
            cb(result);
            return;
        }
        let mut guard = self.inner.lock();
        if let Some(result) = guard.terminal.clone() {
            drop(guard);
            cb(result);
            return;
        }
        guard.listeners.push(Box::new(cb));
    }

    /// Blocks the calling thread until the future completes, with no
    /// timeout and no interrupt handling.
    pub fn get(&self) -> Result<T, CacheError> {
        self.get_opts(None, None, false)
    }

    /// Blocks the calling thread until the future completes or `timeout`
    /// elapses, whichever comes first.
    pub fn get_timeout(&self, timeout: Duration) -> Result<T, CacheError> {
        self.get_opts(Some(timeout), None, false)
    }

    /// Full-control wait: optional timeout and an optional
    /// [`InterruptFlag`] honoring `ignore_interrupts`. When
    /// `ignore_interrupts` is set and `interrupt` fires mid-wait, the
    /// interrupt is deferred (the wait continues) and re-asserted on
    /// `interrupt` once this call returns, rather than aborting the wait.
    pub fn get_opts(
        &self,
        timeout: Option<Duration>,
        interrupt: Option<&InterruptFlag>,
        ignore_interrupts: bool,
    ) -> Result<T, CacheError> {
        if let Some(result) = self.peek() {
            return result;
        }
        let notifier = {
            let mut guard = self.inner.lock();
            if let Some(result) = guard.terminal.clone() {
                return result;
            }
            let notifier: Notifier = Arc::new((Mutex::new(false), Condvar::new()));
            guard.waiters.push(notifier.clone());
            notifier
        };

        let (lock, cvar) = &*notifier;
        let mut signaled = lock.lock();
        let deadline = timeout.map(|d| Instant::now() + d);
        let mut deferred_interrupt = false;
        const POLL_SLICE: Duration = Duration::from_millis(10);

        loop {
            if *signaled {
                break;
            }
            if let Some(flag) = interrupt {
                if flag.is_interrupted() {
                    if ignore_interrupts {
                        flag.clear();
                        deferred_interrupt = true;
                    } else {
                        return Err(CacheError::Interrupted);
                    }
                }
            }
            let slice = match deadline {
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        return Err(CacheError::Timeout);
                    }
                    POLL_SLICE.min(d - now)
                }
                None => POLL_SLICE,
            };
            cvar.wait_for(&mut signaled, slice);
        }
        drop(signaled);

        if deferred_interrupt {
            if let Some(flag) = interrupt {
                flag.interrupt();
            }
        }
        self.peek().expect("terminal state set before waking waiters")
    }

    /// Produces a new future resolved by applying `map` to this future's
    /// terminal result, invoked inline on the completer's thread.
    pub fn chain<U, F>(&self, map: F) -> FutureAdapter<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Result<T, CacheError>) -> Result<U, CacheError> + Send + 'static,
    {
        self.chain_on(map, Arc::new(InlineExecutor))
    }

    /// Like [`FutureAdapter::chain`], but runs `map` on the given
    /// executor instead of inline on the completer's thread.
    pub fn chain_on<U, F>(&self, map: F, executor: Arc<dyn Executor>) -> FutureAdapter<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Result<T, CacheError>) -> Result<U, CacheError> + Send + 'static,
    {
        let target = FutureAdapter::<U>::new();
        let target_for_listener = target.clone();
        self.listen(move |result| {
            executor.execute(Box::new(move || match map(result) {
                Ok(value) => {
                    target_for_listener.on_done(value);
                }
                Err(err) => {
                    target_for_listener.on_error(err);
                }
            }));
        });
        target
    }
}

impl<T: Clone + Send + 'static> Default for FutureAdapter<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a future-adapter chain callback. `InlineExecutor` runs it
/// synchronously; other implementations may hand it to a thread pool.
pub trait Executor: Send + Sync {
    /// Runs `job` according to the executor's scheduling policy.
    fn execute(&self, job: Box<dyn FnOnce() + Send>);
}

/// Runs chain callbacks synchronously on the completer's thread — the
/// default scheduling policy per component C.
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, job: Box<dyn FnOnce() + Send>) {
        job();
    }
}

/// Runs each chain callback on a dedicated OS thread, for callers that
/// must not block the completer.
pub struct ThreadExecutor;

impl Executor for ThreadExecutor {
    fn execute(&self, job: Box<dyn FnOnce() + Send>) {
        std::thread::spawn(job);
    }
}

/// A pollable stand-in for a cooperative thread-interrupt signal.
///
/// Rust has no native `Thread::interrupt`; callers that need the
/// `ignore_interrupts` semantics of [`FutureAdapter::get_opts`] create one
/// of these, hand the waiting side a reference, and call
/// [`InterruptFlag::interrupt`] from whichever side wants to wake (or mark)
/// the waiter.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<std::sync::atomic::AtomicBool>);

impl InterruptFlag {
    /// Creates a new, non-interrupted flag.
    pub fn new() -> Self {
        Self(Arc::new(std::sync::atomic::AtomicBool::new(false)))
    }

    /// Sets the interrupted flag.
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// `true` iff the flag is currently set.
    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears and returns the previous value of the flag.
    pub fn clear(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn on_done_delivers_to_later_get() {
        let f = FutureAdapter::new();
        f.on_done(42);
        assert_eq!(f.get().unwrap(), 42);
    }

    #[test]
    fn second_on_done_is_ignored_and_preserves_first_value() {
        let f = FutureAdapter::new();
        assert!(f.on_done("first".to_string()));
        assert!(!f.on_done("second".to_string()));
        assert_eq!(f.get().unwrap(), "first");
    }

    #[test]
    fn listen_after_completion_runs_synchronously() {
        let f = FutureAdapter::new();
        f.on_done(7);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        f.listen(move |r| {
            seen2.store(r.unwrap(), Ordering::SeqCst);
        });
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn get_blocks_until_completed_from_another_thread() {
        let f: FutureAdapter<i32> = FutureAdapter::new();
        let producer = f.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.on_done(99);
        });
        assert_eq!(f.get().unwrap(), 99);
        handle.join().unwrap();
    }

    #[test]
    fn get_timeout_raises_timeout_without_affecting_other_waiters() {
        let f: FutureAdapter<i32> = FutureAdapter::new();
        let err = f.get_timeout(Duration::from_millis(20));
        assert!(matches!(err, Err(CacheError::Timeout)));
        f.on_done(5);
        assert_eq!(f.get().unwrap(), 5);
    }

    #[test]
    fn on_cancelled_raises_cancelled_to_waiters() {
        let f: FutureAdapter<i32> = FutureAdapter::new();
        f.on_cancelled();
        assert!(matches!(f.get(), Err(CacheError::Cancelled)));
    }

    #[test]
    fn chain_maps_terminal_value() {
        let f: FutureAdapter<String> = FutureAdapter::new();
        let g = f.chain(|r| r.map(|s| format!("{s}!")));
        f.on_done("ok".to_string());
        assert_eq!(g.get().unwrap(), "ok!");
        assert!(!f.on_done("x".to_string()));
        assert_eq!(g.get().unwrap(), "ok!");
    }

    #[test]
    fn ignore_interrupts_defers_and_reasserts() {
        let f: FutureAdapter<i32> = FutureAdapter::new();
        let flag = InterruptFlag::new();
        flag.interrupt();
        let producer = f.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            producer.on_done(1);
        });
        let result = f.get_opts(None, Some(&flag), true);
        assert_eq!(result.unwrap(), 1);
        assert!(flag.is_interrupted(), "interrupt must be re-asserted on return");
        handle.join().unwrap();
    }

    #[test]
    fn interrupts_without_ignore_abort_the_wait() {
        let f: FutureAdapter<i32> = FutureAdapter::new();
        let flag = InterruptFlag::new();
        flag.interrupt();
        let result = f.get_opts(None, Some(&flag), false);
        assert!(matches!(result, Err(CacheError::Interrupted)));
    }
}
