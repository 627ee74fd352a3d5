//! Deferred results.
//!
//! A [`Deferred`] is a one-shot handle to an eventual value or failure. It comes
//! in two flavours that differ only in when work starts:
//!
//! - [`ColdDeferred`] holds the computation itself. Nothing runs until the
//!   result is driven (`wait`, `on_complete`, `detach`), and every drive runs the
//!   computation again. Results derived with `map`/`catching` wrap the same
//!   computation, so awaiting two derived results runs it twice.
//! - [`StagedDeferred`] is what [`ColdDeferred::stage`] returns: the computation
//!   has been submitted exactly once and every consumer reads the same
//!   completion.
//!
//! Staging is the "start now, collect later" step used to run several results
//! side by side before waiting on any of them.

use crate::core::executor::{default_executor, Executor};
use crate::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::oneshot;

type Computation<T> = Arc<dyn Fn() -> Result<T> + Send + Sync>;
type Callback<T> = Box<dyn FnOnce(Result<T>) + Send>;

/// Run `f`, turning a panic into [`Error::Panicked`].
pub(crate) fn settle<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| Err(Error::Panicked(panic_message(payload))))
}

/// Run a completion callback, containing a panic so later callbacks still run.
fn run_callback<T>(callback: impl FnOnce(Result<T>), result: Result<T>) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(move || callback(result))) {
        tracing::warn!("Completion callback panicked: {}", panic_message(payload));
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn log_failure<T>(result: Result<T>) {
    if let Err(e) = result {
        tracing::warn!("Detached computation failed: {}", e);
    }
}

// ========== COLD ==========

/// A deferred computation that has not been started.
pub struct ColdDeferred<T> {
    run: Computation<T>,
    executor: Arc<dyn Executor>,
}

impl<T> Clone for ColdDeferred<T> {
    fn clone(&self) -> Self {
        Self {
            run: Arc::clone(&self.run),
            executor: Arc::clone(&self.executor),
        }
    }
}

impl<T: Clone + Send + 'static> ColdDeferred<T> {
    pub fn new<F>(run: F, executor: Arc<dyn Executor>) -> Self
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        Self {
            run: Arc::new(run),
            executor,
        }
    }

    fn derive<U, F>(&self, f: F) -> ColdDeferred<U>
    where
        F: Fn(Result<T>) -> Result<U> + Send + Sync + 'static,
    {
        let run = Arc::clone(&self.run);
        ColdDeferred {
            run: Arc::new(move || f(run())),
            executor: Arc::clone(&self.executor),
        }
    }

    /// Run the computation on the calling thread and return its outcome.
    pub fn wait(&self) -> Result<T> {
        (self.run)()
    }

    /// Run the computation on the executor and hand its outcome to `callback`
    /// on that worker.
    pub fn on_complete<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let run = Arc::clone(&self.run);
        self.executor
            .execute(Box::new(move || run_callback(callback, settle(|| run()))))
    }

    /// Run the computation on the executor without waiting for it.
    ///
    /// A failure is logged, never dropped silently.
    pub fn detach(&self) -> Result<()> {
        self.on_complete(log_failure)
    }

    pub fn map<U, F>(&self, f: F) -> ColdDeferred<U>
    where
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.derive(move |result| result.map(&f))
    }

    pub fn and_then<U, F>(&self, f: F) -> ColdDeferred<U>
    where
        F: Fn(T) -> Result<U> + Send + Sync + 'static,
    {
        self.derive(move |result| result.and_then(&f))
    }

    /// Substitute `f(error)` for a failure; values pass through unchanged.
    pub fn catching<F>(&self, f: F) -> ColdDeferred<T>
    where
        F: Fn(Error) -> T + Send + Sync + 'static,
    {
        self.derive(move |result| Ok(result.unwrap_or_else(&f)))
    }

    pub fn consume<F>(&self, f: F) -> ColdDeferred<()>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.derive(move |result| result.map(&f))
    }

    /// Submit the computation to the executor now.
    pub fn stage(self) -> StagedDeferred<T> {
        let completion = Completion::new();
        let target = Arc::clone(&completion);
        let run = self.run;

        let submitted = self
            .executor
            .execute(Box::new(move || target.complete(settle(|| run()))));
        if let Err(e) = submitted {
            completion.complete(Err(e));
        }
        tracing::debug!("Staged deferred computation");

        StagedDeferred {
            completion,
            executor: self.executor,
        }
    }
}

// ========== STAGED ==========

enum State<T> {
    Pending(Vec<Callback<T>>),
    Done(Result<T>),
}

/// Shared completion slot of a staged computation.
struct Completion<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

impl<T: Clone + Send + 'static> Completion<T> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::Pending(Vec::new())),
            ready: Condvar::new(),
        })
    }

    /// Record the outcome and run every waiting callback on this thread.
    /// Only the first outcome counts.
    fn complete(&self, result: Result<T>) {
        let callbacks = {
            let mut state = self.state.lock();
            match &mut *state {
                State::Done(_) => return,
                State::Pending(callbacks) => {
                    let callbacks = std::mem::take(callbacks);
                    *state = State::Done(result.clone());
                    callbacks
                }
            }
        };
        self.ready.notify_all();

        for callback in callbacks {
            run_callback(callback, result.clone());
        }
    }

    fn wait(&self) -> Result<T> {
        let mut state = self.state.lock();
        loop {
            if let State::Done(result) = &*state {
                return result.clone();
            }
            self.ready.wait(&mut state);
        }
    }

    /// Queue `callback` for completion, or hand it back with the outcome if the
    /// computation already finished.
    fn subscribe(&self, callback: Callback<T>) -> Option<(Callback<T>, Result<T>)> {
        let mut state = self.state.lock();
        match &mut *state {
            State::Pending(callbacks) => {
                callbacks.push(callback);
                None
            }
            State::Done(result) => Some((callback, result.clone())),
        }
    }

    fn is_done(&self) -> bool {
        matches!(&*self.state.lock(), State::Done(_))
    }
}

/// A computation that has been submitted once; all consumers share its outcome.
pub struct StagedDeferred<T> {
    completion: Arc<Completion<T>>,
    executor: Arc<dyn Executor>,
}

impl<T> Clone for StagedDeferred<T> {
    fn clone(&self) -> Self {
        Self {
            completion: Arc::clone(&self.completion),
            executor: Arc::clone(&self.executor),
        }
    }
}

impl<T: Clone + Send + 'static> StagedDeferred<T> {
    /// Run `callback` when the outcome is known: on the completing worker, or
    /// right here if it is already known.
    fn chain(&self, callback: Callback<T>) {
        if let Some((callback, result)) = self.completion.subscribe(callback) {
            run_callback(callback, result);
        }
    }

    fn derive<U, F>(&self, f: F) -> StagedDeferred<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Result<T>) -> Result<U> + Send + 'static,
    {
        let derived = Completion::new();
        let target = Arc::clone(&derived);
        self.chain(Box::new(move |result| {
            target.complete(settle(|| f(result)));
        }));
        StagedDeferred {
            completion: derived,
            executor: Arc::clone(&self.executor),
        }
    }

    /// Block until the shared computation finishes.
    pub fn wait(&self) -> Result<T> {
        self.completion.wait()
    }

    /// Hand the outcome to `callback` on a worker thread.
    pub fn on_complete<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        match self.completion.subscribe(Box::new(callback)) {
            None => Ok(()),
            Some((callback, result)) => self
                .executor
                .execute(Box::new(move || run_callback(callback, result))),
        }
    }

    /// The computation is already running; only make sure a failure gets logged.
    pub fn detach(&self) -> Result<()> {
        self.on_complete(log_failure)
    }

    pub fn map<U, F>(&self, f: F) -> StagedDeferred<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.derive(move |result| result.map(f))
    }

    pub fn and_then<U, F>(&self, f: F) -> StagedDeferred<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        self.derive(move |result| result.and_then(f))
    }

    /// Substitute `f(error)` for a failure; values pass through unchanged.
    pub fn catching<F>(&self, f: F) -> StagedDeferred<T>
    where
        F: FnOnce(Error) -> T + Send + 'static,
    {
        self.derive(move |result| Ok(result.unwrap_or_else(f)))
    }

    pub fn consume<F>(&self, f: F) -> StagedDeferred<()>
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.derive(move |result| result.map(f))
    }

    pub fn is_complete(&self) -> bool {
        self.completion.is_done()
    }
}

// ========== EITHER ==========

/// A deferred result, either not yet started or already staged.
pub enum Deferred<T> {
    Cold(ColdDeferred<T>),
    Staged(StagedDeferred<T>),
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        match self {
            Deferred::Cold(c) => Deferred::Cold(c.clone()),
            Deferred::Staged(s) => Deferred::Staged(s.clone()),
        }
    }
}

impl<T> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Deferred::Cold(_) => write!(f, "Deferred::Cold<{}>", std::any::type_name::<T>()),
            Deferred::Staged(_) => write!(f, "Deferred::Staged<{}>", std::any::type_name::<T>()),
        }
    }
}

impl<T: Clone + Send + 'static> Deferred<T> {
    /// A cold result running `run` on the default executor when driven
    /// asynchronously.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        Self::with_executor(run, default_executor())
    }

    pub fn with_executor<F>(run: F, executor: Arc<dyn Executor>) -> Self
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        Deferred::Cold(ColdDeferred::new(run, executor))
    }

    pub fn is_staged(&self) -> bool {
        matches!(self, Deferred::Staged(_))
    }

    /// Block until the value is available. A failure comes back unchanged.
    pub fn wait(&self) -> Result<T> {
        match self {
            Deferred::Cold(c) => c.wait(),
            Deferred::Staged(s) => s.wait(),
        }
    }

    /// Deliver the outcome to `callback` on a worker thread; returns at once.
    pub fn on_complete<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        match self {
            Deferred::Cold(c) => c.on_complete(callback),
            Deferred::Staged(s) => s.on_complete(callback),
        }
    }

    /// Start (or keep running) the computation without waiting for it.
    pub fn detach(&self) -> Result<()> {
        match self {
            Deferred::Cold(c) => c.detach(),
            Deferred::Staged(s) => s.detach(),
        }
    }

    pub fn map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        match self {
            Deferred::Cold(c) => Deferred::Cold(c.map(f)),
            Deferred::Staged(s) => Deferred::Staged(s.map(f)),
        }
    }

    pub fn and_then<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + 'static,
        F: Fn(T) -> Result<U> + Send + Sync + 'static,
    {
        match self {
            Deferred::Cold(c) => Deferred::Cold(c.and_then(f)),
            Deferred::Staged(s) => Deferred::Staged(s.and_then(f)),
        }
    }

    /// Recover from a failure with `f(error)`. There is no retry: to try again,
    /// dispatch the action again.
    pub fn catching<F>(&self, f: F) -> Deferred<T>
    where
        F: Fn(Error) -> T + Send + Sync + 'static,
    {
        match self {
            Deferred::Cold(c) => Deferred::Cold(c.catching(f)),
            Deferred::Staged(s) => Deferred::Staged(s.catching(f)),
        }
    }

    pub fn consume<F>(&self, f: F) -> Deferred<()>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        match self {
            Deferred::Cold(c) => Deferred::Cold(c.consume(f)),
            Deferred::Staged(s) => Deferred::Staged(s.consume(f)),
        }
    }

    /// Start the computation now. Staging an already staged result is a
    /// programming error and fails with [`Error::AlreadyStaged`].
    pub fn stage(self) -> Result<Deferred<T>> {
        match self {
            Deferred::Cold(c) => Ok(Deferred::Staged(c.stage())),
            Deferred::Staged(_) => Err(Error::AlreadyStaged),
        }
    }

    /// Bridge into async code.
    ///
    /// The computation still runs on the executor, not on the async runtime.
    pub fn into_future(self) -> impl Future<Output = Result<T>> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        let submitted = self.on_complete(move |result| {
            // The receiver may have been dropped by a cancelled caller.
            let _ = tx.send(result);
        });

        async move {
            submitted?;
            rx.await.map_err(|_| Error::WorkerLost)?
        }
    }
}

impl<T> From<ColdDeferred<T>> for Deferred<T> {
    fn from(cold: ColdDeferred<T>) -> Self {
        Deferred::Cold(cold)
    }
}

impl<T> From<StagedDeferred<T>> for Deferred<T> {
    fn from(staged: StagedDeferred<T>) -> Self {
        Deferred::Staged(staged)
    }
}
