//! Ordered exit-time hooks.
//!
//! Every way a process can end (returning normally, an uncaught panic, a
//! termination signal) funnels into [`ShutdownHooks::run`]. Hooks in the
//! [`HookPhase::Terminal`] phase run after all [`HookPhase::Normal`] hooks,
//! which is where the coverage flush lives.
//!
//! Normal hooks run at most once. Terminal hooks stay registered and run on
//! every trigger: a panic hook also fires for panics that are caught or that
//! only end a worker thread, so the flush must still happen again at the
//! real end of the process.

use crate::result::CovResult;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Hook = Arc<dyn Fn() -> CovResult<()> + Send + Sync>;

/// When a hook runs relative to the others
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookPhase {
    /// Ordinary cleanup, in registration order, run once
    Normal,
    /// After every normal hook, on every trigger
    Terminal,
}

#[derive(Default)]
struct Registry {
    normal: Vec<Hook>,
    terminal: Vec<Hook>,
}

/// Shared registry of exit hooks
#[derive(Clone, Default)]
pub struct ShutdownHooks {
    inner: Arc<Mutex<Registry>>,
}

impl std::fmt::Debug for ShutdownHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.lock();
        f.debug_struct("ShutdownHooks")
            .field("normal", &registry.normal.len())
            .field("terminal", &registry.terminal.len())
            .finish()
    }
}

impl ShutdownHooks {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a hook to `phase`
    pub fn register<F>(&self, phase: HookPhase, hook: F)
    where
        F: Fn() -> CovResult<()> + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        match phase {
            HookPhase::Normal => registry.normal.push(Arc::new(hook)),
            HookPhase::Terminal => registry.terminal.push(Arc::new(hook)),
        }
    }

    /// Number of hooks that the next [`run`](Self::run) would call
    #[must_use]
    pub fn pending(&self) -> usize {
        let registry = self.lock();
        registry.normal.len() + registry.terminal.len()
    }

    /// Run pending normal hooks, discarding them, then every terminal hook.
    ///
    /// All hooks run even if one fails; the first error is returned and the
    /// rest are logged. Hooks run outside the registry lock, so a hook may
    /// register further hooks.
    pub fn run(&self) -> CovResult<()> {
        let (normal, terminal) = {
            let mut registry = self.lock();
            (std::mem::take(&mut registry.normal), registry.terminal.clone())
        };

        let mut first_error = None;
        for hook in normal.iter().chain(&terminal) {
            if let Err(e) = hook() {
                if first_error.is_none() {
                    first_error = Some(e);
                } else {
                    tracing::error!(error = %e, "shutdown hook failed");
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn run_logged(&self, trigger: &str) {
        if let Err(e) = self.run() {
            tracing::error!(trigger, error = %e, "shutdown hooks failed");
        }
    }
}

/// Runs the hooks when dropped, covering a graceful return from `main`
#[derive(Debug)]
#[must_use = "dropping the guard runs the shutdown hooks immediately"]
pub struct ShutdownGuard {
    hooks: ShutdownHooks,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.hooks.run_logged("exit");
    }
}

/// Wire `hooks` to every exit path of the process.
///
/// Installs a panic hook that chains to the previous one and, on unix,
/// blocks SIGINT, SIGTERM and SIGHUP on the calling thread and waits for
/// them on a dedicated thread, which runs the hooks and exits with
/// `128 + signo`. Call this from the main thread before spawning others so
/// they inherit the signal mask.
pub fn install_exit_triggers(hooks: &ShutdownHooks) -> CovResult<ShutdownGuard> {
    let on_panic = hooks.clone();
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        previous(info);
        on_panic.run_logged("panic");
    }));

    #[cfg(unix)]
    signals::spawn_waiter(hooks.clone())?;

    Ok(ShutdownGuard {
        hooks: hooks.clone(),
    })
}

#[cfg(unix)]
mod signals {
    use super::ShutdownHooks;
    use crate::result::{CovError, CovResult};
    use nix::sys::signal::{SigSet, Signal};

    const TERMINATING: [Signal; 3] = [Signal::SIGINT, Signal::SIGTERM, Signal::SIGHUP];

    pub(super) fn spawn_waiter(hooks: ShutdownHooks) -> CovResult<()> {
        let mut set = SigSet::empty();
        for signal in TERMINATING {
            set.add(signal);
        }
        set.thread_block()
            .map_err(|e| CovError::runtime("signals", format!("cannot block signals: {e}")))?;

        std::thread::Builder::new()
            .name("covstash-signals".to_string())
            .spawn(move || match set.wait() {
                Ok(signal) => {
                    tracing::info!(signal = %signal, "terminating on signal");
                    hooks.run_logged(signal.as_str());
                    std::process::exit(128 + signal as i32);
                }
                Err(e) => tracing::error!(error = %e, "signal wait failed"),
            })?;
        Ok(())
    }
}
