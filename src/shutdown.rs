//! Cooperative shutdown.
//!
//! The publishing loops only ever observe a [`CancellationToken`]. Turning OS
//! signals into a cancelled token is the job of [`SignalGuard`], which the
//! binaries install after the connection is up and which restores the default
//! signal dispositions when dropped.

use log::{debug, warn};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag: written by the signal adapter (or a test), read
/// by the loop once per iteration.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        !self.is_cancelled()
    }
}

#[cfg(unix)]
const SHUTDOWN_SIGNALS: &[libc::c_int] = &[
    signal_hook::consts::SIGTERM,
    signal_hook::consts::SIGINT,
    signal_hook::consts::SIGQUIT,
    signal_hook::consts::SIGHUP,
];

#[cfg(not(unix))]
const SHUTDOWN_SIGNALS: &[libc::c_int] = &[signal_hook::consts::SIGTERM, signal_hook::consts::SIGINT];

/// Cancels a token on SIGTERM, SIGINT, SIGQUIT or SIGHUP for as long as it lives.
pub struct SignalGuard {
    registered: Vec<(libc::c_int, signal_hook::SigId)>,
}

impl SignalGuard {
    pub fn install(token: &CancellationToken) -> io::Result<Self> {
        let mut guard = SignalGuard {
            registered: Vec::with_capacity(SHUTDOWN_SIGNALS.len()),
        };
        for &signal in SHUTDOWN_SIGNALS {
            // on error the partially filled guard is dropped and restores what it holds
            let id = signal_hook::flag::register(signal, Arc::clone(&token.cancelled))?;
            guard.registered.push((signal, id));
        }
        debug!("Installed handlers for signals {:?}", SHUTDOWN_SIGNALS);
        Ok(guard)
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        for (signal, id) in self.registered.drain(..).rev() {
            if !signal_hook::low_level::unregister(id) {
                warn!("Signal handler for {signal} was already removed");
            }
            // SAFETY: signal() with SIG_DFL requires:
            // - `signal` is a valid signal number (taken from SHUTDOWN_SIGNALS)
            // - no handler of ours can run afterwards, the action was unregistered above
            // Restoring the default disposition is async-signal-safe
            let previous = unsafe { libc::signal(signal, libc::SIG_DFL) };
            if previous == libc::SIG_ERR {
                warn!(
                    "Failed to restore default disposition of signal {signal}: {}",
                    io::Error::last_os_error()
                );
            }
        }
        debug!("Restored default signal dispositions");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_clones_share_state() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert!(observer.is_running());
        token.cancel();
        assert!(observer.is_cancelled());
        assert!(!observer.is_running());
    }

    #[cfg(unix)]
    #[test]
    fn test_signal_cancels_token_while_guard_lives() {
        let token = CancellationToken::new();
        let guard = SignalGuard::install(&token).unwrap();
        signal_hook::low_level::raise(signal_hook::consts::SIGHUP).unwrap();
        assert!(token.is_cancelled());
        drop(guard);
    }
}
