//! Process-wide initialization and teardown
//!
//! A small idempotent bracket around the engine: `init` must run before any
//! session is opened, `shutdown` refuses while sessions are live. Live
//! sessions are counted so tests (and callers) can assert everything was
//! released.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

static INITIALIZED: AtomicBool = AtomicBool::new(false);
static LIVE_SESSIONS: AtomicUsize = AtomicUsize::new(0);

/// Initialize the engine. Idempotent; must precede any session open.
pub fn init() -> Result<()> {
    if !INITIALIZED.swap(true, Ordering::SeqCst) {
        debug!("playhead engine initialized");
    }
    Ok(())
}

/// Tear the engine down. Refuses while sessions are still open.
pub fn shutdown() -> Result<()> {
    if !INITIALIZED.load(Ordering::SeqCst) {
        return Ok(());
    }
    let live = LIVE_SESSIONS.load(Ordering::SeqCst);
    if live > 0 {
        return Err(Error::InvalidState(format!(
            "cannot shut down with {} session(s) still open",
            live
        )));
    }
    INITIALIZED.store(false, Ordering::SeqCst);
    debug!("playhead engine shut down");
    Ok(())
}

/// Number of sessions currently open.
pub fn live_sessions() -> usize {
    LIVE_SESSIONS.load(Ordering::SeqCst)
}

pub(crate) fn ensure_init() -> Result<()> {
    if INITIALIZED.load(Ordering::SeqCst) {
        Ok(())
    } else {
        Err(Error::InvalidState(
            "engine not initialized: call playhead::init() first".to_string(),
        ))
    }
}

pub(crate) fn register_session() {
    LIVE_SESSIONS.fetch_add(1, Ordering::SeqCst);
}

pub(crate) fn unregister_session() {
    let previous = LIVE_SESSIONS.fetch_sub(1, Ordering::SeqCst);
    debug_assert!(previous > 0, "session accounting underflow");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init().unwrap();
        init().unwrap();
        assert!(ensure_init().is_ok());
    }

    #[test]
    fn shutdown_refuses_live_sessions() {
        init().unwrap();
        register_session();
        assert!(shutdown().is_err());
        unregister_session();
        // Leave the engine initialized for other tests in this process.
        init().unwrap();
    }
}
