/*
 * global.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of DavKit, a WebDAV client library.
 *
 * DavKit is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * DavKit is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with DavKit.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Process-wide transport setup, reference counted.
//!
//! The first `global_init` builds the runtime that drives all socket I/O; the
//! matching last `global_shutdown` drops it. Sessions hold a `GlobalGuard`, so
//! the runtime outlives every network session.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::{Builder, Runtime};

use crate::error::DavError;

struct GlobalState {
    count: usize,
    runtime: Option<Arc<Runtime>>,
}

static STATE: Mutex<GlobalState> = Mutex::new(GlobalState {
    count: 0,
    runtime: None,
});

fn lock_state() -> MutexGuard<'static, GlobalState> {
    // A panic while holding the lock cannot leave the counter half-updated.
    STATE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn build_runtime() -> Result<Runtime, DavError> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| DavError::other(format!("failed to initialize transport runtime: {}", e)))
}

fn acquire() -> Result<Arc<Runtime>, DavError> {
    let mut state = lock_state();
    let runtime = match &state.runtime {
        Some(rt) => rt.clone(),
        None => {
            let rt = Arc::new(build_runtime()?);
            tracing::debug!("transport runtime initialized");
            state.runtime = Some(rt.clone());
            rt
        }
    };
    state.count += 1;
    Ok(runtime)
}

fn release() {
    let mut state = lock_state();
    if state.count == 0 {
        return;
    }
    state.count -= 1;
    if state.count == 0 {
        // Runtime handles held elsewhere keep it alive until they drop.
        state.runtime = None;
        tracing::debug!("transport runtime shut down");
    }
}

/// Initialize the transport layer. Must be balanced by `global_shutdown`.
/// On failure the reference count is unchanged.
pub fn global_init() -> Result<(), DavError> {
    acquire().map(|_| ())
}

/// Release one `global_init` reference. Extra calls are ignored.
pub fn global_shutdown() {
    release();
}

/// Current number of outstanding references.
pub fn global_refcount() -> usize {
    lock_state().count
}

/// One counted reference to the transport runtime, released on drop.
pub struct GlobalGuard {
    runtime: Arc<Runtime>,
}

impl GlobalGuard {
    pub fn acquire() -> Result<Self, DavError> {
        Ok(Self { runtime: acquire()? })
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }
}

impl Drop for GlobalGuard {
    fn drop(&mut self) {
        release();
    }
}

impl std::fmt::Debug for GlobalGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GlobalGuard")
    }
}
