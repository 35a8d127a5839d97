//! Single-threaded readiness multiplexer with an idle timer.
//!
//! Callbacks registered for fd readability run when their descriptor becomes
//! readable; idle callbacks run whenever a full timeout passes with nothing to
//! read. A callback's return value decides whether it stays registered, so a
//! reader that detects end-of-session simply returns `false` and the loop
//! winds down once no descriptor remains, with no separate shutdown flag.
//!
//! Level-triggered `poll(2)` underneath; Unix only.

#![cfg(unix)]

use std::collections::BTreeMap;
use std::os::fd::RawFd;

/// Event callback. Returns `true` to stay registered for future events,
/// `false` to be dropped from the multiplexer.
pub type Handler = Box<dyn FnMut() -> bool>;

/// Waits for fd readability or an idle deadline and calls registered handlers.
pub struct FileEventDispatcher {
    idle_ms: u32,
    /// Keyed by fd; cycle order follows fd order.
    read_handlers: BTreeMap<RawFd, Handler>,
    idle_handlers: Vec<Handler>,
}

impl FileEventDispatcher {
    /// Create a dispatcher whose idle handlers fire after `idle_ms` of quiet.
    pub fn new(idle_ms: u32) -> Self {
        Self {
            idle_ms,
            read_handlers: BTreeMap::new(),
            idle_handlers: Vec::new(),
        }
    }

    /// Register `handler` to run whenever `fd` is readable.
    /// Returns `false` if the descriptor is already registered.
    ///
    /// Registration happens before [`run`](Self::run); handlers deregister
    /// themselves by returning `false`.
    pub fn run_on_readable(&mut self, fd: RawFd, handler: impl FnMut() -> bool + 'static) -> bool {
        use std::collections::btree_map::Entry;
        match self.read_handlers.entry(fd) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Box::new(handler));
                true
            }
        }
    }

    /// Register `handler` to run each time the loop goes idle.
    pub fn run_on_idle(&mut self, handler: impl FnMut() -> bool + 'static) {
        self.idle_handlers.push(Box::new(handler));
    }

    /// Run until no readable descriptor remains registered or a cycle
    /// signals stop.
    pub fn run(&mut self) {
        while self.single_cycle(self.idle_ms) {}
    }

    /// One wait-and-dispatch round; broken out so unit tests can single-step.
    ///
    /// Exactly one of these happens:
    /// 1. ready descriptors had their handlers called once each,
    /// 2. the timeout expired and every idle handler ran once,
    /// 3. the wait failed or was interrupted, which returns `false`.
    ///
    /// Also returns `false` once no descriptor is registered: descriptors are
    /// only added before the loop starts, so none can re-appear.
    pub fn single_cycle(&mut self, timeout_ms: u32) -> bool {
        let mut poll_fds: Vec<libc::pollfd> = self
            .read_handlers
            .keys()
            .map(|&fd| libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();
        if poll_fds.is_empty() {
            return false;
        }

        let ready = unsafe {
            libc::poll(
                poll_fds.as_mut_ptr(),
                poll_fds.len() as libc::nfds_t,
                timeout_ms as i32,
            )
        };
        if ready < 0 {
            tracing::warn!(
                error = %std::io::Error::last_os_error(),
                "poll failed, stopping event loop"
            );
            return false;
        }

        if ready == 0 {
            // Timeout: nothing to read anywhere, run the idle chain.
            self.idle_handlers.retain_mut(|handler| handler());
            return true;
        }

        for poll_fd in &poll_fds {
            // HUP/ERR drain through the read handler so it observes EOF.
            if poll_fd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) == 0 {
                continue;
            }
            let keep = match self.read_handlers.get_mut(&poll_fd.fd) {
                Some(handler) => handler(),
                None => continue,
            };
            if !keep {
                self.read_handlers.remove(&poll_fd.fd);
            }
        }
        true
    }
}
