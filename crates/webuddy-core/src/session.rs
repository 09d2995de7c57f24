#![forbid(unsafe_code)]

//! Session-scoped flags.
//!
//! The only persisted state is whether the welcome sequence has completed in
//! the current browser session. Browsers back this with `sessionStorage`;
//! tests and the harness use [`MemorySession`].

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// Key recording that the welcome sequence has completed.
pub const WELCOME_SESSION_KEY: &str = "webuddy_welcome_complete";

/// Boolean flags that live for one browser session.
pub trait SessionStore {
    fn flag(&self, key: &str) -> bool;
    fn set_flag(&mut self, key: &str);
}

/// In-memory session. Clones share the same flags, the way every instance
/// in one tab shares `sessionStorage`.
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    flags: Rc<RefCell<HashSet<String>>>,
}

impl MemorySession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of flags set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.borrow().is_empty()
    }
}

impl SessionStore for MemorySession {
    fn flag(&self, key: &str) -> bool {
        self.flags.borrow().contains(key)
    }

    fn set_flag(&mut self, key: &str) {
        self.flags.borrow_mut().insert(key.to_string());
    }
}
