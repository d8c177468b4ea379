//! Process-wide named-stack locks.

use crate::errors::{ProvisionError, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;
use uuid::Uuid;

/// One entry per stack name currently being driven by this process.
#[derive(Debug, Clone, Default)]
pub struct StackLockRegistry {
    held: Arc<DashMap<String, Uuid>>,
}

static GLOBAL: OnceLock<StackLockRegistry> = OnceLock::new();

impl StackLockRegistry {
    /// Creates an isolated registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the registry shared by the whole process.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL.get_or_init(Self::new).clone()
    }

    /// Takes the lock for `stack_name`.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` immediately if the name is already held.
    pub fn acquire(&self, stack_name: &str) -> Result<StackLockGuard> {
        match self.held.entry(stack_name.to_string()) {
            Entry::Occupied(held) => Err(ProvisionError::conflict(
                stack_name,
                format!("a convergence is already in progress in this process (holder {})", held.get()),
            )),
            Entry::Vacant(slot) => {
                let holder = Uuid::new_v4();
                slot.insert(holder);
                debug!(stack_name, %holder, "Stack lock acquired");
                Ok(StackLockGuard {
                    held: Arc::clone(&self.held),
                    stack_name: stack_name.to_string(),
                    holder,
                })
            }
        }
    }

    /// Returns true if the name is held.
    #[must_use]
    pub fn is_held(&self, stack_name: &str) -> bool {
        self.held.contains_key(stack_name)
    }
}

/// Releases its stack name when dropped.
#[derive(Debug)]
pub struct StackLockGuard {
    held: Arc<DashMap<String, Uuid>>,
    stack_name: String,
    holder: Uuid,
}

impl StackLockGuard {
    /// Returns the locked stack name.
    #[must_use]
    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }
}

impl Drop for StackLockGuard {
    fn drop(&mut self) {
        let holder = self.holder;
        self.held.remove_if(&self.stack_name, |_, current| *current == holder);
        debug!(stack_name = %self.stack_name, %holder, "Stack lock released");
    }
}
