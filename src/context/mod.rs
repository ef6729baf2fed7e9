//! Shared application context.
//!
//! # Data Flow
//! ```text
//! ContextBuilder (created before the first module initializes)
//!     → Module::initialize attaches capabilities (cache, store, ...)
//!     → ContextBuilder::build freezes the set
//!     → Arc<Context> handed to every route and socket handler
//! ```
//!
//! # Design Decisions
//! - Capabilities are keyed by type, each also carries a name for diagnostics
//! - The capability set never changes after build; handlers only read it
//! - Each capability owns its internal concurrency (pools, multiplexed conns)

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::config::DeploymentMode;

/// Errors raised when attaching or resolving capabilities.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("capability {0:?} is already attached")]
    DuplicateCapability(String),

    #[error("capability {0:?} is not attached")]
    MissingCapability(&'static str),
}

struct Capability {
    name: String,
    handle: Arc<dyn Any + Send + Sync>,
}

/// Mutable view of the context used while modules initialize.
pub struct ContextBuilder {
    mode: DeploymentMode,
    capabilities: HashMap<TypeId, Capability>,
}

impl ContextBuilder {
    pub fn new(mode: DeploymentMode) -> Self {
        Self {
            mode,
            capabilities: HashMap::new(),
        }
    }

    /// Attach a capability. A type or name can only be attached once.
    pub fn insert<T>(&mut self, name: impl Into<String>, handle: T) -> Result<(), ContextError>
    where
        T: Any + Send + Sync,
    {
        let name = name.into();
        let type_id = TypeId::of::<T>();
        if self.capabilities.contains_key(&type_id)
            || self.capabilities.values().any(|c| c.name == name)
        {
            return Err(ContextError::DuplicateCapability(name));
        }

        tracing::debug!(capability = %name, "Capability attached");
        self.capabilities.insert(
            type_id,
            Capability {
                name,
                handle: Arc::new(handle),
            },
        );
        Ok(())
    }

    /// Read a capability attached by an earlier module.
    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        lookup(&self.capabilities)
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    /// Freeze the capability set.
    pub fn build(self) -> Context {
        Context {
            mode: self.mode,
            capabilities: self.capabilities,
        }
    }
}

/// Read-only bag of capabilities shared by every handler invocation.
pub struct Context {
    mode: DeploymentMode,
    capabilities: HashMap<TypeId, Capability>,
}

impl Context {
    pub fn builder(mode: DeploymentMode) -> ContextBuilder {
        ContextBuilder::new(mode)
    }

    /// Get a capability by type.
    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        lookup(&self.capabilities)
    }

    /// Get a capability by type, failing if no module attached it.
    pub fn require<T>(&self) -> Result<Arc<T>, ContextError>
    where
        T: Any + Send + Sync,
    {
        self.get::<T>()
            .ok_or(ContextError::MissingCapability(std::any::type_name::<T>()))
    }

    /// Names of all attached capabilities, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .capabilities
            .values()
            .map(|c| c.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("mode", &self.mode)
            .field("capabilities", &self.names())
            .finish()
    }
}

fn lookup<T>(capabilities: &HashMap<TypeId, Capability>) -> Option<Arc<T>>
where
    T: Any + Send + Sync,
{
    capabilities
        .get(&TypeId::of::<T>())
        .and_then(|c| Arc::clone(&c.handle).downcast::<T>().ok())
}
