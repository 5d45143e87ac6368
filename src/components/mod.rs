//! Component registry consumed by the dispatcher.
//!
//! The health-check framework that evaluates components lives outside this
//! crate; the session only needs to look components up by name and ask them
//! for their current states, events and metrics. [`StaticRegistry`] is an
//! ordered in-memory registry used by the binary and by tests.

pub mod agent;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::health::{Event, HealthState, Metric};
use crate::{AppError, Result};

/// Boxed future returned by collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A health-checked unit of the node (GPU, disk, CPU, ...).
pub trait Component: Send + Sync {
    /// Registered component name.
    fn name(&self) -> &str;

    /// Current health states.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the dispatcher logs the error and reports an
    /// empty entry for this component.
    fn states(&self) -> BoxFuture<'_, Result<Vec<HealthState>>>;

    /// Events recorded at or after `since`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NoData`] when nothing has been recorded; other
    /// errors are implementation-defined.
    fn events(&self, since: DateTime<Utc>) -> BoxFuture<'_, Result<Vec<Event>>>;

    /// Metric samples recorded at or after `since`.
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn metrics(&self, since: DateTime<Utc>) -> BoxFuture<'_, Result<Vec<Metric>>>;
}

/// Lookup of components by name.
pub trait ComponentRegistry: Send + Sync {
    /// Names of every registered component, in registration order.
    fn names(&self) -> Vec<String>;

    /// Look up a component by name.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no component is registered under
    /// `name`.
    fn get_component(&self, name: &str) -> Result<Arc<dyn Component>>;
}

/// Fixed, ordered set of components.
#[derive(Default, Clone)]
pub struct StaticRegistry {
    components: Vec<Arc<dyn Component>>,
}

impl StaticRegistry {
    /// Build a registry from components in registration order.
    ///
    /// A later component with a duplicate name is ignored.
    #[must_use]
    pub fn new(components: Vec<Arc<dyn Component>>) -> Self {
        let mut registry = Self::default();
        for component in components {
            registry.register(component);
        }
        registry
    }

    /// Append a component unless its name is already taken.
    ///
    /// Returns `false` when a component with the same name exists.
    pub fn register(&mut self, component: Arc<dyn Component>) -> bool {
        if self.components.iter().any(|c| c.name() == component.name()) {
            return false;
        }
        self.components.push(component);
        true
    }
}

impl ComponentRegistry for StaticRegistry {
    fn names(&self) -> Vec<String> {
        self.components.iter().map(|c| c.name().to_owned()).collect()
    }

    fn get_component(&self, name: &str) -> Result<Arc<dyn Component>> {
        self.components
            .iter()
            .find(|c| c.name() == name)
            .map(Arc::clone)
            .ok_or_else(|| AppError::NotFound(format!("component {name} is not registered")))
    }
}
