//! Fake resources.

use crate::registry::PluginClass;
use crate::resources::{Resource, ResourceCategory};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A resource whose runtime validation always fails.
#[derive(Debug)]
pub struct FailingResource {
    name: String,
    category: ResourceCategory,
    validations: AtomicU32,
}

impl FailingResource {
    /// Creates a failing resource in the default category.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: ResourceCategory::Default,
            validations: AtomicU32::new(0),
        }
    }

    /// Sets the breaker category.
    #[must_use]
    pub fn with_category(mut self, category: ResourceCategory) -> Self {
        self.category = category;
        self
    }

    /// Returns how many times validation ran.
    #[must_use]
    pub fn validation_count(&self) -> u32 {
        self.validations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resource for FailingResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ResourceCategory {
        self.category
    }

    async fn validate_runtime(&self) -> anyhow::Result<()> {
        let n = self.validations.fetch_add(1, Ordering::SeqCst) + 1;
        anyhow::bail!("connection refused (attempt {n})")
    }
}

/// A class building [`FailingResource`]s.
#[must_use]
pub fn failing_resource_class(id: &str) -> PluginClass {
    PluginClass::resource(id, |setup| Ok(Arc::new(FailingResource::new(&setup.name))))
}
