//! Template environment backed by Tera.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tera::{Tera, Value};
use tracing::debug;

use crate::error::TemplateError;
use crate::theme::loader::{MemoryLoader, TemplateLoader};

/// A template filter, as Tera calls it.
pub type FilterFn =
    Arc<dyn Fn(&Value, &HashMap<String, Value>) -> tera::Result<Value> + Send + Sync>;

/// Loader plus filter registry; compiled into a [`Tera`] instance on demand.
pub struct TemplateEnv {
    loader: Box<dyn TemplateLoader>,
    filters: BTreeMap<String, FilterFn>,
}

impl TemplateEnv {
    pub fn new(loader: impl TemplateLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            filters: BTreeMap::new(),
        }
    }

    /// An environment without templates.
    pub fn empty() -> Self {
        Self::new(MemoryLoader::new())
    }

    pub fn loader(&self) -> &dyn TemplateLoader {
        self.loader.as_ref()
    }

    pub fn set_loader(&mut self, loader: impl TemplateLoader + 'static) {
        self.loader = Box::new(loader);
    }

    /// Replace the loader with one built around the current loader.
    pub fn wrap_loader<F>(&mut self, wrap: F)
    where
        F: FnOnce(Box<dyn TemplateLoader>) -> Box<dyn TemplateLoader>,
    {
        let current = std::mem::replace(&mut self.loader, Box::new(MemoryLoader::new()));
        self.loader = wrap(current);
    }

    /// Register `filter` under `name`, replacing any previous one.
    pub fn register_filter<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(&Value, &HashMap<String, Value>) -> tera::Result<Value> + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), Arc::new(filter));
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Load every template from the loader and register the filters.
    pub fn compile(&self) -> Result<Tera, TemplateError> {
        let sources: Vec<(String, String)> = self
            .loader
            .list_templates()
            .into_iter()
            .filter_map(|name| self.loader.get_source(&name).map(|source| (name, source)))
            .collect();

        let mut tera = Tera::default();
        tera.add_raw_templates(sources)?;

        for (name, filter) in &self.filters {
            let filter = Arc::clone(filter);
            tera.register_filter(
                name,
                move |value: &Value, args: &HashMap<String, Value>| filter(value, args),
            );
        }

        debug!(
            templates = tera.get_template_names().count(),
            filters = self.filters.len(),
            "Templates compiled"
        );
        Ok(tera)
    }

    /// Compile and render a single template.
    pub fn render(&self, name: &str, context: &tera::Context) -> Result<String, TemplateError> {
        Ok(self.compile()?.render(name, context)?)
    }
}

impl Default for TemplateEnv {
    fn default() -> Self {
        Self::empty()
    }
}
