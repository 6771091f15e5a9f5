//! Template sources.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

/// Where template sources come from.
pub trait TemplateLoader: Send + Sync {
    /// Source of the template called `name`, if this loader has it.
    fn get_source(&self, name: &str) -> Option<String>;

    /// Names of every template this loader can serve.
    fn list_templates(&self) -> Vec<String>;
}

/// Templates read from a directory tree; names are `/`-separated paths
/// relative to the root.
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    root: PathBuf,
}

impl FileSystemLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collect(&self, dir: &Path, names: &mut Vec<String>) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cannot read template directory");
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                self.collect(&path, names);
            } else if let Ok(relative) = path.strip_prefix(&self.root) {
                let name: Vec<_> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                names.push(name.join("/"));
            }
        }
    }
}

impl TemplateLoader for FileSystemLoader {
    fn get_source(&self, name: &str) -> Option<String> {
        let relative = Path::new(name);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            debug!(name, "Rejected template name outside the template root");
            return None;
        }
        fs::read_to_string(self.root.join(relative)).ok()
    }

    fn list_templates(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect(&self.root, &mut names);
        names.sort();
        names
    }
}

/// Templates held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    templates: BTreeMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(name.into(), source.into());
    }
}

impl TemplateLoader for MemoryLoader {
    fn get_source(&self, name: &str) -> Option<String> {
        self.templates.get(name).cloned()
    }

    fn list_templates(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }
}

/// Wraps another loader, preferring `"{theme}/{name}"` for each theme in
/// order before falling back to `name` itself.
pub struct ThemeLoader {
    themes: Vec<String>,
    inner: Box<dyn TemplateLoader>,
}

impl ThemeLoader {
    pub fn new(themes: Vec<String>, inner: Box<dyn TemplateLoader>) -> Self {
        Self { themes, inner }
    }

    pub fn themes(&self) -> &[String] {
        &self.themes
    }
}

impl TemplateLoader for ThemeLoader {
    fn get_source(&self, name: &str) -> Option<String> {
        self.themes
            .iter()
            .find_map(|theme| self.inner.get_source(&format!("{theme}/{name}")))
            .or_else(|| self.inner.get_source(name))
    }

    fn list_templates(&self) -> Vec<String> {
        self.inner.list_templates()
    }
}
