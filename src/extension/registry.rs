//! Extension registry of an application.

use std::sync::Arc;

use crate::error::InitError;
use crate::extension::{AppExtension, EXTENSION_NAME};
use crate::observability::toolbar::{DebugToolbar, TOOLBAR_NAME};

/// Extensions attached to an [`App`](crate::http::App).
///
/// Each slot is assigned at most once; a second registration fails with
/// [`InitError::AlreadyRegistered`] and leaves the first value in place.
#[derive(Default)]
pub struct Extensions {
    app: Option<Arc<AppExtension>>,
    debug_toolbar: Option<Arc<dyn DebugToolbar>>,
}

impl Extensions {
    /// The extension registered under [`EXTENSION_NAME`].
    pub fn app(&self) -> Option<&Arc<AppExtension>> {
        self.app.as_ref()
    }

    pub fn register_app(&mut self, extension: Arc<AppExtension>) -> Result<(), InitError> {
        if self.app.is_some() {
            return Err(InitError::AlreadyRegistered(EXTENSION_NAME));
        }
        self.app = Some(extension);
        Ok(())
    }

    pub fn debug_toolbar(&self) -> Option<&Arc<dyn DebugToolbar>> {
        self.debug_toolbar.as_ref()
    }

    pub fn register_debug_toolbar(&mut self, toolbar: Arc<dyn DebugToolbar>) -> Result<(), InitError> {
        if self.debug_toolbar.is_some() {
            return Err(InitError::AlreadyRegistered(TOOLBAR_NAME));
        }
        self.debug_toolbar = Some(toolbar);
        Ok(())
    }
}
