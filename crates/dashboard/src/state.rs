//! Application state shared across handlers.

use std::sync::Arc;

use stockroom_core::CollectionName;

use crate::backend::{self, BackendError, Backends, DocumentStore, IdentityProvider};
use crate::config::DashboardConfig;
use crate::services::{AuthService, ProfileEditor, SessionGate, UnseenCounter, UserAdminService};

/// Application state shared across all handlers.
///
/// Cheap to clone; everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: DashboardConfig,
    backends: Backends,
}

impl AppState {
    /// Create state over already-connected backends.
    #[must_use]
    pub fn new(config: DashboardConfig, backends: Backends) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, backends }),
        }
    }

    /// Connect the backend named in the configuration and build the state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend client cannot be constructed.
    pub fn from_config(config: DashboardConfig) -> Result<Self, BackendError> {
        let backends = backend::connect(&config.backend)?;
        Ok(Self::new(config, backends))
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    /// Collections with unseen-item counters.
    #[must_use]
    pub fn tracked_collections(&self) -> &[CollectionName] {
        &self.inner.config.tracked_collections
    }

    fn identity(&self) -> &dyn IdentityProvider {
        self.inner.backends.identity.as_ref()
    }

    fn store(&self) -> &dyn DocumentStore {
        self.inner.backends.store.as_ref()
    }

    /// The backend handles, for readiness checks.
    #[must_use]
    pub fn backends(&self) -> &Backends {
        &self.inner.backends
    }

    #[must_use]
    pub fn gate(&self) -> SessionGate<'_> {
        SessionGate::new(self.identity(), self.store())
    }

    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(self.identity(), self.store())
    }

    #[must_use]
    pub fn profile_editor(&self) -> ProfileEditor<'_> {
        ProfileEditor::new(self.identity(), self.store())
    }

    #[must_use]
    pub fn unseen_counter(&self) -> UnseenCounter<'_> {
        UnseenCounter::new(self.store(), self.tracked_collections())
    }

    #[must_use]
    pub fn user_admin(&self) -> UserAdminService<'_> {
        UserAdminService::new(self.identity(), self.store())
    }
}
