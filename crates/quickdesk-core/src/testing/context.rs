//! A fully wired desk over in-memory services.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::NotificationsConfig;
use crate::function::{AuthContext, DeskServices, MutationContext, QueryContext, RequestMetadata};
use crate::model::Profile;
use crate::notify::Notifier;

use super::{MemoryObjectStore, MemoryStore, MockMailer};

/// In-memory store, object store and mailer behind one [`DeskServices`].
///
/// ```ignore
/// let desk = TestDesk::new();
/// let ann = desk.store.seed_profile("Ann", Role::EndUser);
/// let page = ListTickets::execute(&desk.query(&ann), Default::default()).await?;
/// ```
pub struct TestDesk {
    pub store: Arc<MemoryStore>,
    pub objects: Arc<MemoryObjectStore>,
    pub mailer: Arc<MockMailer>,
    services: Arc<DeskServices>,
}

impl Default for TestDesk {
    fn default() -> Self {
        Self::new()
    }
}

impl TestDesk {
    pub fn new() -> Self {
        Self::with_notifications(NotificationsConfig {
            app_base_url: "http://desk.test".into(),
            ..Default::default()
        })
    }

    pub fn with_notifications(config: NotificationsConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let objects = Arc::new(MemoryObjectStore::new());
        let mailer = Arc::new(MockMailer::new());
        let notifier = Notifier::new(store.clone(), mailer.clone(), &config);
        let services = Arc::new(DeskServices {
            store: store.clone(),
            objects: objects.clone(),
            notifier,
        });
        Self {
            store,
            objects,
            mailer,
            services,
        }
    }

    pub fn services(&self) -> Arc<DeskServices> {
        self.services.clone()
    }

    fn auth(viewer: &Profile) -> AuthContext {
        AuthContext::authenticated(viewer.id, Some(viewer.email.clone()), HashMap::new())
    }

    /// Query context acting as `viewer`.
    pub fn query(&self, viewer: &Profile) -> QueryContext {
        QueryContext::new(
            self.services(),
            viewer.clone(),
            Self::auth(viewer),
            RequestMetadata::new(),
        )
    }

    /// Mutation context acting as `viewer`.
    pub fn mutation(&self, viewer: &Profile) -> MutationContext {
        MutationContext::new(
            self.services(),
            viewer.clone(),
            Self::auth(viewer),
            RequestMetadata::new(),
        )
    }
}
