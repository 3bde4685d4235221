//! The set of apps, built once at startup.

use std::collections::HashSet;
use std::sync::Arc;

use crate::app::App;
use crate::config::AppOptions;
use crate::error::{AppError, Result};
use crate::repository::RepositoryResolver;
use crate::supervisor::{owner_app_id, ProcessSupervisor};

#[derive(Debug, Default)]
pub struct AppRegistry {
    apps: Vec<Arc<App>>,
}

impl AppRegistry {
    /// Build every app, failing on the first invalid entry or duplicate id.
    pub fn build(
        options: Vec<AppOptions>,
        resolver: &dyn RepositoryResolver,
        supervisor: Arc<dyn ProcessSupervisor>,
    ) -> Result<Self> {
        let apps = options
            .into_iter()
            .map(|options| App::new(options, resolver, Arc::clone(&supervisor)).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        Self::from_apps(apps)
    }

    pub fn from_apps(apps: Vec<Arc<App>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for app in &apps {
            if !seen.insert(app.id()) {
                return Err(AppError::config(format!("Duplicate app id '{}'", app.id())));
            }
        }
        Ok(Self { apps })
    }

    pub fn get(&self, id: &str) -> Option<&Arc<App>> {
        self.apps.iter().find(|app| app.id() == id)
    }

    /// Find the app owning a supervised process, by naming convention.
    pub fn get_by_process(&self, process_name: &str) -> Option<&Arc<App>> {
        self.get(owner_app_id(process_name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<App>> {
        self.apps.iter()
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}
