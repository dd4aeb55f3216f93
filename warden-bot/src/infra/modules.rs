use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};
use warden_config::ModulesConfig;
use warden_core::{
    ModuleError,
    lifecycle::ports::{ModuleDescriptor, ModuleLoader},
};

/// Feature modules compiled into the bot, in discovery order.
pub const FEATURE_MODULES: &[&str] = &[
    "infractions",
    "shift_management",
    "leave_of_absence",
    "reminders",
    "custom_commands",
    "punishments",
    "server_logs",
    "integrations",
    "analytics",
    "staff_conduct",
];

/// Loads modules out of the static catalog.
#[derive(Debug)]
pub struct CatalogModuleLoader {
    catalog: Vec<ModuleDescriptor>,
    loaded: Mutex<Vec<String>>,
}

impl CatalogModuleLoader {
    pub fn new(catalog: Vec<ModuleDescriptor>) -> Self {
        Self {
            catalog,
            loaded: Mutex::new(Vec::new()),
        }
    }

    /// Builds the catalog from [`FEATURE_MODULES`] plus the hot-reload module.
    ///
    /// A non-empty `enabled` list narrows the feature modules; the hot-reload
    /// module is always offered.
    pub fn from_config(config: &ModulesConfig) -> Self {
        let mut catalog: Vec<ModuleDescriptor> = FEATURE_MODULES
            .iter()
            .copied()
            .filter(|name| config.enabled.is_empty() || config.enabled.iter().any(|e| e == name))
            .map(|name| {
                if config.is_experimental(name) {
                    ModuleDescriptor::experimental(name)
                } else {
                    ModuleDescriptor::new(name)
                }
            })
            .collect();

        if !config.hot_reload.is_empty() {
            catalog.push(ModuleDescriptor::new(config.hot_reload.clone()));
        }
        Self::new(catalog)
    }

    pub fn catalog(&self) -> &[ModuleDescriptor] {
        &self.catalog
    }

    pub fn loaded(&self) -> Vec<String> {
        self.loaded.lock().clone()
    }
}

#[async_trait]
impl ModuleLoader for CatalogModuleLoader {
    async fn discover(&self) -> anyhow::Result<Vec<ModuleDescriptor>> {
        debug!(count = self.catalog.len(), "discovered feature modules");
        Ok(self.catalog.clone())
    }

    async fn load(&self, module: &ModuleDescriptor) -> Result<(), ModuleError> {
        if !self.catalog.iter().any(|known| known.name == module.name) {
            return Err(ModuleError::NotFound(module.name.clone()));
        }
        let mut loaded = self.loaded.lock();
        if !loaded.contains(&module.name) {
            loaded.push(module.name.clone());
        }
        info!(module = %module.name, "loaded feature module");
        Ok(())
    }
}
