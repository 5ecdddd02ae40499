pub mod error;
pub mod passthrough;
pub mod prelude;
pub mod retry;
pub mod runtime;
pub mod scene;
pub mod session;
pub mod xr_init;

#[cfg(all(feature = "openxr", not(target_family = "wasm")))]
pub mod oxr;

use bevy::app::{PluginGroup, PluginGroupBuilder};
use bevy::prelude::DefaultPlugins;

use runtime::XrRuntime;
use xr_init::{XrSessionConfig, XrSessionPlugin};

/// [`DefaultPlugins`] plus the session plugin, with the given runtime and configuration.
pub struct DefaultXrSessionPlugins {
    plugin: XrSessionPlugin,
}

impl DefaultXrSessionPlugins {
    pub fn new(runtime: impl XrRuntime + 'static, config: XrSessionConfig) -> Self {
        Self {
            plugin: XrSessionPlugin::new(runtime).with_config(config),
        }
    }
}

impl PluginGroup for DefaultXrSessionPlugins {
    fn build(self) -> PluginGroupBuilder {
        DefaultPlugins.build().add(self.plugin)
    }
}
