pub mod adapters;
pub mod config_manager;
pub mod sdk_configuration;

pub use config_manager::ConfigManager;
pub use sdk_configuration::{SdkConfiguration, SdkSettings, SecondaryImplementationInfo};
