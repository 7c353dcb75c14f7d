//! Project configuration loaded from `.keyvault.toml`.

pub mod settings;

pub use settings::Settings;
