pub mod toml_loader;

pub use toml_loader::{
    load_fallback_mappings, load_or_create_region_config, load_region_config, save_region_config,
};
