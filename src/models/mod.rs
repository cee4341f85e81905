pub mod defaults;
pub mod loaders;
pub mod mapping;
pub mod result;

pub use defaults::default_region_config;
pub use loaders::{
    load_fallback_mappings, load_or_create_region_config, load_region_config, save_region_config,
};
pub use mapping::{DataFileSuffix, RegionConfig, RegionMapping};
pub use result::{
    FailedItem, FailureReason, SkippedTemplate, TransferLedger, TransferResult, TransferStage,
};
