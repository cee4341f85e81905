use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::models::defaults::default_region_config;
use crate::models::mapping::{RegionConfig, RegionMapping};

/// 后备映射文件格式
#[derive(Debug, Default, Serialize, Deserialize)]
struct FallbackFile {
    #[serde(default, rename = "mapping")]
    mappings: Vec<RegionMapping>,
}

async fn read_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).await.map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

async fn write_file(path: &Path, content: String) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
    }
    fs::write(path, content)
        .await
        .map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
}

/// 从 TOML 文件加载按后缀分组的区域配置
///
/// 工作表、区域或标记为空的行会被忽略
pub async fn load_region_config(path: &Path) -> Result<RegionConfig, ConfigError> {
    let content = read_file(path).await?;
    let config: RegionConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let config = config.sanitized();
    info!("✓ 配置文件加载完成: {} 个后缀", config.len());
    Ok(config)
}

/// 加载区域配置，文件不存在时写出内置默认配置
///
/// 文件存在但无法解析时回退到默认配置（不覆盖原文件）
pub async fn load_or_create_region_config(path: &Path) -> Result<RegionConfig, ConfigError> {
    if !path.exists() {
        let config = default_region_config();
        save_region_config(&config, path).await?;
        info!("已创建默认配置文件: {}", path.display());
        return Ok(config);
    }

    match load_region_config(path).await {
        Ok(config) => Ok(config),
        Err(e) => {
            warn!("⚠️ 配置文件加载失败，使用默认配置: {}", e);
            Ok(default_region_config())
        }
    }
}

/// 将区域配置写入 TOML 文件，每个后缀内部按分类聚集
pub async fn save_region_config(config: &RegionConfig, path: &Path) -> Result<(), ConfigError> {
    let mut grouped = RegionConfig::new();
    for (suffix, mappings) in config.iter() {
        grouped.insert(suffix, group_by_category(mappings));
    }
    let content = toml::to_string_pretty(&grouped)?;
    write_file(path, content).await?;
    info!("✓ 配置文件保存完成: {}", path.display());
    Ok(())
}

/// 按分类首次出现的顺序聚集映射，分类内部保持原有顺序
fn group_by_category(mappings: &[RegionMapping]) -> Vec<RegionMapping> {
    let mut categories: Vec<&str> = Vec::new();
    for mapping in mappings {
        if !categories.contains(&mapping.category.as_str()) {
            categories.push(&mapping.category);
        }
    }
    categories
        .iter()
        .flat_map(|category| mappings.iter().filter(move |m| m.category == *category))
        .cloned()
        .collect()
}

/// 加载后备映射列表（`[[mapping]]`），不完整的行会被忽略
pub async fn load_fallback_mappings(path: &Path) -> Result<Vec<RegionMapping>, ConfigError> {
    let content = read_file(path).await?;
    let file: FallbackFile = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let total = file.mappings.len();
    let mappings: Vec<RegionMapping> = file
        .mappings
        .into_iter()
        .filter(RegionMapping::is_complete)
        .collect();
    if mappings.len() < total {
        warn!("⚠️ 忽略 {} 条不完整的后备映射", total - mappings.len());
    }
    Ok(mappings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::mapping::DataFileSuffix;

    #[tokio::test]
    async fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("range_config.toml");

        let created = load_or_create_region_config(&path).await.unwrap();
        assert!(path.exists());

        let reloaded = load_region_config(&path).await.unwrap();
        let suffix = DataFileSuffix::from_file_name("x_#1.xlsx").unwrap();
        assert_eq!(
            created.mappings_for(&suffix).unwrap().len(),
            reloaded.mappings_for(&suffix).unwrap().len()
        );
    }

    #[tokio::test]
    async fn test_load_region_config_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("range_config.toml");
        std::fs::write(
            &path,
            r##"
[["#1"]]
sheet = "S1"
range = "B1:C2"
marker = "A"
category = "Below Worst Case Test"

[["#1"]]
sheet = ""
range = "B1:C2"
marker = "B"

[["#3"]]
sheet = "S3"
range = "A1:A1"
marker = "C"
"##,
        )
        .unwrap();

        let config = load_region_config(&path).await.unwrap();
        assert_eq!(config.len(), 2);

        let suffix = DataFileSuffix::from_file_name("x_#1.xlsx").unwrap();
        let mappings = config.mappings_for(&suffix).unwrap();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].marker_prefix, "A");

        let suffix = DataFileSuffix::from_file_name("x_#3.xlsx").unwrap();
        assert_eq!(config.mappings_for(&suffix).unwrap()[0].category, "");
    }

    #[tokio::test]
    async fn test_broken_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("range_config.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        let config = load_or_create_region_config(&path).await.unwrap();
        assert_eq!(config, default_region_config());
        // 原文件保持不变
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "this is = = not toml");
    }

    #[tokio::test]
    async fn test_load_fallback_mappings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fallback.toml");
        std::fs::write(
            &path,
            r#"
[[mapping]]
sheet = "S1"
range = "B1:C2"
marker = "A"

[[mapping]]
sheet = "S2"
range = " "
marker = "B"
"#,
        )
        .unwrap();

        let mappings = load_fallback_mappings(&path).await.unwrap();
        assert_eq!(mappings, vec![RegionMapping::new("S1", "B1:C2", "A", "")]);
    }

    #[test]
    fn test_group_by_category_keeps_first_seen_order() {
        let mappings = vec![
            RegionMapping::new("S1", "A1", "a", "X"),
            RegionMapping::new("S2", "A1", "b", "Y"),
            RegionMapping::new("S3", "A1", "c", "X"),
        ];
        let grouped = group_by_category(&mappings);
        let markers: Vec<&str> = grouped.iter().map(|m| m.marker_prefix.as_str()).collect();
        assert_eq!(markers, vec!["a", "c", "b"]);
    }
}
