//! 模板副本服务
//!
//! 模板本身从不修改，所有写入都发生在 `<名称>_copy<扩展名>` 副本上；
//! 重名时依次尝试 `_copy1`、`_copy2`……

use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// 副本路径（不检查是否已存在）
fn copy_path(template: &Path, index: usize) -> PathBuf {
    let stem = template
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let suffix = if index == 0 {
        "_copy".to_string()
    } else {
        format!("_copy{}", index)
    };
    let name = match template.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}", stem, suffix),
    };
    template.with_file_name(name)
}

/// 与模板同目录下第一个不存在的副本路径
pub fn next_copy_path(template: &Path) -> PathBuf {
    (0..)
        .map(|index| copy_path(template, index))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| copy_path(template, 0))
}

/// 为每个模板创建副本，失败的模板记录后跳过
///
/// 返回 (模板, 副本) 列表，顺序与输入一致
pub async fn create_working_copies(templates: &[PathBuf]) -> Vec<(PathBuf, PathBuf)> {
    let mut copies = Vec::with_capacity(templates.len());

    for template in templates {
        let target = next_copy_path(template);
        match tokio::fs::copy(template, &target).await {
            Ok(_) => {
                info!(
                    "📋 已创建副本: {}",
                    target.file_name().unwrap_or_default().to_string_lossy()
                );
                copies.push((template.clone(), target));
            }
            Err(e) => warn!("⚠️ 无法创建副本 {}: {}", template.display(), e),
        }
    }

    copies
}
