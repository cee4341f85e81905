//! 图片插入服务 - 业务能力层
//!
//! 负责"把传输缓冲区中的图片放到标记位置并按页面剩余空间缩放"能力
//!
//! 尺寸规则：
//! - 可用高度 = (页面高度 - 下边距 - 标记位置 - 安全余量) × 0.90
//! - 默认宽度 16.5cm，高度按原始宽高比计算
//! - 高度超过可用高度时等比缩小，使高度正好等于可用高度

use tracing::{debug, info, warn};

use crate::infrastructure::{DocumentEngine, ImageRef, ImageSize, PageGeometry};
use crate::models::FailureReason;
use crate::services::locator::MarkerLocator;

/// 1cm 对应的 pt 数
pub const POINTS_PER_CM: f64 = 28.35;
/// 标记下方的安全余量（约 0.5cm）
pub const SAFETY_MARGIN_PT: f64 = 14.0;
/// 可用高度中实际使用的比例
pub const USABLE_FRACTION: f64 = 0.90;
/// 默认图片宽度（cm）
pub const NOMINAL_WIDTH_CM: f64 = 16.5;
/// 无法获取标记位置时，按上边距下方 100pt 估算
pub const OFFSET_FALLBACK_PT: f64 = 100.0;

/// 标记下方可用于放置图片的高度
pub fn available_height(geometry: &PageGeometry, offset: f64) -> f64 {
    (geometry.content_end() - offset - SAFETY_MARGIN_PT) * USABLE_FRACTION
}

/// 计算目标尺寸：默认宽度 + 原始宽高比，高度以 `available` 为上限
pub fn fit_to_page(original: ImageSize, available: f64) -> ImageSize {
    let ratio = original.aspect_ratio();
    let width = NOMINAL_WIDTH_CM * POINTS_PER_CM;
    let height = width * ratio;

    if height > available {
        ImageSize::new(available / ratio, available)
    } else {
        ImageSize::new(width, height)
    }
}

/// 标记相对正文区域的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerArea {
    Header,
    Body,
    Footer,
}

pub fn marker_area(geometry: &PageGeometry, offset: f64) -> MarkerArea {
    if offset < geometry.top_margin {
        MarkerArea::Header
    } else if offset > geometry.content_end() {
        MarkerArea::Footer
    } else {
        MarkerArea::Body
    }
}

fn cm(points: f64) -> f64 {
    points / POINTS_PER_CM
}

/// 插入成功的图片
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedImage {
    pub image: ImageRef,
    pub size: ImageSize,
    /// 标记的垂直位置
    pub offset: f64,
    pub available: f64,
}

/// 图片插入服务
pub struct PlacementEngine {
    locator: MarkerLocator,
}

impl PlacementEngine {
    pub fn new(locator: MarkerLocator) -> Self {
        Self { locator }
    }

    /// 查找标记并用传输缓冲区中的图片替换它
    pub async fn locate_and_place(
        &self,
        engine: &mut dyn DocumentEngine,
        marker: &str,
    ) -> Result<PlacedImage, FailureReason> {
        if !self.locator.locate(engine, marker).await {
            info!("  ✗ 插入失败 [{}]: 在文档中找不到标记", marker);
            return Err(FailureReason::MarkerNotFound);
        }

        let geometry = engine.page_geometry().await.map_err(placement_failed)?;
        let offset = self.vertical_offset(engine, &geometry).await;

        match marker_area(&geometry, offset) {
            MarkerArea::Header => warn!("  ⚠️ 标记 [{}] 位于页眉区域", marker),
            MarkerArea::Footer => warn!("  ⚠️ 标记 [{}] 位于页脚区域", marker),
            MarkerArea::Body => {}
        }

        let available = available_height(&geometry, offset);
        debug!(
            "  📍 可用高度: {:.1}pt ({:.1}cm)",
            available,
            cm(available)
        );
        if available <= 0.0 {
            return Err(FailureReason::NoVerticalSpace { available });
        }

        engine
            .replace_selection_text("")
            .await
            .map_err(placement_failed)?;
        engine.paste().await.map_err(placement_failed)?;

        let image = match self.find_pasted_image(engine).await {
            Some(image) => image,
            None => {
                info!("  ❌ 插入失败 [{}]: 粘贴后找不到图片对象", marker);
                return Err(FailureReason::NoImageAfterPaste);
            }
        };

        let original = engine.image_size(image).await.map_err(placement_failed)?;
        if !(original.width > 0.0 && original.height > 0.0) {
            return Err(FailureReason::PlacementFailed(format!(
                "图片尺寸无效 ({:.1}x{:.1}pt)",
                original.width, original.height
            )));
        }

        let size = fit_to_page(original, available);
        engine
            .set_image_size(image, size)
            .await
            .map_err(placement_failed)?;

        if size.height < NOMINAL_WIDTH_CM * POINTS_PER_CM * original.aspect_ratio() {
            info!(
                "  ✓ 尺寸自动调整: {:.1}cm × {:.1}cm",
                cm(size.width),
                cm(size.height)
            );
        } else {
            info!("  ✓ 默认尺寸: {:.1}cm × {:.1}cm", NOMINAL_WIDTH_CM, cm(size.height));
        }
        info!("  ✓ 图片插入成功: {}", marker);

        Ok(PlacedImage {
            image,
            size,
            offset,
            available,
        })
    }

    /// 标记位置：选区 → 选区范围 → 估算值
    async fn vertical_offset(&self, engine: &mut dyn DocumentEngine, geometry: &PageGeometry) -> f64 {
        match engine.selection_vertical_offset().await {
            Ok(offset) => return offset,
            Err(e) => debug!("选区位置不可用: {}", e),
        }
        match engine.range_vertical_offset().await {
            Ok(offset) => return offset,
            Err(e) => debug!("范围位置不可用: {}", e),
        }
        warn!("  ⚠️ 无法获取标记位置，使用估算值");
        geometry.top_margin + OFFSET_FALLBACK_PT
    }

    /// 粘贴后的图片：选区 → 选区范围（表格单元格） → 向前扩展一个单位后的选区
    async fn find_pasted_image(&self, engine: &mut dyn DocumentEngine) -> Option<ImageRef> {
        if let Ok(Some(image)) = engine.inline_image_in_selection().await {
            return Some(image);
        }
        if let Ok(Some(image)) = engine.inline_image_in_selection_range().await {
            return Some(image);
        }
        if engine.extend_selection_back().await.is_ok() {
            if let Ok(Some(image)) = engine.inline_image_in_selection().await {
                return Some(image);
            }
        }
        None
    }
}

fn placement_failed(e: crate::error::DriverError) -> FailureReason {
    FailureReason::PlacementFailed(e.to_string())
}
