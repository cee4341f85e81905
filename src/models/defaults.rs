//! 内置的默认区域配置
//!
//! 配置文件不存在时使用，并会被写出为 TOML 供用户修改

use phf::phf_map;

use super::mapping::{RegionConfig, RegionMapping};

/// 静态映射行
#[derive(Debug, Clone, Copy)]
pub struct DefaultRange {
    pub sheet: &'static str,
    pub range: &'static str,
    pub marker: &'static str,
    pub category: &'static str,
}

const fn row(
    sheet: &'static str,
    range: &'static str,
    marker: &'static str,
    category: &'static str,
) -> DefaultRange {
    DefaultRange {
        sheet,
        range,
        marker,
        category,
    }
}

const BELOW_WORST: &str = "Below Worst Case Test";
const BELOW_POWER: &str = "Below Power Test";
const ABOVE_WORST: &str = "Above Worst Case Test";
const ABOVE_POWER: &str = "Above Power Test";

const SET_1: &[DefaultRange] = &[
    row("GSM 850", "B27:I31", "GSM 850", BELOW_WORST),
    row("W B5", "B27:I31", "W B5", BELOW_WORST),
    row("5B", "B27:J35", "5B", BELOW_WORST),
    row("B5", "B52:J70", "B5", BELOW_WORST),
    row("B12", "B52:J70", "B12", BELOW_WORST),
    row("B13", "B32:J42", "B13", BELOW_WORST),
    row("B14", "B32:J42", "B14", BELOW_WORST),
    row("B26", "B101:J123", "B26_Part90", BELOW_WORST),
    row("B26", "B125:J147", "B26_Strd", BELOW_WORST),
    row("B26", "B149:J171", "B26_Part22", BELOW_WORST),
    row("B71", "B52:J70", "B71", BELOW_WORST),
    row("n5", "B52:K81", "n5", BELOW_WORST),
    row("n12", "B46:K69", "n12", BELOW_WORST),
    row("n26", "B70:K90", "N26_Part90", BELOW_WORST),
    row("n71", "B66:K95", "n71", BELOW_WORST),
    row("GSM 850", "B33:F60", "GSM 850_Pwr", BELOW_POWER),
    row("W B5", "B33:F75", "W B5_Pwr", BELOW_POWER),
    row("B5", "B72:H107", "B5_Pwr1", BELOW_POWER),
    row("B5", "B108:H143", "B5_Pwr2", BELOW_POWER),
    row("n5", "B83:I138", "n5_Pwr1", BELOW_POWER),
    row("n5", "B139:I178", "n5_Pwr2", BELOW_POWER),
    row("GSM 1900", "B27:I31", "GSM 1900", ABOVE_WORST),
    row("W B2", "B27:I31", "W B2", ABOVE_WORST),
    row("B2", "B64:J90", "B2", ABOVE_WORST),
    row("B66", "B64:J90", "B66", ABOVE_WORST),
    row("n41", "B112:K201", "n41", ABOVE_WORST),
    row("n41_SRS", "B24:I38", "n41_SRS2", ABOVE_WORST),
    row("n77 DoD", "B92:K169", "n77 DoD", ABOVE_WORST),
    row("GSM 1900", "B33:F60", "GSM 1900_Pwr", ABOVE_POWER),
    row("B2", "B92:H145", "B2_Pwr1", ABOVE_POWER),
    row("B2", "B146:H199", "B2_Pwr2", ABOVE_POWER),
    row("n41", "B112:K201", "n41", ABOVE_POWER),
];

const SET_2: &[DefaultRange] = &[
    row("GSM 850", "B30:I31", "GSM 850", BELOW_WORST),
    row("W B5", "B33:F75", "W B5", BELOW_WORST),
    row("5B", "B30:J35", "5B", BELOW_WORST),
    row("B5", "B55:J70", "B5", BELOW_WORST),
    row("B12", "B55:J70", "B12", BELOW_WORST),
    row("B13", "B41:J48", "B13", BELOW_WORST),
    row("B14", "B41:J48", "B14", BELOW_WORST),
    row("B26", "B104:J123", "B26_Part90", BELOW_WORST),
    row("B26", "B128:J147", "B26_Strd", BELOW_WORST),
    row("B26", "B152:J171", "B26_Part22", BELOW_WORST),
    row("B71", "B55:J70", "B71", BELOW_WORST),
    row("n5", "B55:K81", "n5", BELOW_WORST),
    row("n12", "B49:K69", "n12", BELOW_WORST),
    row("n26", "B73:K90", "N26_Part90", BELOW_WORST),
    row("n71", "B69:K95", "n71", BELOW_WORST),
    row("GSM 850", "B33:F60", "GSM 850_Pwr", BELOW_POWER),
    row("W B5", "B33:F75", "W B5_Pwr", BELOW_POWER),
    row("B13", "B50:H85", "B13_Pwr", BELOW_POWER),
    row("B14", "B50:H85", "B14_Pwr", BELOW_POWER),
    row("n14", "B57:I112", "n14_Pwr", BELOW_POWER),
    row("GSM 1900", "B30:I31", "GSM 1900", ABOVE_WORST),
    row("W B2", "B30:I31", "W B2", ABOVE_WORST),
    row("B2", "B67:J90", "B2", ABOVE_WORST),
    row("B30", "B37:J44", "B30", ABOVE_WORST),
    row("n30", "B39:K53", "n30", ABOVE_WORST),
    row("n70", "B45:K65", "n70", ABOVE_WORST),
    row("GSM 850", "B33:F60", "GSM 850_Pwr", ABOVE_POWER),
    row("B26", "B173:K226", "B26_Part90_Pwr1", ABOVE_POWER),
    row("B26", "B227:K262", "B26_Part90_Pwr2", ABOVE_POWER),
];

/// 后缀 → 默认映射集合
pub static DEFAULT_RANGE_CONFIG: phf::Map<&'static str, &'static [DefaultRange]> = phf_map! {
    "#1" => SET_1,
    "#2" => SET_2,
};

impl From<&DefaultRange> for RegionMapping {
    fn from(row: &DefaultRange) -> Self {
        RegionMapping::new(row.sheet, row.range, row.marker, row.category)
    }
}

/// 构建内置默认配置
pub fn default_region_config() -> RegionConfig {
    let mut config = RegionConfig::new();
    for (suffix, rows) in DEFAULT_RANGE_CONFIG.entries() {
        config.insert(*suffix, rows.iter().map(RegionMapping::from).collect());
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::mapping::DataFileSuffix;

    #[test]
    fn test_default_config_has_both_suffixes() {
        let config = default_region_config();
        assert_eq!(config.len(), 2);

        let suffix = DataFileSuffix::from_file_name("a_#1.xlsx").unwrap();
        let mappings = config.mappings_for(&suffix).unwrap();
        assert_eq!(mappings.len(), SET_1.len());
        assert_eq!(mappings[0].marker_for(&suffix), "GSM 850_#1");
    }

    #[test]
    fn test_default_rows_are_complete() {
        for (_, rows) in DEFAULT_RANGE_CONFIG.entries() {
            for row in rows.iter() {
                assert!(RegionMapping::from(row).is_complete());
            }
        }
    }
}
