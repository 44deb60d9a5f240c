//! # 校准数据模型
//!
//! 标准样品汇总 (`StandardSummary`) 与元素校准曲线 (`Calibration`)。
//!
//! 校准方程: `Concentration = slope × Intensity + intercept`
//!
//! ## 依赖关系
//! - 被 `xrf/aggregator.rs`, `xrf/regression.rs` 创建
//! - 被 `xrf/quality.rs`, `xrf/store.rs` 使用

use crate::models::PeakChoice;
use crate::xrf::stats::Stats;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 单个标准样品的重复测量汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardSummary {
    /// 标准样品名称
    pub standard_name: String,

    /// 认证浓度 (ppm)
    pub certified_concentration: f64,

    /// 每次重复测量的积分强度（按输入顺序）
    pub raw_intensities: Vec<f64>,

    /// 平均积分强度
    pub mean_intensity: f64,

    /// 样本标准差 (n-1)，n = 1 时为 0
    pub std_dev: f64,

    /// 相对标准偏差 (%)
    pub rsd_percent: f64,

    /// 成功拟合的重复次数
    pub n: usize,
}

impl StandardSummary {
    /// 由各重复的积分强度构建；空输入返回 None
    pub fn from_intensities(
        standard_name: impl Into<String>,
        certified_concentration: f64,
        raw_intensities: Vec<f64>,
    ) -> Option<Self> {
        let stats = Stats::describe(&raw_intensities)?;
        Some(Self {
            standard_name: standard_name.into(),
            certified_concentration,
            raw_intensities,
            mean_intensity: stats.mean,
            std_dev: stats.std_dev,
            rsd_percent: stats.rsd_percent,
            n: stats.n,
        })
    }

    /// 只有名称的汇总：来自不含统计量的旧记录，统计量为 NaN，`n = 0`
    pub fn name_only(standard_name: impl Into<String>) -> Self {
        Self {
            standard_name: standard_name.into(),
            certified_concentration: f64::NAN,
            raw_intensities: Vec::new(),
            mean_intensity: f64::NAN,
            std_dev: f64::NAN,
            rsd_percent: f64::NAN,
            n: 0,
        }
    }

    pub fn has_statistics(&self) -> bool {
        self.n > 0
    }

    /// 平均值标准误差
    pub fn sem(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        self.std_dev / (self.n as f64).sqrt()
    }
}

/// 元素校准曲线
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    /// 元素符号（存储键）
    pub element: String,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// 参与回归的标准样品（保持输入顺序）
    pub standards_used: Vec<StandardSummary>,
    pub created_timestamp: DateTime<Utc>,
    pub peak_profile_used: PeakChoice,
}

impl Calibration {
    /// 至少两个点才能确定直线
    pub const MIN_STANDARDS: usize = 2;

    /// 强度 -> 浓度
    pub fn predict(&self, intensity: f64) -> f64 {
        self.slope * intensity + self.intercept
    }

    /// 可读方程
    pub fn equation(&self) -> String {
        format_equation(self.slope, self.intercept)
    }

    pub fn standard_names(&self) -> Vec<String> {
        self.standards_used
            .iter()
            .map(|s| s.standard_name.clone())
            .collect()
    }
}

pub fn format_equation(slope: f64, intercept: f64) -> String {
    format!(
        "Concentration = {:.4} × Intensity + {:.4}",
        slope, intercept
    )
}

/// 当前生效的校准：已存储的，或默认单位校准 (slope = 1, intercept = 0)
#[derive(Debug, Clone, Copy)]
pub enum ActiveCalibration<'a> {
    Stored(&'a Calibration),
    Default,
}

impl ActiveCalibration<'_> {
    pub fn slope(&self) -> f64 {
        match self {
            ActiveCalibration::Stored(c) => c.slope,
            ActiveCalibration::Default => 1.0,
        }
    }

    pub fn intercept(&self) -> f64 {
        match self {
            ActiveCalibration::Stored(c) => c.intercept,
            ActiveCalibration::Default => 0.0,
        }
    }

    /// 默认校准没有 R²
    pub fn r_squared(&self) -> Option<f64> {
        match self {
            ActiveCalibration::Stored(c) => Some(c.r_squared),
            ActiveCalibration::Default => None,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, ActiveCalibration::Default)
    }

    pub fn apply(&self, intensity: f64) -> f64 {
        self.slope() * intensity + self.intercept()
    }

    pub fn equation(&self) -> String {
        format_equation(self.slope(), self.intercept())
    }
}
