//! # XRF 定量核心模块
//!
//! 峰拟合、标准样品汇总、校准回归、质量评估与校准持久化。
//!
//! ## 子模块
//! - `fitter`: 单谱图峰拟合（线性背景 + 高斯）
//! - `aggregator`: 标准样品重复测量汇总
//! - `regression`: 最小二乘校准
//! - `quality`: 误差分级与校准等级
//! - `store`: 校准存储（JSON 写穿）
//! - `catalog`: 标准样品目录
//! - `sample`: 样品分组统计
//! - `stats`: 描述统计
//! - `export`: CSV 导出
//! - `engine`: 面向命令层的组合入口
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `models/`

pub mod aggregator;
pub mod catalog;
pub mod engine;
pub mod export;
pub mod fitter;
pub mod quality;
pub mod regression;
pub mod sample;
pub mod stats;
pub mod store;

pub use catalog::{parse_concentration, StandardCatalog};
pub use engine::{apply_sample_intensity, CalibrationBuild, StandardSpectra, XrfEngine};
pub use fitter::{BackgroundPolicy, PeakFitResult, PeakFitter};
pub use quality::{GradeReport, QualityEvaluator};
pub use sample::{group_samples, SpectrumQuantity};
pub use store::{CalibrationStore, ImportReport, LoadStatus};
