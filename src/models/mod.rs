//! # 数据模型模块
//!
//! 定义谱图、元素谱线和校准数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `xrf/` 和 `commands/` 使用
//! - 子模块: spectrum, element, calibration

pub mod calibration;
pub mod element;
pub mod spectrum;

pub use calibration::{ActiveCalibration, Calibration, StandardSummary};
pub use element::{Element, EnergyWindow, PeakChoice, PeakProfile};
pub use spectrum::Spectrum;
