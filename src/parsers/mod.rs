//! # 解析器模块
//!
//! 把谱图文本文件转换为 `Spectrum`。
//!
//! ## 依赖关系
//! - 被 `commands/` 模块使用
//! - 使用 `models/` 数据模型
//! - 子模块: spectrum

pub mod spectrum;

pub use spectrum::load_spectrum;
