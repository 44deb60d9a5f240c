//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `fit`: 单谱图单元素峰拟合
//! - `calibrate`: 由标准样品谱图建立校准
//! - `quantify`: 批量样品定量
//! - `calibrations`: 校准存储管理（嵌套子命令）
//! - `standards`: 标准样品目录管理（嵌套子命令）
//! - `elements`: 列出元素谱线表
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: fit, calibrate, quantify, calibrations, standards

pub mod calibrate;
pub mod calibrations;
pub mod fit;
pub mod quantify;
pub mod standards;

use crate::models::{Element, PeakChoice};
use crate::xrf::{BackgroundPolicy, PeakFitter};

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// xrfq - XRF 峰拟合与校准定量工具
#[derive(Parser)]
#[command(name = "xrfq")]
#[command(version)]
#[command(about = "Quantitative XRF: peak fitting, standard calibration and sample quantification", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// 全局参数
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Calibration store file
    #[arg(long, global = true, env = "XRFQ_STORE", default_value = "xrf_calibrations.json")]
    pub store: PathBuf,

    /// Custom standard catalog file
    #[arg(long, global = true, env = "XRFQ_CATALOG", default_value = "xrf_standards.json")]
    pub catalog: PathBuf,

    /// Hide progress bars
    #[arg(short, long, global = true, default_value_t = false)]
    pub quiet: bool,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Fit one element peak in one spectrum
    Fit(fit::FitArgs),

    /// Build a calibration from reference standard spectra
    Calibrate(calibrate::CalibrateArgs),

    /// Quantify sample spectra with the stored calibration
    Quantify(quantify::QuantifyArgs),

    /// Manage stored calibrations
    Calibrations(calibrations::CalibrationsArgs),

    /// Manage the reference standard catalog
    Standards(standards::StandardsArgs),

    /// List supported elements and their peak profiles
    Elements,
}

/// 峰型选择
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum ProfileArg {
    /// Primary line (L-alpha / K-alpha)
    #[default]
    Primary,
    /// Alternative line (L-beta / K-beta), avoids interferences
    Alternative,
}

impl From<ProfileArg> for PeakChoice {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Primary => PeakChoice::Primary,
            ProfileArg::Alternative => PeakChoice::Alternative,
        }
    }
}

/// 拟合公共参数
#[derive(Args, Debug, Clone)]
pub struct FitOptions {
    /// Element symbol (e.g. Pb, As, Zn)
    #[arg(short, long)]
    pub element: Element,

    /// Peak profile to fit
    #[arg(long, value_enum, default_value_t = ProfileArg::Primary)]
    pub profile: ProfileArg,

    /// Width of each background shoulder window (keV)
    #[arg(long, default_value_t = BackgroundPolicy::default().shoulder_width_kev)]
    pub shoulder_width: f64,
}

impl FitOptions {
    pub fn choice(&self) -> PeakChoice {
        self.profile.into()
    }

    pub fn fitter(&self) -> PeakFitter {
        PeakFitter::with_background(BackgroundPolicy {
            shoulder_width_kev: self.shoulder_width,
        })
    }
}
