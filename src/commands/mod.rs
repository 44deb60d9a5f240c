//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。核心模块只返回结构化结果，
//! 所有终端输出（状态行、进度条、表格）都在这里完成。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `parsers/`, `xrf/`, `utils/`
//! - 子模块: fit, calibrate, quantify, calibrations, standards, elements

pub mod calibrate;
pub mod calibrations;
pub mod elements;
pub mod fit;
pub mod quantify;
pub mod standards;

use crate::cli::{Cli, Commands, GlobalArgs};
use crate::error::Result;
use crate::models::ActiveCalibration;
use crate::utils::output;
use crate::xrf::{CalibrationStore, LoadStatus, StandardCatalog};

/// 执行命令
pub fn run(cli: Cli) -> Result<()> {
    let global = cli.global;
    match cli.command {
        Commands::Fit(args) => fit::execute(args, &global),
        Commands::Calibrate(args) => calibrate::execute(args, &global),
        Commands::Quantify(args) => quantify::execute(args, &global),
        Commands::Calibrations(args) => calibrations::execute(args, &global),
        Commands::Standards(args) => standards::execute(args, &global),
        Commands::Elements => elements::execute(),
    }
}

/// 打开校准存储；文件损坏时警告并按空存储继续
pub(crate) fn open_store(global: &GlobalArgs) -> CalibrationStore {
    let store = CalibrationStore::open(&global.store);
    if let LoadStatus::Corrupt(reason) = store.load_status() {
        output::print_warning(&format!(
            "Calibration file '{}' is unreadable ({}); no custom calibrations loaded",
            global.store.display(),
            reason
        ));
    }
    store
}

/// 打开标准样品目录；文件损坏时警告并只使用内置标准样品
pub(crate) fn open_catalog(global: &GlobalArgs) -> StandardCatalog {
    let catalog = StandardCatalog::open(&global.catalog);
    if let LoadStatus::Corrupt(reason) = catalog.load_status() {
        output::print_warning(&format!(
            "Standard catalog '{}' is unreadable ({}); using built-in standards only",
            global.catalog.display(),
            reason
        ));
    }
    catalog
}

/// 当前校准的一行描述
pub(crate) fn describe_active(active: &ActiveCalibration<'_>) -> String {
    match active.r_squared() {
        Some(r2) => format!("{} (R² = {:.4})", active.equation(), r2),
        None => format!("{} (uncalibrated default)", active.equation()),
    }
}

/// 可选值格式化
pub(crate) fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "n/a".to_string(),
    }
}
