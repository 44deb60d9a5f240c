//! # xrfq - XRF 峰拟合与校准定量工具
//!
//! 从能量色散 XRF 谱图中拟合元素特征峰，用标准样品建立线性校准，
//! 并对批量样品谱图进行定量。
//!
//! ## 子命令
//! - `fit` - 单谱图单元素峰拟合
//! - `calibrate` - 由标准样品谱图建立校准曲线
//! - `quantify` - 批量样品定量与分组统计
//! - `calibrations` - 校准存储管理 (list/show/delete/reset/export/import)
//! - `standards` - 标准样品目录管理 (list/add/remove/enable/disable)
//! - `elements` - 列出元素谱线表
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── batch/     (文件收集与并行执行)
//!   │     ├── parsers/   (谱图解析器)
//!   │     ├── xrf/       (拟合、校准、存储)
//!   │     └── models/    (数据模型)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod error;
mod models;
mod parsers;
mod utils;
mod xrf;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
