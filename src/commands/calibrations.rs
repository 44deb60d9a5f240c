//! # calibrations 子命令实现
//!
//! 校准存储的查看、删除、清空、导出与导入。
//!
//! ## 依赖关系
//! - 使用 `cli/calibrations.rs` 定义的子命令
//! - 使用 `xrf/store.rs`, `xrf/quality.rs`

use super::{fmt_opt, open_store};
use crate::cli::calibrations::{CalibrationsArgs, CalibrationsCommands};
use crate::cli::GlobalArgs;
use crate::error::{Result, XrfError};
use crate::models::Element;
use crate::utils::output;
use crate::xrf::{CalibrationStore, ImportReport, QualityEvaluator};

use std::fs;
use std::path::Path;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct CalibrationRow {
    #[tabled(rename = "Element")]
    element: String,
    #[tabled(rename = "Equation")]
    equation: String,
    #[tabled(rename = "R²")]
    r2: String,
    #[tabled(rename = "Standards")]
    standards: usize,
    #[tabled(rename = "Profile")]
    profile: String,
    #[tabled(rename = "Created (UTC)")]
    created: String,
}

#[derive(Tabled)]
struct StandardRow {
    #[tabled(rename = "Standard")]
    name: String,
    #[tabled(rename = "Certified (ppm)")]
    certified: String,
    #[tabled(rename = "n")]
    n: String,
    #[tabled(rename = "Mean Intensity")]
    mean: String,
    #[tabled(rename = "RSD (%)")]
    rsd: String,
    #[tabled(rename = "Predicted (ppm)")]
    predicted: String,
    #[tabled(rename = "Error (%)")]
    error: String,
    #[tabled(rename = "Accuracy")]
    tier: String,
}

/// 执行 calibrations 命令
pub fn execute(args: CalibrationsArgs, global: &GlobalArgs) -> Result<()> {
    let mut store = open_store(global);

    match args.command {
        CalibrationsCommands::List => list(&store),
        CalibrationsCommands::Show { element } => show(&store, element),
        CalibrationsCommands::Delete { element } => {
            if store.delete(element)? {
                output::print_success(&format!("Deleted {} calibration", element));
            } else {
                output::print_warning(&format!("No calibration stored for {}", element));
            }
            Ok(())
        }
        CalibrationsCommands::Reset { yes } => {
            if !yes {
                return Err(XrfError::InvalidArgument(
                    "Refusing to delete all calibrations without --yes".to_string(),
                ));
            }
            let removed = store.reset_all()?;
            output::print_done(&format!("Removed {} calibration(s)", removed));
            Ok(())
        }
        CalibrationsCommands::Export { elements, output: target } => {
            let subset = (!elements.is_empty()).then_some(elements.as_slice());
            let blob = store.export(subset)?;
            match target {
                Some(path) => {
                    write_export(&path, &blob)?;
                    output::print_success(&format!("Exported to {}", path.display()));
                }
                None => println!("{}", blob),
            }
            Ok(())
        }
        CalibrationsCommands::Import { file, no_overwrite } => {
            let blob = fs::read_to_string(&file).map_err(|e| XrfError::FileReadError {
                path: file.display().to_string(),
                source: e,
            })?;
            let report = store.import(&blob, !no_overwrite)?;
            print_import(&report);
            Ok(())
        }
    }
}

fn list(store: &CalibrationStore) -> Result<()> {
    output::print_header(&format!("Stored Calibrations ({})", store.len()));

    if store.is_empty() {
        output::print_info("No calibrations stored; all elements use the default (Concentration = Intensity)");
        return Ok(());
    }

    let rows: Vec<CalibrationRow> = store
        .iter()
        .map(|(key, cal)| CalibrationRow {
            element: key.to_string(),
            equation: cal.equation(),
            r2: format!("{:.4}", cal.r_squared),
            standards: cal.standards_used.len(),
            profile: cal.peak_profile_used.to_string(),
            created: cal.created_timestamp.format("%Y-%m-%d %H:%M").to_string(),
        })
        .collect();

    println!("{}", Table::new(&rows));
    Ok(())
}

fn show(store: &CalibrationStore, element: Element) -> Result<()> {
    output::print_header(&format!("{} Calibration", element));

    let Some(calibration) = store.calibration(element.symbol()) else {
        output::print_info(&format!(
            "No calibration stored for {}; using default {}",
            element,
            store.get(element).equation()
        ));
        return Ok(());
    };

    let report = QualityEvaluator::new().grade(calibration);

    output::print_field("Equation", &calibration.equation());
    output::print_field("R²", &format!("{:.6}", calibration.r_squared));
    output::print_field("Grade", &report.grade.to_string());
    output::print_field("Recommendation", &report.recommendation.to_string());
    output::print_field("Peak profile", &calibration.peak_profile_used.to_string());
    output::print_field("Created", &calibration.created_timestamp.to_rfc3339());
    println!();

    // 只有名称的旧汇总没有统计量，也不参与评估
    let rows: Vec<StandardRow> = calibration
        .standards_used
        .iter()
        .map(|summary| {
            let eval = report
                .standards
                .iter()
                .find(|e| e.standard_name == summary.standard_name);
            let stat = |v: f64| {
                if summary.has_statistics() {
                    format!("{:.2}", v)
                } else {
                    "-".to_string()
                }
            };
            StandardRow {
                name: summary.standard_name.clone(),
                certified: stat(summary.certified_concentration),
                n: if summary.has_statistics() {
                    summary.n.to_string()
                } else {
                    "-".to_string()
                },
                mean: stat(summary.mean_intensity),
                rsd: stat(summary.rsd_percent),
                predicted: eval.map_or("-".to_string(), |e| format!("{:.2}", e.predicted)),
                error: eval.map_or("-".to_string(), |e| fmt_opt(e.error_pct, 2)),
                tier: eval.map_or("-".to_string(), |e| e.tier.to_string()),
            }
        })
        .collect();
    println!("{}", Table::new(&rows));

    Ok(())
}

fn write_export(path: &Path, blob: &str) -> Result<()> {
    fs::write(path, blob).map_err(|e| XrfError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

fn print_import(report: &ImportReport) {
    for key in &report.added {
        output::print_success(&format!("Added {}", key));
    }
    for key in &report.replaced {
        output::print_success(&format!("Replaced {}", key));
    }
    for key in &report.kept {
        output::print_skip(&format!("Kept existing {}", key));
    }
    output::print_done(&format!(
        "Imported {} calibration(s) ({} added, {} replaced, {} kept)",
        report.added.len() + report.replaced.len(),
        report.added.len(),
        report.replaced.len(),
        report.kept.len()
    ));
}
