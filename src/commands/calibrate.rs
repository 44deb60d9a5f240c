//! # calibrate 子命令实现
//!
//! 读取各标准样品的重复谱图，建立校准曲线并评估质量。
//!
//! ## 工作流程
//! 1. 检查标准样品名存在且已启用
//! 2. 展开每个标准样品的 glob，加载谱图（无法解析的文件跳过）
//! 3. 拟合、汇总、回归
//! 4. 打印标准样品汇总与逐点评估，写入存储（`--dry-run` 时不写）
//!
//! ## 依赖关系
//! - 使用 `cli/calibrate.rs` 定义的 CalibrateArgs
//! - 使用 `batch/collector.rs` 展开 glob
//! - 使用 `xrf/engine.rs` 完成校准

use super::{fmt_opt, open_catalog, open_store};
use crate::batch::expand_glob;
use crate::cli::calibrate::CalibrateArgs;
use crate::cli::GlobalArgs;
use crate::error::{Result, XrfError};
use crate::models::Element;
use crate::parsers;
use crate::utils::{output, progress};
use crate::xrf::{CalibrationBuild, GradeReport, StandardCatalog, StandardSpectra, XrfEngine};

use tabled::{Table, Tabled};

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Standard")]
    name: String,
    #[tabled(rename = "Certified (ppm)")]
    certified: String,
    #[tabled(rename = "n")]
    n: usize,
    #[tabled(rename = "Mean Intensity")]
    mean: String,
    #[tabled(rename = "Std Dev")]
    std_dev: String,
    #[tabled(rename = "RSD (%)")]
    rsd: String,
    #[tabled(rename = "SEM")]
    sem: String,
}

#[derive(Tabled)]
struct EvaluationRow {
    #[tabled(rename = "Standard")]
    name: String,
    #[tabled(rename = "Certified (ppm)")]
    certified: String,
    #[tabled(rename = "Predicted (ppm)")]
    predicted: String,
    #[tabled(rename = "Error (%)")]
    error: String,
    #[tabled(rename = "Recovery (%)")]
    recovery: String,
    #[tabled(rename = "Expected Intensity")]
    expected: String,
    #[tabled(rename = "Accuracy")]
    tier: String,
}

/// 执行 calibrate 命令
pub fn execute(args: CalibrateArgs, global: &GlobalArgs) -> Result<()> {
    let element = args.fit.element;
    let choice = args.fit.choice();
    let profile = element.definition().profile(choice)?;

    output::print_header(&format!(
        "{} Calibration ({} {:.2} keV)",
        element, profile.line, profile.center_energy
    ));

    let catalog = open_catalog(global);
    check_standards(&catalog, element, &args.standards)?;

    let standards = load_standards(&args.standards)?;
    let total: usize = standards.iter().map(|s| s.spectra.len()).sum();
    output::print_info(&format!(
        "Loaded {} spectra for {} standards",
        total,
        standards.len()
    ));

    let engine = XrfEngine::new(args.fit.fitter());
    let build = if global.quiet {
        engine.build_calibration(&catalog, element, &standards, choice)?
    } else {
        let pb = progress::create_progress_bar(total as u64, "Fitting");
        let build = engine.build_calibration_with_progress(
            &catalog,
            element,
            &standards,
            choice,
            |standard, _| {
                pb.set_message(format!("Fitting {}", standard));
                pb.inc(1);
            },
        );
        pb.finish_and_clear();
        build?
    };

    report_build(&build);

    let report = engine.grade_calibration(&build.calibration);
    print_evaluation(&engine, &build, &report)?;

    output::print_separator();
    output::print_field("Equation", &build.calibration.equation());
    output::print_field("R²", &format!("{:.6}", report.r_squared));
    output::print_field("Grade", &report.grade.to_string());
    output::print_field("Recommendation", &report.recommendation.to_string());

    if args.dry_run {
        output::print_info("Dry run: calibration not saved");
        return Ok(());
    }

    let mut store = open_store(global);
    let previous = store.put(element, build.calibration)?;
    let verb = if previous.is_some() { "Replaced" } else { "Saved" };
    output::print_done(&format!(
        "{} {} calibration in {}",
        verb,
        element,
        global.store.display()
    ));

    Ok(())
}

/// 名称必须在目录中且处于启用状态；缺少该元素认证值的只警告
fn check_standards(
    catalog: &StandardCatalog,
    element: Element,
    specs: &[(String, String)],
) -> Result<()> {
    for (name, _) in specs {
        let definition = catalog
            .standard(name)
            .ok_or_else(|| XrfError::UnknownStandard(name.clone()))?;
        if !catalog.is_enabled(&definition.name) {
            return Err(XrfError::Validation(format!(
                "Standard '{}' is disabled",
                definition.name
            )));
        }
        if catalog.certified_value(&definition.name, element).is_none() {
            output::print_warning(&format!(
                "Standard '{}' has no certified {} value and will be excluded",
                definition.name, element
            ));
        }
    }
    Ok(())
}

fn load_standards(specs: &[(String, String)]) -> Result<Vec<StandardSpectra>> {
    let spinner = progress::create_spinner("Loading spectra");
    let mut standards = Vec::with_capacity(specs.len());

    for (name, pattern) in specs {
        let files = match expand_glob(pattern) {
            Ok(files) => files,
            Err(e) => {
                spinner.finish_and_clear();
                return Err(e);
            }
        };

        let mut spectra = Vec::with_capacity(files.len());
        for file in &files {
            spinner.set_message(format!("Loading {}", file.display()));
            match parsers::load_spectrum(file) {
                Ok(spectrum) => spectra.push(spectrum),
                Err(e) => spinner.suspend(|| output::print_skip(&format!("{}", e))),
            }
            spinner.tick();
        }

        standards.push(StandardSpectra {
            name: name.clone(),
            spectra,
        });
    }

    spinner.finish_and_clear();
    Ok(standards)
}

fn report_build(build: &CalibrationBuild) {
    for skip in &build.skipped {
        output::print_skip(&format!(
            "{} / {}: {}",
            skip.standard, skip.spectrum, skip.error
        ));
    }
    for excluded in &build.excluded {
        output::print_warning(&format!("Excluded {}: {}", excluded.name, excluded.reason));
    }

    output::print_header("Standards Summary");
    let rows: Vec<SummaryRow> = build
        .calibration
        .standards_used
        .iter()
        .map(|s| SummaryRow {
            name: s.standard_name.clone(),
            certified: format!("{:.2}", s.certified_concentration),
            n: s.n,
            mean: format!("{:.2}", s.mean_intensity),
            std_dev: format!("{:.2}", s.std_dev),
            rsd: format!("{:.2}", s.rsd_percent),
            sem: format!("{:.2}", s.sem()),
        })
        .collect();
    println!("{}", Table::new(&rows));
}

fn print_evaluation(engine: &XrfEngine, build: &CalibrationBuild, report: &GradeReport) -> Result<()> {
    output::print_header(&format!("{} Accuracy", report.element));

    let rows = report
        .standards
        .iter()
        .map(|s| {
            let expected = match engine.back_calculate_intensity(&build.calibration, s.certified) {
                Ok(v) => format!("{:.2}", v),
                Err(XrfError::SingularCalibration { .. }) => "n/a".to_string(),
                Err(e) => return Err(e),
            };
            Ok(EvaluationRow {
                name: s.standard_name.clone(),
                certified: format!("{:.2}", s.certified),
                predicted: format!("{:.2}", s.predicted),
                error: fmt_opt(s.error_pct, 2),
                recovery: fmt_opt(s.recovery_pct, 1),
                expected,
                tier: s.tier.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    println!("{}", Table::new(&rows));

    let poor: Vec<&str> = report.poor_standards().map(|s| s.standard_name.as_str()).collect();
    if !poor.is_empty() {
        output::print_warning(&format!("Poor accuracy: {}", poor.join(", ")));
    }
    Ok(())
}
