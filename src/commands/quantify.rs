//! # quantify 子命令实现
//!
//! 批量拟合样品谱图，用当前校准换算浓度，并按每样品谱图数分组统计。
//!
//! ## 工作流程
//! 1. 收集匹配的谱图文件（自然排序）
//! 2. 并行加载并拟合（失败或 R² 低于阈值的谱图跳过）
//! 3. 强度 -> 浓度（未校准元素使用默认单位校准并警告）
//! 4. 按 `--spectra-per-sample` 分组，打印统计，可选导出 CSV
//!
//! ## 依赖关系
//! - 使用 `cli/quantify.rs` 定义的 QuantifyArgs
//! - 使用 `batch/` 收集与并行执行
//! - 使用 `xrf/` 拟合、换算、分组与导出

use super::{describe_active, fmt_opt, open_store};
use crate::batch::{BatchRunner, FileCollector, ProcessResult};
use crate::cli::quantify::QuantifyArgs;
use crate::cli::GlobalArgs;
use crate::error::{Result, XrfError};
use crate::parsers;
use crate::utils::output;
use crate::xrf::export::{samples_to_csv, spectra_to_csv};
use crate::xrf::{apply_sample_intensity, group_samples, PeakFitResult, SpectrumQuantity, XrfEngine};

use tabled::{Table, Tabled};

#[derive(Tabled)]
struct SpectrumRow {
    #[tabled(rename = "Spectrum")]
    spectrum: String,
    #[tabled(rename = "Intensity")]
    intensity: String,
    #[tabled(rename = "Conc. (ppm)")]
    concentration: String,
    #[tabled(rename = "Fit R²")]
    r2: String,
    #[tabled(rename = "Center (keV)")]
    center: String,
}

#[derive(Tabled)]
struct SampleRow {
    #[tabled(rename = "Sample")]
    name: String,
    #[tabled(rename = "n")]
    n: usize,
    #[tabled(rename = "Mean (ppm)")]
    mean: String,
    #[tabled(rename = "Std Dev")]
    std_dev: String,
    #[tabled(rename = "RSD (%)")]
    rsd: String,
    #[tabled(rename = "SEM")]
    sem: String,
}

/// 执行 quantify 命令
pub fn execute(args: QuantifyArgs, global: &GlobalArgs) -> Result<()> {
    let element = args.fit.element;
    let choice = args.fit.choice();
    let profile = element.definition().profile(choice)?;

    output::print_header(&format!(
        "{} Quantification ({} {:.2} keV)",
        element, profile.line, profile.center_energy
    ));

    if args.spectra_per_sample == 0 {
        return Err(XrfError::InvalidArgument(
            "--spectra-per-sample must be at least 1".to_string(),
        ));
    }
    if !args.input.exists() {
        return Err(XrfError::FileNotFound {
            path: args.input.display().to_string(),
        });
    }

    let files = FileCollector::new(args.input.clone())
        .with_pattern(&args.pattern)?
        .recursive(args.recursive)
        .collect();

    if files.is_empty() {
        output::print_warning(&format!(
            "No files matched '{}' under {}",
            args.pattern,
            args.input.display()
        ));
        return Ok(());
    }

    let store = open_store(global);
    let active = store.get(element);
    output::print_info(&format!("Found {} spectra", files.len()));
    output::print_info(&format!("Calibration: {}", describe_active(&active)));
    if active.is_default() {
        output::print_warning(&format!(
            "No calibration stored for {}; concentrations equal raw intensities",
            element
        ));
    }

    let engine = XrfEngine::new(args.fit.fitter());
    let runner = if global.quiet {
        BatchRunner::new(args.jobs).quiet()
    } else {
        BatchRunner::new(args.jobs)
    };
    let result = runner.run(&files, |path| {
        let key = path.display().to_string();
        let spectrum = match parsers::load_spectrum(path) {
            Ok(s) => s,
            Err(e) => return ProcessResult::Failed(key, e.to_string()),
        };
        match engine.fit_element_peak(&spectrum, element, choice) {
            Ok(fit) => match args.min_r2 {
                Some(min) if !fit.passes_r2(min) => ProcessResult::Skipped(
                    key,
                    format!("fit R² {} below {}", fmt_opt(fit.fit_r_squared, 4), min),
                ),
                _ => ProcessResult::Success(key, (spectrum.name, fit)),
            },
            Err(e) => ProcessResult::Failed(key, e.to_string()),
        }
    })?;

    for (path, why) in &result.skips {
        output::print_skip(&format!("{}: {}", path, why));
    }
    if result.failed() > 0 {
        output::print_warning(&format!("{} spectra failed:", result.failed()));
        for (path, err) in result.failures.iter().take(10) {
            output::print_error(&format!("  {}: {}", path, err));
        }
        if result.failed() > 10 {
            output::print_info(&format!("  ... and {} more", result.failed() - 10));
        }
    }

    let (total, skipped, failed) = (result.total(), result.skipped(), result.failed());
    let quantities: Vec<SpectrumQuantity> = result
        .outputs
        .into_iter()
        .map(|(_, (name, fit)): (String, (String, PeakFitResult))| SpectrumQuantity {
            spectrum: name,
            integrated_intensity: fit.integrated_intensity,
            concentration: apply_sample_intensity(&store, element, fit.integrated_intensity),
            fit_r_squared: fit.fit_r_squared,
            peak_center: fit.peak_center_observed,
        })
        .collect();

    if quantities.is_empty() {
        return Err(XrfError::Other("No spectrum could be quantified".to_string()));
    }

    output::print_header("Spectra");
    let rows: Vec<SpectrumRow> = quantities
        .iter()
        .map(|q| SpectrumRow {
            spectrum: q.spectrum.clone(),
            intensity: format!("{:.2}", q.integrated_intensity),
            concentration: format!("{:.2}", q.concentration),
            r2: fmt_opt(q.fit_r_squared, 4),
            center: format!("{:.4}", q.peak_center),
        })
        .collect();
    println!("{}", Table::new(&rows));

    let samples = group_samples(&quantities, args.spectra_per_sample)?;
    output::print_header(&format!("Samples ({} spectra each)", args.spectra_per_sample));
    let rows: Vec<SampleRow> = samples
        .iter()
        .map(|s| SampleRow {
            name: s.name.clone(),
            n: s.n(),
            mean: format!("{:.2}", s.concentration.mean),
            std_dev: format!("{:.2}", s.concentration.std_dev),
            rsd: format!("{:.2}", s.concentration.rsd_percent),
            sem: format!("{:.2}", s.concentration.sem),
        })
        .collect();
    println!("{}", Table::new(&rows));

    if let Some(path) = &args.output_csv {
        spectra_to_csv(&quantities, path)?;
        output::print_success(&format!("Spectrum results written to {}", path.display()));
    }
    if let Some(path) = &args.samples_csv {
        samples_to_csv(&samples, path)?;
        output::print_success(&format!("Sample statistics written to {}", path.display()));
    }

    output::print_done(&format!(
        "Quantified {} of {} spectra ({} skipped, {} failed) using {} threads",
        quantities.len(),
        total,
        skipped,
        failed,
        runner.jobs()
    ));

    Ok(())
}
