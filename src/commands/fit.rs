//! # fit 子命令实现
//!
//! 拟合单条谱图中某元素的峰，并用当前校准换算浓度。
//!
//! ## 依赖关系
//! - 使用 `cli/fit.rs` 定义的 FitArgs
//! - 使用 `parsers/` 读取谱图, `xrf/` 拟合与换算

use super::{describe_active, fmt_opt, open_store};
use crate::cli::fit::FitArgs;
use crate::cli::GlobalArgs;
use crate::error::Result;
use crate::parsers;
use crate::utils::output;
use crate::xrf::XrfEngine;

/// 执行 fit 命令
pub fn execute(args: FitArgs, global: &GlobalArgs) -> Result<()> {
    let element = args.fit.element;
    let choice = args.fit.choice();
    let profile = element.definition().profile(choice)?;

    output::print_header(&format!(
        "{} {} Peak Fit ({:.2} keV)",
        element, profile.line, profile.center_energy
    ));

    let spectrum = parsers::load_spectrum(&args.input)?;
    let (low, high) = spectrum.energy_range();
    let total_counts: f64 = spectrum.counts().iter().sum();
    output::print_info(&format!(
        "Loaded '{}': {} samples, {:.3}-{:.3} keV, step {:.4} keV, {:.0} total counts",
        spectrum.name,
        spectrum.len(),
        low,
        high,
        spectrum.energy()[1] - spectrum.energy()[0],
        total_counts
    ));

    let engine = XrfEngine::new(args.fit.fitter());
    let result = engine.fit_element_peak(&spectrum, element, choice)?;

    let store = open_store(global);
    let active = store.get(element);
    let concentration = active.apply(result.integrated_intensity);

    output::print_field("Integrated intensity", &format!("{:.2}", result.integrated_intensity));
    output::print_field("Fit R²", &fmt_opt(result.fit_r_squared, 4));
    output::print_field("Peak center", &format!("{:.4} keV", result.peak_center_observed));
    output::print_field("FWHM", &format!("{:.4} keV", result.gaussian.fwhm()));
    output::print_field(
        "Background",
        &format!(
            "{:.4} × E + {:.4}",
            result.background_slope, result.background_intercept
        ),
    );
    output::print_field("Iterations", &result.iterations.to_string());
    output::print_separator();
    output::print_field("Calibration", &describe_active(&active));
    output::print_success(&format!("{}: {:.2} ppm", element, concentration));

    if active.is_default() {
        output::print_warning(&format!(
            "No calibration stored for {}; concentration equals raw intensity",
            element
        ));
    }

    Ok(())
}
