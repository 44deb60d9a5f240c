//! # 校准回归
//!
//! 对选定标准样品做普通最小二乘：`certified = slope × mean_intensity + intercept`。
//! 不加权，不自动剔除离群点；剔除由操作者在调用前完成。
//!
//! ## 依赖关系
//! - 被 `xrf/engine.rs` 调用
//! - 使用 `xrf/fitter.rs` 的 `fit_line`

use crate::error::{Result, XrfError};
use crate::models::{Calibration, Element, PeakChoice, StandardSummary};
use crate::xrf::fitter::fit_line;

use chrono::Utc;

/// 校准回归器
#[derive(Debug, Clone, Copy, Default)]
pub struct CalibrationRegressor;

impl CalibrationRegressor {
    pub fn new() -> Self {
        Self
    }

    /// 由各标准样品汇总回归出一条校准曲线
    ///
    /// `standards_used` 与输入完全一致（保持顺序）。
    pub fn regress(
        &self,
        element: Element,
        summaries: Vec<StandardSummary>,
        choice: PeakChoice,
    ) -> Result<Calibration> {
        let degenerate = |reason: String| XrfError::DegenerateFit {
            element: element.to_string(),
            reason,
        };

        if summaries.len() < Calibration::MIN_STANDARDS {
            return Err(degenerate(format!(
                "{} standard(s) supplied, at least {} required",
                summaries.len(),
                Calibration::MIN_STANDARDS
            )));
        }

        if let Some(bad) = summaries.iter().find(|s| {
            !s.mean_intensity.is_finite() || !s.certified_concentration.is_finite()
        }) {
            return Err(degenerate(format!(
                "standard '{}' has a non-finite intensity or concentration",
                bad.standard_name
            )));
        }

        let x: Vec<f64> = summaries.iter().map(|s| s.mean_intensity).collect();
        let y: Vec<f64> = summaries
            .iter()
            .map(|s| s.certified_concentration)
            .collect();

        let (slope, intercept) = fit_line(&x, &y).ok_or_else(|| {
            degenerate("all standards have the same mean intensity".to_string())
        })?;

        let r_squared = coefficient_of_determination(&x, &y, slope, intercept);
        // 两点确定的直线是精确的，消除舍入误差
        let r_squared = if summaries.len() == Calibration::MIN_STANDARDS {
            1.0
        } else {
            r_squared
        };

        Ok(Calibration {
            element: element.symbol().to_string(),
            slope,
            intercept,
            r_squared,
            standards_used: summaries,
            created_timestamp: Utc::now(),
            peak_profile_used: choice,
        })
    }
}

/// R² = 1 - SS_res / SS_tot
///
/// 浓度全相同 (SS_tot = 0) 时拟合线斜率为 0：残差为 0 记 1，否则记 0。
fn coefficient_of_determination(x: &[f64], y: &[f64], slope: f64, intercept: f64) -> f64 {
    let mean_y = y.iter().sum::<f64>() / y.len() as f64;
    let ss_tot: f64 = y.iter().map(|v| (v - mean_y) * (v - mean_y)).sum();
    let ss_res: f64 = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| {
            let r = yi - (slope * xi + intercept);
            r * r
        })
        .sum();
    if ss_tot <= 0.0 {
        return if ss_res <= 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xrf::quality::QualityEvaluator;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn summary(name: &str, certified: f64, mean: f64) -> StandardSummary {
        StandardSummary::from_intensities(name, certified, vec![mean]).unwrap()
    }

    #[test]
    fn test_two_points_are_exact() {
        let cal = CalibrationRegressor::new()
            .regress(
                Element::Zn,
                vec![summary("A", 10.0, 100.0), summary("B", 250.0, 2100.0)],
                PeakChoice::Primary,
            )
            .unwrap();
        assert_eq!(cal.r_squared, 1.0);
        assert_relative_eq!(cal.slope, 0.12, epsilon = 1e-12);
        assert_relative_eq!(cal.intercept, -2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_equal_intensities_are_degenerate() {
        let err = CalibrationRegressor::new()
            .regress(
                Element::Pb,
                vec![summary("A", 10.0, 500.0), summary("B", 90.0, 500.0)],
                PeakChoice::Primary,
            )
            .unwrap_err();
        assert!(matches!(err, XrfError::DegenerateFit { .. }));
    }

    #[test]
    fn test_single_standard_is_degenerate() {
        let err = CalibrationRegressor::new()
            .regress(Element::Pb, vec![summary("A", 10.0, 500.0)], PeakChoice::Primary)
            .unwrap_err();
        assert!(matches!(err, XrfError::DegenerateFit { .. }));
    }

    #[test]
    fn test_lead_srm_pair() {
        let cal = CalibrationRegressor::new()
            .regress(
                Element::Pb,
                vec![
                    summary("NIST SRM 2586", 432.0, 13150.0),
                    summary("NIST SRM 2587", 3242.0, 98200.0),
                ],
                PeakChoice::Primary,
            )
            .unwrap();

        let slope = (3242.0 - 432.0) / (98200.0 - 13150.0);
        assert_relative_eq!(cal.slope, slope, max_relative = 1e-12);
        assert_relative_eq!(cal.slope, 0.033, epsilon = 1e-3);
        assert_relative_eq!(cal.intercept, 432.0 - slope * 13150.0, epsilon = 1e-9);
        assert_eq!(cal.r_squared, 1.0);
        assert_eq!(cal.element, "Pb");
    }

    #[test]
    fn test_order_and_profile_preserved() {
        let input = vec![
            summary("C", 300.0, 3050.0),
            summary("A", 10.0, 95.0),
            summary("B", 120.0, 1210.0),
        ];
        let cal = CalibrationRegressor::new()
            .regress(Element::As, input.clone(), PeakChoice::Alternative)
            .unwrap();
        assert_eq!(cal.standards_used, input);
        assert_eq!(cal.peak_profile_used, PeakChoice::Alternative);
        assert!(cal.r_squared > 0.99 && cal.r_squared <= 1.0);
    }

    #[test]
    fn test_constant_concentration_gives_flat_line() {
        let cal = CalibrationRegressor::new()
            .regress(
                Element::Cu,
                vec![
                    summary("A", 50.0, 100.0),
                    summary("B", 50.0, 200.0),
                    summary("C", 50.0, 300.0),
                ],
                PeakChoice::Primary,
            )
            .unwrap();
        assert_abs_diff_eq!(cal.slope, 0.0, epsilon = 1e-15);
        assert_relative_eq!(cal.intercept, 50.0, epsilon = 1e-9);
        assert_eq!(cal.r_squared, 1.0);

        let err = QualityEvaluator::new()
            .back_calculate_intensity(&cal, 50.0)
            .unwrap_err();
        assert!(matches!(err, XrfError::SingularCalibration { .. }));
    }

    #[test]
    fn test_two_standards_same_concentration() {
        let cal = CalibrationRegressor::new()
            .regress(
                Element::Pb,
                vec![summary("A", 50.0, 100.0), summary("B", 50.0, 200.0)],
                PeakChoice::Primary,
            )
            .unwrap();
        assert_eq!(cal.slope, 0.0);
        assert_eq!(cal.r_squared, 1.0);
    }

    #[test]
    fn test_r_squared_when_concentrations_are_constant() {
        let x = [1.0, 2.0, 3.0];
        let y = [5.0, 5.0, 5.0];
        assert_eq!(coefficient_of_determination(&x, &y, 0.0, 5.0), 1.0);
        assert_eq!(coefficient_of_determination(&x, &y, 1.0, 0.0), 0.0);
    }
}
