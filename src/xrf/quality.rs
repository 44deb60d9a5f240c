//! # 校准质量评估
//!
//! 逐个标准样品回算浓度、误差与回收率，并按 R² 给出整体等级与建议。
//! 等级与建议仅供参考，从不阻止保存。
//!
//! ## 三级误差分类
//! - Excellent: error < 2%
//! - Good: error < 5%
//! - Poor: 其余
//! - Undefined: 认证浓度为 0，相对误差无意义
//!
//! ## 依赖关系
//! - 被 `xrf/engine.rs`, `commands/calibrate.rs` 调用
//! - 使用 `models/calibration.rs`

use crate::error::{Result, XrfError};
use crate::models::Calibration;

use serde::Serialize;
use std::fmt;

/// 单个标准样品的准确度分级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccuracyTier {
    Excellent,
    Good,
    Poor,
    Undefined,
}

impl AccuracyTier {
    pub fn from_error_pct(error_pct: Option<f64>) -> Self {
        match error_pct {
            Some(e) if e < 2.0 => AccuracyTier::Excellent,
            Some(e) if e < 5.0 => AccuracyTier::Good,
            Some(_) => AccuracyTier::Poor,
            None => AccuracyTier::Undefined,
        }
    }
}

impl fmt::Display for AccuracyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccuracyTier::Excellent => "excellent",
            AccuracyTier::Good => "good",
            AccuracyTier::Poor => "poor",
            AccuracyTier::Undefined => "undefined",
        };
        write!(f, "{}", s)
    }
}

/// 单个标准样品的评估结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardEvaluation {
    pub standard_name: String,
    pub certified: f64,
    pub mean_intensity: f64,
    pub predicted: f64,
    /// |predicted - certified| / certified × 100，认证浓度为 0 时为 None
    pub error_pct: Option<f64>,
    /// predicted / certified × 100
    pub recovery_pct: Option<f64>,
    pub tier: AccuracyTier,
}

/// 按 R² 的整体等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationGrade {
    Excellent,
    Good,
    Acceptable,
    Poor,
}

impl CalibrationGrade {
    pub fn from_r_squared(r_squared: f64) -> Self {
        if r_squared >= 0.999 {
            CalibrationGrade::Excellent
        } else if r_squared >= 0.99 {
            CalibrationGrade::Good
        } else if r_squared >= 0.98 {
            CalibrationGrade::Acceptable
        } else {
            CalibrationGrade::Poor
        }
    }
}

impl fmt::Display for CalibrationGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CalibrationGrade::Excellent => "excellent",
            CalibrationGrade::Good => "good",
            CalibrationGrade::Acceptable => "acceptable",
            CalibrationGrade::Poor => "poor",
        };
        write!(f, "{}", s)
    }
}

/// 给操作者的建议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Accept,
    Investigate,
    Recalibrate,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Recommendation::Accept => "accept",
            Recommendation::Investigate => "investigate",
            Recommendation::Recalibrate => "recalibrate",
        };
        write!(f, "{}", s)
    }
}

/// 完整评估报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeReport {
    pub element: String,
    pub r_squared: f64,
    pub grade: CalibrationGrade,
    pub recommendation: Recommendation,
    pub standards: Vec<StandardEvaluation>,
}

impl GradeReport {
    pub fn poor_standards(&self) -> impl Iterator<Item = &StandardEvaluation> {
        self.standards
            .iter()
            .filter(|s| s.tier == AccuracyTier::Poor)
    }
}

/// 质量评估器
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityEvaluator;

impl QualityEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// 逐标准样品评估；只有名称的旧汇总无法预测，被跳过
    pub fn evaluate(&self, calibration: &Calibration) -> Vec<StandardEvaluation> {
        calibration
            .standards_used
            .iter()
            .filter(|s| s.has_statistics())
            .map(|s| {
                let predicted = calibration.predict(s.mean_intensity);
                let certified = s.certified_concentration;
                let (error_pct, recovery_pct) = if certified != 0.0 {
                    (
                        Some((predicted - certified).abs() / certified.abs() * 100.0),
                        Some(predicted / certified * 100.0),
                    )
                } else {
                    (None, None)
                };
                StandardEvaluation {
                    standard_name: s.standard_name.clone(),
                    certified,
                    mean_intensity: s.mean_intensity,
                    predicted,
                    error_pct,
                    recovery_pct,
                    tier: AccuracyTier::from_error_pct(error_pct),
                }
            })
            .collect()
    }

    /// 反算理论强度: (certified - intercept) / slope
    pub fn back_calculate_intensity(&self, calibration: &Calibration, certified: f64) -> Result<f64> {
        if calibration.slope == 0.0 {
            return Err(XrfError::SingularCalibration {
                element: calibration.element.clone(),
            });
        }
        Ok((certified - calibration.intercept) / calibration.slope)
    }

    pub fn grade(&self, calibration: &Calibration) -> GradeReport {
        let standards = self.evaluate(calibration);
        let grade = CalibrationGrade::from_r_squared(calibration.r_squared);
        let any_poor = standards.iter().any(|s| s.tier == AccuracyTier::Poor);

        let recommendation = match grade {
            CalibrationGrade::Poor => Recommendation::Recalibrate,
            CalibrationGrade::Excellent | CalibrationGrade::Good if !any_poor => {
                Recommendation::Accept
            }
            _ => Recommendation::Investigate,
        };

        GradeReport {
            element: calibration.element.clone(),
            r_squared: calibration.r_squared,
            grade,
            recommendation,
            standards,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PeakChoice, StandardSummary};
    use approx::assert_relative_eq;
    use chrono::Utc;

    fn calibration(slope: f64, intercept: f64, r2: f64, points: &[(f64, f64)]) -> Calibration {
        Calibration {
            element: "Pb".to_string(),
            slope,
            intercept,
            r_squared: r2,
            standards_used: points
                .iter()
                .enumerate()
                .map(|(i, &(c, m))| {
                    StandardSummary::from_intensities(format!("STD-{}", i), c, vec![m]).unwrap()
                })
                .collect(),
            created_timestamp: Utc::now(),
            peak_profile_used: PeakChoice::Primary,
        }
    }

    #[test]
    fn test_tiers() {
        // predicted = 0.1 × I
        let cal = calibration(0.1, 0.0, 0.995, &[(100.0, 1010.0), (100.0, 1030.0), (100.0, 1100.0)]);
        let rows = QualityEvaluator::new().evaluate(&cal);
        assert_eq!(rows[0].tier, AccuracyTier::Excellent);
        assert_eq!(rows[1].tier, AccuracyTier::Good);
        assert_eq!(rows[2].tier, AccuracyTier::Poor);
        assert_relative_eq!(rows[2].error_pct.unwrap(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(rows[2].recovery_pct.unwrap(), 110.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_certified_is_undefined() {
        let cal = calibration(0.1, 0.0, 1.0, &[(0.0, 40.0), (50.0, 500.0)]);
        let rows = QualityEvaluator::new().evaluate(&cal);
        assert!(rows[0].error_pct.is_none());
        assert!(rows[0].recovery_pct.is_none());
        assert_eq!(rows[0].tier, AccuracyTier::Undefined);
        assert_relative_eq!(rows[0].predicted, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_back_calculation_inverts_prediction() {
        let cal = calibration(0.0330, -2.46, 1.0, &[(432.0, 13150.0), (3242.0, 98200.0)]);
        let evaluator = QualityEvaluator::new();
        for x in [0.0, 1.5, 13150.0, 98200.0, 1.0e6] {
            let back = evaluator
                .back_calculate_intensity(&cal, cal.predict(x))
                .unwrap();
            assert_relative_eq!(back, x, epsilon = 1e-6, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_zero_slope_is_singular() {
        let cal = calibration(0.0, 5.0, 0.0, &[(5.0, 1.0), (5.0, 2.0)]);
        let err = QualityEvaluator::new()
            .back_calculate_intensity(&cal, 10.0)
            .unwrap_err();
        assert!(matches!(err, XrfError::SingularCalibration { .. }));
    }

    #[test]
    fn test_grade_thresholds() {
        assert_eq!(CalibrationGrade::from_r_squared(0.9995), CalibrationGrade::Excellent);
        assert_eq!(CalibrationGrade::from_r_squared(0.999), CalibrationGrade::Excellent);
        assert_eq!(CalibrationGrade::from_r_squared(0.995), CalibrationGrade::Good);
        assert_eq!(CalibrationGrade::from_r_squared(0.985), CalibrationGrade::Acceptable);
        assert_eq!(CalibrationGrade::from_r_squared(0.95), CalibrationGrade::Poor);
    }

    #[test]
    fn test_recommendations() {
        let evaluator = QualityEvaluator::new();

        let good = calibration(0.1, 0.0, 0.9995, &[(100.0, 1000.0), (200.0, 2010.0)]);
        assert_eq!(evaluator.grade(&good).recommendation, Recommendation::Accept);

        let outlier = calibration(0.1, 0.0, 0.9995, &[(100.0, 1000.0), (200.0, 2400.0)]);
        let report = evaluator.grade(&outlier);
        assert_eq!(report.recommendation, Recommendation::Investigate);
        assert_eq!(report.poor_standards().count(), 1);

        let acceptable = calibration(0.1, 0.0, 0.985, &[(100.0, 1000.0), (200.0, 2000.0)]);
        assert_eq!(evaluator.grade(&acceptable).recommendation, Recommendation::Investigate);

        let poor = calibration(0.1, 0.0, 0.90, &[(100.0, 1000.0), (200.0, 2000.0)]);
        assert_eq!(evaluator.grade(&poor).recommendation, Recommendation::Recalibrate);
    }

    #[test]
    fn test_name_only_standards_are_not_evaluated() {
        let mut cal = calibration(0.1, 0.0, 0.99, &[(100.0, 1000.0)]);
        cal.standards_used.push(StandardSummary::name_only("LKSD-1"));
        let rows = QualityEvaluator::new().evaluate(&cal);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].standard_name, "STD-0");
    }
}
