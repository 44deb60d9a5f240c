//! # 定量引擎入口
//!
//! 组合拟合、汇总、回归与评估，供命令层调用：
//! - `fit_element_peak`: 单谱图单元素拟合
//! - `build_calibration`: 标准样品谱图 -> 校准曲线（附排除与跳过明细）
//! - `grade_calibration`: 逐标准样品评估 + 整体等级
//! - `apply_sample_intensity`: 用存储中的校准把强度换算为浓度
//!
//! 引擎不写存储；是否保存由调用方决定，构建失败时旧校准保持不变。
//!
//! ## 依赖关系
//! - 被 `commands/` 调用
//! - 使用 `xrf/` 下所有核心组件

use crate::error::{FitError, Result, XrfError};
use crate::models::{Calibration, Element, PeakChoice, Spectrum};
use crate::xrf::aggregator::{AggregateOutcome, ReplicateOutcome, StandardAggregator};
use crate::xrf::catalog::StandardCatalog;
use crate::xrf::fitter::{PeakFitResult, PeakFitter};
use crate::xrf::quality::{GradeReport, QualityEvaluator};
use crate::xrf::regression::CalibrationRegressor;
use crate::xrf::store::CalibrationStore;

use std::fmt;

/// 标准样品未参与回归的原因
#[derive(Debug, Clone, PartialEq)]
pub enum ExclusionReason {
    NotInCatalog,
    Disabled,
    NoCertifiedValue,
    NoUsableSpectra,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExclusionReason::NotInCatalog => "not in catalog",
            ExclusionReason::Disabled => "disabled",
            ExclusionReason::NoCertifiedValue => "no certified value for this element",
            ExclusionReason::NoUsableSpectra => "no spectrum could be fitted",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExcludedStandard {
    pub name: String,
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSpectrum {
    pub standard: String,
    pub spectrum: String,
    pub error: FitError,
}

/// 校准构建结果
#[derive(Debug, Clone)]
pub struct CalibrationBuild {
    pub calibration: Calibration,
    pub excluded: Vec<ExcludedStandard>,
    pub skipped: Vec<SkippedSpectrum>,
}

/// 一个标准样品的重复谱图
#[derive(Debug, Clone)]
pub struct StandardSpectra {
    pub name: String,
    pub spectra: Vec<Spectrum>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct XrfEngine {
    fitter: PeakFitter,
    regressor: CalibrationRegressor,
    evaluator: QualityEvaluator,
}

impl XrfEngine {
    pub fn new(fitter: PeakFitter) -> Self {
        Self {
            fitter,
            regressor: CalibrationRegressor::new(),
            evaluator: QualityEvaluator::new(),
        }
    }

    pub fn fit_element_peak(
        &self,
        spectrum: &Spectrum,
        element: Element,
        choice: PeakChoice,
    ) -> Result<PeakFitResult> {
        self.fitter.fit(spectrum, element, choice)
    }

    pub fn build_calibration(
        &self,
        catalog: &StandardCatalog,
        element: Element,
        standards: &[StandardSpectra],
        choice: PeakChoice,
    ) -> Result<CalibrationBuild> {
        let aggregator = StandardAggregator::new(self.fitter);
        self.build_with(catalog, element, standards, choice, |name, certified, spectra| {
            aggregator.aggregate(name, certified, spectra, element, choice)
        })
    }

    /// 每拟合完一条谱图回调一次 (标准样品名, 结果)
    pub fn build_calibration_with_progress<F>(
        &self,
        catalog: &StandardCatalog,
        element: Element,
        standards: &[StandardSpectra],
        choice: PeakChoice,
        mut on_replicate: F,
    ) -> Result<CalibrationBuild>
    where
        F: FnMut(&str, &ReplicateOutcome),
    {
        let aggregator = StandardAggregator::new(self.fitter);
        self.build_with(catalog, element, standards, choice, |name, certified, spectra| {
            aggregator.aggregate_with_progress(name, certified, spectra, element, choice, |o| {
                on_replicate(name, o)
            })
        })
    }

    fn build_with<A>(
        &self,
        catalog: &StandardCatalog,
        element: Element,
        standards: &[StandardSpectra],
        choice: PeakChoice,
        mut aggregate: A,
    ) -> Result<CalibrationBuild>
    where
        A: FnMut(&str, f64, &[Spectrum]) -> Result<AggregateOutcome>,
    {
        // 提前检查峰型，避免把它误报为每个标准样品的失败
        element.definition().profile(choice)?;

        let mut summaries = Vec::new();
        let mut excluded = Vec::new();
        let mut skipped = Vec::new();

        for standard in standards {
            let exclude = |reason| ExcludedStandard {
                name: standard.name.clone(),
                reason,
            };

            let Some(definition) = catalog.standard(&standard.name) else {
                excluded.push(exclude(ExclusionReason::NotInCatalog));
                continue;
            };
            let name = definition.name.as_str();
            if !catalog.is_enabled(name) {
                excluded.push(exclude(ExclusionReason::Disabled));
                continue;
            }
            let Some(certified) = catalog.certified_value(name, element) else {
                excluded.push(exclude(ExclusionReason::NoCertifiedValue));
                continue;
            };

            let failed = match aggregate(name, certified, &standard.spectra) {
                Ok(AggregateOutcome {
                    summary,
                    skipped: failed,
                }) => {
                    summaries.push(summary);
                    failed
                }
                Err(XrfError::InsufficientData { skipped: failed, .. }) => {
                    excluded.push(exclude(ExclusionReason::NoUsableSpectra));
                    failed
                }
                Err(e) => return Err(e),
            };
            skipped.extend(failed.into_iter().map(|(spectrum, error)| SkippedSpectrum {
                standard: name.to_string(),
                spectrum,
                error,
            }));
        }

        let calibration = self.regressor.regress(element, summaries, choice)?;

        Ok(CalibrationBuild {
            calibration,
            excluded,
            skipped,
        })
    }

    pub fn grade_calibration(&self, calibration: &Calibration) -> GradeReport {
        self.evaluator.grade(calibration)
    }

    pub fn back_calculate_intensity(&self, calibration: &Calibration, certified: f64) -> Result<f64> {
        self.evaluator.back_calculate_intensity(calibration, certified)
    }
}

/// 强度 -> 浓度；未校准元素使用默认单位校准
pub fn apply_sample_intensity(store: &CalibrationStore, element: Element, intensity: f64) -> f64 {
    store.get(element).apply(intensity)
}
