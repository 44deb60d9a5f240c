//! # 标准样品重复测量汇总
//!
//! 对同一 (标准样品, 元素) 的 N 条重复谱图逐条拟合，汇总均值/标准差/RSD。
//! 拟合失败的谱图被跳过并以结构化结果返回给调用方；高 RSD 不做剔除。
//!
//! ## 依赖关系
//! - 被 `xrf/engine.rs`, `commands/calibrate.rs` 调用
//! - 使用 `xrf/fitter.rs`, `xrf/stats.rs`

use crate::error::{FitError, Result, XrfError};
use crate::models::{Element, PeakChoice, Spectrum, StandardSummary};
use crate::xrf::fitter::{PeakFitResult, PeakFitter};

/// 单条重复谱图的处理结果
#[derive(Debug, Clone)]
pub enum ReplicateOutcome {
    Fitted {
        spectrum: String,
        result: PeakFitResult,
    },
    Skipped {
        spectrum: String,
        error: FitError,
    },
}

/// 汇总结果：统计量 + 被跳过的谱图
#[derive(Debug, Clone)]
pub struct AggregateOutcome {
    pub summary: StandardSummary,
    pub skipped: Vec<(String, FitError)>,
}

/// 标准样品汇总器
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardAggregator {
    fitter: PeakFitter,
}

impl StandardAggregator {
    pub fn new(fitter: PeakFitter) -> Self {
        Self { fitter }
    }

    pub fn aggregate(
        &self,
        standard_name: &str,
        certified_concentration: f64,
        spectra: &[Spectrum],
        element: Element,
        choice: PeakChoice,
    ) -> Result<AggregateOutcome> {
        self.aggregate_with_progress(
            standard_name,
            certified_concentration,
            spectra,
            element,
            choice,
            |_| {},
        )
    }

    /// 每处理完一条谱图回调一次；回调不影响计算结果
    pub fn aggregate_with_progress<F>(
        &self,
        standard_name: &str,
        certified_concentration: f64,
        spectra: &[Spectrum],
        element: Element,
        choice: PeakChoice,
        mut on_replicate: F,
    ) -> Result<AggregateOutcome>
    where
        F: FnMut(&ReplicateOutcome),
    {
        let profile = element.definition().profile(choice)?;

        let outcomes: Vec<ReplicateOutcome> = spectra
            .iter()
            .map(|spectrum| {
                let outcome = match self.fitter.fit_profile(spectrum, profile) {
                    Ok(result) => ReplicateOutcome::Fitted {
                        spectrum: spectrum.name.clone(),
                        result,
                    },
                    Err(error) => ReplicateOutcome::Skipped {
                        spectrum: spectrum.name.clone(),
                        error,
                    },
                };
                on_replicate(&outcome);
                outcome
            })
            .collect();

        summarize(standard_name, certified_concentration, element, outcomes)
    }
}

/// 从已完成的拟合结果汇总（允许调用方并行拟合）
pub fn summarize(
    standard_name: &str,
    certified_concentration: f64,
    element: Element,
    outcomes: Vec<ReplicateOutcome>,
) -> Result<AggregateOutcome> {
    let mut intensities = Vec::new();
    let mut skipped = Vec::new();

    for outcome in outcomes {
        match outcome {
            ReplicateOutcome::Fitted { result, .. } => {
                intensities.push(result.integrated_intensity)
            }
            ReplicateOutcome::Skipped { spectrum, error } => skipped.push((spectrum, error)),
        }
    }

    match StandardSummary::from_intensities(standard_name, certified_concentration, intensities) {
        Some(summary) => Ok(AggregateOutcome { summary, skipped }),
        None => Err(XrfError::InsufficientData {
            standard: standard_name.to_string(),
            element: element.to_string(),
            skipped,
        }),
    }
}
