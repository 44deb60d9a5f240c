//! # 批量执行器
//!
//! 并行执行批量谱图处理任务。
//!
//! ## 功能
//! - 基于 rayon 的并行迭代，结果顺序与输入顺序一致
//! - 进度条显示（每完成一项推进一次，不影响结果）
//! - 单项失败只记录，不中断整批
//!
//! ## 依赖关系
//! - 被 `commands/quantify.rs` 调用
//! - 使用 `utils/progress.rs` 创建进度条
//! - 使用 `rayon` 进行并行计算

use crate::error::{Result, XrfError};
use crate::utils::progress;

use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 单个文件处理结果
#[derive(Debug, Clone)]
pub enum ProcessResult<T> {
    /// 处理成功
    Success(String, T),
    /// 跳过（如拟合 R² 低于阈值）
    Skipped(String, String),
    /// 处理失败
    Failed(String, String), // (文件路径, 错误信息)
}

/// 批量处理结果统计
#[derive(Debug)]
pub struct BatchResult<T> {
    /// 成功项（按输入顺序）
    pub outputs: Vec<(String, T)>,
    /// 跳过详情
    pub skips: Vec<(String, String)>,
    /// 失败详情
    pub failures: Vec<(String, String)>,
}

impl<T> Default for BatchResult<T> {
    fn default() -> Self {
        Self {
            outputs: Vec::new(),
            skips: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> BatchResult<T> {
    /// 合并处理结果
    pub fn merge(&mut self, result: ProcessResult<T>) {
        match result {
            ProcessResult::Success(path, value) => self.outputs.push((path, value)),
            ProcessResult::Skipped(path, why) => self.skips.push((path, why)),
            ProcessResult::Failed(path, err) => self.failures.push((path, err)),
        }
    }

    pub fn success(&self) -> usize {
        self.outputs.len()
    }

    pub fn skipped(&self) -> usize {
        self.skips.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// 总处理数量
    pub fn total(&self) -> usize {
        self.success() + self.skipped() + self.failed()
    }
}

/// 批量执行器
pub struct BatchRunner {
    /// 并行作业数
    jobs: usize,
    /// 是否显示进度条
    show_progress: bool,
}

impl BatchRunner {
    /// 创建新的批量执行器，`jobs = 0` 使用全部 CPU
    pub fn new(jobs: usize) -> Self {
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        Self {
            jobs,
            show_progress: true,
        }
    }

    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// 并行处理文件列表
    pub fn run<T, F>(&self, files: &[PathBuf], processor: F) -> Result<BatchResult<T>>
    where
        T: Send,
        F: Fn(&PathBuf) -> ProcessResult<T> + Sync + Send,
    {
        let total = files.len();
        let pb = progress::create_progress_bar(total as u64, "Fitting");
        if !self.show_progress {
            pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        }

        let failed_count = AtomicUsize::new(0);

        // 配置 rayon 线程池
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| XrfError::Other(format!("Failed to start worker pool: {}", e)))?;

        let results: Vec<ProcessResult<T>> = pool.install(|| {
            files
                .par_iter()
                .map(|file| {
                    let result = processor(file);

                    if let ProcessResult::Failed(_, _) = &result {
                        let n = failed_count.fetch_add(1, Ordering::Relaxed) + 1;
                        pb.set_message(format!("Fitting ({} failed)", n));
                    }

                    pb.inc(1);
                    result
                })
                .collect()
        });

        pb.finish_and_clear();

        // 汇总结果
        let mut batch_result = BatchResult::default();
        for result in results {
            batch_result.merge(result);
        }

        Ok(batch_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_preserved() {
        let files: Vec<PathBuf> = (0..50).map(|i| PathBuf::from(format!("f{}", i))).collect();
        let result = BatchRunner::new(4)
            .quiet()
            .run(&files, |p| {
                let name = p.display().to_string();
                let index: usize = name[1..].parse().unwrap();
                match index % 10 {
                    3 => ProcessResult::Failed(name, "boom".to_string()),
                    7 => ProcessResult::Skipped(name, "low r2".to_string()),
                    _ => ProcessResult::Success(name, index),
                }
            })
            .unwrap();

        assert_eq!(result.total(), 50);
        assert_eq!(result.failed(), 5);
        assert_eq!(result.skipped(), 5);
        let indices: Vec<usize> = result.outputs.iter().map(|(_, v)| *v).collect();
        let mut sorted = indices.clone();
        sorted.sort_unstable();
        assert_eq!(indices, sorted);
    }
}
