//! # 文件收集器
//!
//! 根据输入路径和模式收集待处理谱图文件列表。
//!
//! ## 功能
//! - 支持单文件和目录输入
//! - glob 模式匹配（逗号分隔的多模式）
//! - 递归目录搜索
//! - 自然排序：`sample_2` 排在 `sample_10` 之前
//!
//! ## 依赖关系
//! - 被 `commands/quantify.rs`, `commands/calibrate.rs` 调用
//! - 使用 `walkdir` 遍历目录, `glob` 匹配, `regex` 拆分数字段

use crate::error::{Result, XrfError};

use regex::Regex;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 默认谱图扩展名
pub const DEFAULT_PATTERN: &str = "*.csv,*.txt,*.dat,*.emsa,*.msa";

/// 文件收集器
pub struct FileCollector {
    /// 输入路径
    input: PathBuf,
    /// 匹配模式列表
    patterns: Vec<glob::Pattern>,
    /// 是否递归
    recursive: bool,
}

impl FileCollector {
    /// 创建新的文件收集器
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            patterns: Vec::new(),
            recursive: false,
        }
    }

    /// 设置匹配模式（逗号分隔的多模式）
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        self.patterns = pattern
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                glob::Pattern::new(s).map_err(|e| {
                    XrfError::InvalidArgument(format!("Invalid pattern '{}': {}", s, e))
                })
            })
            .collect::<Result<_>>()?;
        Ok(self)
    }

    /// 设置是否递归搜索
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 收集所有匹配的文件（自然排序）
    pub fn collect(&self) -> Vec<PathBuf> {
        if self.input.is_file() {
            return vec![self.input.clone()];
        }

        if !self.input.is_dir() {
            return vec![];
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };

        let mut files: Vec<PathBuf> = WalkDir::new(&self.input)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|entry| self.matches_patterns(entry.path()))
            .map(|e| e.path().to_path_buf())
            .collect();

        natural_sort(&mut files);
        files
    }

    /// 检查文件是否匹配任一模式（无模式时全部匹配）
    fn matches_patterns(&self, path: &Path) -> bool {
        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return false,
        };

        self.patterns.is_empty() || self.patterns.iter().any(|p| p.matches(filename))
    }
}

/// 展开路径 glob（如 `standards/PACS2_*.csv`），自然排序
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob::glob(pattern)
        .map_err(|e| XrfError::InvalidArgument(format!("Invalid pattern '{}': {}", pattern, e)))?;

    let mut files: Vec<PathBuf> = paths
        .filter_map(|p| p.ok())
        .filter(|p| p.is_file())
        .collect();

    if files.is_empty() {
        return Err(XrfError::NoFilesFound {
            pattern: pattern.to_string(),
        });
    }

    natural_sort(&mut files);
    Ok(files)
}

/// 文件名片段：数字按数值比较，文本忽略大小写
#[derive(Debug, PartialEq, Eq)]
enum Chunk {
    Number(u64),
    Text(String),
}

impl PartialOrd for Chunk {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Chunk {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Chunk::Number(a), Chunk::Number(b)) => a.cmp(b),
            (Chunk::Text(a), Chunk::Text(b)) => a.cmp(b),
            (Chunk::Number(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Number(_)) => Ordering::Greater,
        }
    }
}

fn natural_key(re: &Regex, path: &Path) -> Vec<Chunk> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    re.find_iter(name)
        .map(|m| {
            let s = m.as_str();
            match s.parse::<u64>() {
                Ok(n) => Chunk::Number(n),
                Err(_) => Chunk::Text(s.to_lowercase()),
            }
        })
        .collect()
}

/// 按文件名自然排序
pub fn natural_sort(files: &mut [PathBuf]) {
    let re = match Regex::new(r"\d+|\D+") {
        Ok(re) => re,
        Err(_) => {
            files.sort();
            return;
        }
    };
    files.sort_by_cached_key(|p| natural_key(&re, p));
}
