//! # elements 子命令实现
//!
//! 列出元素谱线表。
//!
//! ## 依赖关系
//! - 使用 `models/element.rs`

use crate::error::Result;
use crate::models::{Element, PeakProfile};
use crate::utils::output;

use tabled::{Table, Tabled};

#[derive(Tabled)]
struct ElementRow {
    #[tabled(rename = "Element")]
    symbol: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Primary")]
    primary: String,
    #[tabled(rename = "Alternative")]
    alternative: String,
}

fn describe(profile: &PeakProfile) -> String {
    format!(
        "{} {:.2} keV (fit {}, integrate {})",
        profile.line, profile.center_energy, profile.peak_region, profile.integration_region
    )
}

/// 执行 elements 命令
pub fn execute() -> Result<()> {
    output::print_header("Supported Elements");

    let rows: Vec<ElementRow> = Element::ALL
        .iter()
        .map(|e| {
            let def = e.definition();
            ElementRow {
                symbol: def.symbol().to_string(),
                name: def.name.to_string(),
                primary: describe(&def.primary),
                alternative: def
                    .alternative
                    .as_ref()
                    .map(describe)
                    .unwrap_or_else(|| "-".to_string()),
            }
        })
        .collect();

    println!("{}", Table::new(&rows));
    Ok(())
}
