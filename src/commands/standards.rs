//! # standards 子命令实现
//!
//! 标准样品目录：列出、添加自定义、删除、启用与停用。
//!
//! ## 依赖关系
//! - 使用 `cli/standards.rs` 定义的子命令
//! - 使用 `xrf/catalog.rs`

use super::open_catalog;
use crate::cli::standards::{StandardsArgs, StandardsCommands};
use crate::cli::GlobalArgs;
use crate::error::Result;
use crate::models::Element;
use crate::utils::output;
use crate::xrf::{parse_concentration, StandardCatalog};

use tabled::{Table, Tabled};

#[derive(Tabled)]
struct StandardRow {
    #[tabled(rename = "Standard")]
    name: String,
    #[tabled(rename = "Source")]
    source: &'static str,
    #[tabled(rename = "Enabled")]
    enabled: &'static str,
    #[tabled(rename = "Certified values (ppm)")]
    values: String,
}

/// 执行 standards 命令
pub fn execute(args: StandardsArgs, global: &GlobalArgs) -> Result<()> {
    let mut catalog = open_catalog(global);

    match args.command {
        StandardsCommands::List { element } => list(&catalog, element),
        StandardsCommands::Add {
            name,
            concentrations,
        } => {
            let values = concentrations
                .iter()
                .map(|(element, text)| -> Result<(Element, f64)> {
                    Ok((*element, parse_concentration(text)?))
                })
                .collect::<Result<Vec<_>>>()?;
            catalog.add_custom(&name, values)?;
            output::print_success(&format!("Added standard '{}'", name.trim()));
            Ok(())
        }
        StandardsCommands::Remove { name } => {
            catalog.remove_custom(&name)?;
            output::print_success(&format!("Removed standard '{}'", name));
            Ok(())
        }
        StandardsCommands::Enable { name } => {
            catalog.set_enabled(&name, true)?;
            output::print_success(&format!("Enabled '{}'", name));
            Ok(())
        }
        StandardsCommands::Disable { name } => {
            catalog.set_enabled(&name, false)?;
            output::print_success(&format!("Disabled '{}'", name));
            Ok(())
        }
    }
}

fn list(catalog: &StandardCatalog, element: Option<Element>) -> Result<()> {
    match element {
        Some(el) => output::print_header(&format!("Standards certified for {}", el)),
        None => output::print_header("Reference Standards"),
    }

    let rows: Vec<StandardRow> = catalog
        .standards()
        .iter()
        .filter(|s| element.map_or(true, |el| s.certified(el).is_some()))
        .map(|s| StandardRow {
            name: s.name.clone(),
            source: if s.builtin { "built-in" } else { "custom" },
            enabled: if catalog.is_enabled(&s.name) { "yes" } else { "no" },
            values: match element {
                Some(el) => s
                    .certified(el)
                    .map(|v| format!("{}: {:.2}", el, v))
                    .unwrap_or_default(),
                None => s
                    .concentrations
                    .iter()
                    .map(|(el, v)| format!("{}: {}", el, v))
                    .collect::<Vec<_>>()
                    .join(", "),
            },
        })
        .collect();

    if rows.is_empty() {
        output::print_info("No matching standards");
        return Ok(());
    }
    println!("{}", Table::new(&rows));

    if let Some(el) = element {
        let usable = catalog.standards_for(el).len();
        if usable < 2 {
            output::print_warning(&format!(
                "{} has only {} enabled standard(s); at least 2 are needed to calibrate",
                el, usable
            ));
        }
    } else {
        output::print_info(&format!(
            "{} of {} standards enabled",
            catalog.enabled_standards().len(),
            catalog.standards().len()
        ));
        let elements: Vec<String> = catalog
            .calibratable_elements()
            .iter()
            .map(|e| e.to_string())
            .collect();
        output::print_info(&format!("Calibratable elements: {}", elements.join(", ")));
    }
    Ok(())
}
