use anyhow::{anyhow, Result};
use serde_derive::Serialize;
use sla_metrics::pipeline::AnalysisReport;
use sla_metrics::table::Table;
use std::io::Write;

#[derive(Serialize)]
struct TableInfo<'a> {
    name: &'a str,
    variants: Vec<&'a str>,
    table: &'a Table,
}

/// Write the whole report, or only `table_name`, as YAML.
pub fn dump_report_to_writer<W: Write>(
    writer: W,
    report: &AnalysisReport,
    table_name: Option<&str>,
) -> Result<()> {
    match table_name {
        None => serde_yaml::to_writer(writer, report)?,
        Some(name) => {
            let table = report.table(name).ok_or_else(|| {
                let known: Vec<&str> = report.tables().iter().map(|(name, _)| *name).collect();
                anyhow!("unknown table `{}`, expected one of {:?}", name, known)
            })?;
            let table_info = TableInfo {
                name,
                variants: report.variants().iter().map(|variant| variant.name()).collect(),
                table,
            };
            serde_yaml::to_writer(writer, &table_info)?
        }
    }
    Ok(())
}
