//! The entity catalog, in sync order.

use pms_sync::catalog::{Catalog, EntityDefinition};
use tabled::{Table, Tabled, settings::Style};

use super::shared::OutputFormat;

#[derive(Debug, Clone, serde::Serialize, Tabled)]
struct EntityDisplay {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Entity")]
    name: &'static str,
    #[tabled(rename = "Source path")]
    source_path: &'static str,
    #[tabled(rename = "Table")]
    target_table: &'static str,
    #[tabled(rename = "Key")]
    conflict_key: &'static str,
    #[tabled(rename = "Volume")]
    volume: String,
}

impl EntityDisplay {
    fn new(position: usize, entity: &EntityDefinition) -> Self {
        Self {
            position,
            name: entity.name,
            source_path: entity.source_path,
            target_table: entity.target_table,
            conflict_key: entity.conflict_key,
            volume: entity.volume.to_string(),
        }
    }
}

fn displays(catalog: &Catalog) -> Vec<EntityDisplay> {
    catalog
        .in_priority_order()
        .enumerate()
        .map(|(i, entity)| EntityDisplay::new(i + 1, entity))
        .collect()
}

pub(crate) fn handle_entities(output: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let rows = displays(&Catalog::standard());
    match output {
        OutputFormat::Table => {
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
    }
    Ok(())
}
