//! Entity catalog: what to pull from the remote platform, where to put it and
//! in which order.
//!
//! The catalog is an immutable value built once at startup and handed to the
//! sync engine. Entities are ordered by [`Volume`]: cheap reference data first,
//! operational data next, large clinical and billing tables last, so a run cut
//! short by its time budget still keeps the foundational tables fresh.

pub mod mappings;
mod raw;
mod record;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use mappings::PMS_ID;
pub use raw::RawRecord;
pub use record::{LAST_SYNCED_AT, LocalRecord};

/// Pure mapping from a remote record to a target table row.
pub type MapFn = fn(&RawRecord, DateTime<Utc>) -> LocalRecord;

/// Size class of an entity. Declaration order is priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Volume {
    /// Small configuration tables.
    Reference,
    /// Medium day-to-day tables.
    Operational,
    /// Large tables; the only ones eligible for incremental fetches.
    Large,
}

impl std::fmt::Display for Volume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Volume::Reference => write!(f, "reference"),
            Volume::Operational => write!(f, "operational"),
            Volume::Large => write!(f, "large"),
        }
    }
}

/// How one remote entity is mirrored.
#[derive(Debug, Clone)]
pub struct EntityDefinition {
    /// Short name used in results and on the command line.
    pub name: &'static str,
    /// Path under the API base, e.g. `v1/animal`.
    pub source_path: &'static str,
    pub target_table: &'static str,
    /// Column that uniquely identifies a remote record in `target_table`.
    pub conflict_key: &'static str,
    pub volume: Volume,
    pub map: MapFn,
}

impl EntityDefinition {
    pub fn is_large_volume(&self) -> bool {
        self.volume == Volume::Large
    }
}

/// Ordered, immutable set of entity definitions.
#[derive(Debug, Clone)]
pub struct Catalog {
    entities: Vec<EntityDefinition>,
}

impl Catalog {
    /// Build a catalog. Entities are sorted by volume; declaration order is kept
    /// within a volume.
    pub fn new(mut entities: Vec<EntityDefinition>) -> Self {
        entities.sort_by_key(|e| e.volume);
        Self { entities }
    }

    /// The ten entities mirrored from the practice-management platform.
    pub fn standard() -> Self {
        Self::new(vec![
            definition(
                "appointment_types",
                "v1/appointmenttype",
                "pms_appointment_types",
                Volume::Reference,
                mappings::appointment_type,
            ),
            definition(
                "appointment_statuses",
                "v1/appointmentstatus",
                "pms_appointment_statuses",
                Volume::Reference,
                mappings::appointment_status,
            ),
            definition(
                "resources",
                "v1/resource",
                "pms_resources",
                Volume::Reference,
                mappings::resource,
            ),
            definition(
                "products",
                "v1/product",
                "pms_products",
                Volume::Reference,
                mappings::product,
            ),
            definition(
                "contacts",
                "v1/contact",
                "pms_contacts",
                Volume::Operational,
                mappings::contact,
            ),
            definition(
                "appointments",
                "v1/appointment",
                "pms_appointments",
                Volume::Operational,
                mappings::appointment,
            ),
            definition(
                "patients",
                "v1/animal",
                "pms_patients",
                Volume::Large,
                mappings::patient,
            ),
            definition(
                "consults",
                "v1/consult",
                "pms_consults",
                Volume::Large,
                mappings::consult,
            ),
            definition(
                "invoices",
                "v1/invoice",
                "pms_invoices",
                Volume::Large,
                mappings::invoice,
            ),
            definition(
                "invoice_lines",
                "v1/invoiceline",
                "pms_invoice_lines",
                Volume::Large,
                mappings::invoice_line,
            ),
        ])
    }

    pub fn in_priority_order(&self) -> impl Iterator<Item = &EntityDefinition> {
        self.entities.iter()
    }

    pub fn get(&self, name: &str) -> Option<&EntityDefinition> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Resolve a subset of entities by name, still in priority order.
    ///
    /// Returns the first unknown name as the error.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&EntityDefinition>, String> {
        if let Some(unknown) = names.iter().find(|n| self.get(n.as_ref()).is_none()) {
            return Err(unknown.as_ref().to_string());
        }
        Ok(self
            .entities
            .iter()
            .filter(|e| names.iter().any(|n| n.as_ref() == e.name))
            .collect())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entities.iter().map(|e| e.name).collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

fn definition(
    name: &'static str,
    source_path: &'static str,
    target_table: &'static str,
    volume: Volume,
    map: MapFn,
) -> EntityDefinition {
    EntityDefinition {
        name,
        source_path,
        target_table,
        conflict_key: PMS_ID,
        volume,
        map,
    }
}
