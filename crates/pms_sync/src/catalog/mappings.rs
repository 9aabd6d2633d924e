//! Field mappings from remote payloads to target table rows.
//!
//! One plain function per entity. Each reads the raw record only through the
//! defaulting accessors on [`RawRecord`], so an unexpected payload shape yields
//! NULLs rather than an error.

use chrono::{DateTime, Utc};

use super::raw::RawRecord;
use super::record::LocalRecord;

/// Conflict key column shared by every target table.
pub const PMS_ID: &str = "pms_id";

/// Foreign id that may arrive flat (`contact_id: 7`) or nested (`contact: {id: 7}`).
fn reference(raw: &RawRecord, flat: &str, nested: &str) -> Option<String> {
    raw.id(flat).or_else(|| raw.nested_id(nested))
}

fn keyed(raw: &RawRecord, synced_at: DateTime<Utc>) -> LocalRecord {
    LocalRecord::new(synced_at).text(PMS_ID, raw.id("id"))
}

pub fn appointment_type(raw: &RawRecord, synced_at: DateTime<Utc>) -> LocalRecord {
    keyed(raw, synced_at)
        .text("name", raw.text("name"))
        .int("duration_minutes", raw.int("duration"))
        .text("colour", raw.text("colour"))
        .flag("is_active", raw.flag("active"))
        .timestamp("modified_at", raw.timestamp("modified_at"))
}

pub fn appointment_status(raw: &RawRecord, synced_at: DateTime<Utc>) -> LocalRecord {
    keyed(raw, synced_at)
        .text("name", raw.text("name"))
        .flag("is_active", raw.flag("active"))
        .timestamp("modified_at", raw.timestamp("modified_at"))
}

pub fn resource(raw: &RawRecord, synced_at: DateTime<Utc>) -> LocalRecord {
    keyed(raw, synced_at)
        .text("name", raw.text("name"))
        .text("resource_type", raw.text("type"))
        .text("ownership_id", reference(raw, "ownership_id", "ownership"))
        .flag("is_active", raw.flag("active"))
        .timestamp("modified_at", raw.timestamp("modified_at"))
}

pub fn product(raw: &RawRecord, synced_at: DateTime<Utc>) -> LocalRecord {
    keyed(raw, synced_at)
        .text("code", raw.text("code"))
        .text("name", raw.text("name"))
        .text(
            "product_group",
            raw.text("product_group.name")
                .or_else(|| raw.text("product_group")),
        )
        .float("price", raw.float("price"))
        .flag("is_active", raw.flag("active"))
        .timestamp("modified_at", raw.timestamp("modified_at"))
}

pub fn contact(raw: &RawRecord, synced_at: DateTime<Utc>) -> LocalRecord {
    keyed(raw, synced_at)
        .text("code", raw.text("code"))
        .text("first_name", raw.text("first_name"))
        .text("last_name", raw.text("last_name"))
        .text("business_name", raw.text("business_name"))
        .flag("is_business", raw.flag("is_business"))
        .text("email", raw.text("email"))
        .text("phone", raw.text("phone").or_else(|| raw.text("mobile")))
        .flag("is_active", raw.flag("active"))
        .timestamp("created_at", raw.timestamp("created_at"))
        .timestamp("modified_at", raw.timestamp("modified_at"))
}

pub fn appointment(raw: &RawRecord, synced_at: DateTime<Utc>) -> LocalRecord {
    keyed(raw, synced_at)
        .timestamp("start_at", raw.timestamp("start_at"))
        .timestamp("end_at", raw.timestamp("end_at"))
        .text("type_id", reference(raw, "type_id", "type"))
        .text("status_id", reference(raw, "status_id", "status"))
        .text("patient_id", reference(raw, "animal_id", "animal"))
        .text("contact_id", reference(raw, "contact_id", "contact"))
        .json("resource_ids", raw.json_array("resources"))
        .text("description", raw.text("description"))
        .flag("is_active", raw.flag("active"))
        .timestamp("modified_at", raw.timestamp("modified_at"))
}

pub fn patient(raw: &RawRecord, synced_at: DateTime<Utc>) -> LocalRecord {
    keyed(raw, synced_at)
        .text("name", raw.text("name"))
        .text("contact_id", reference(raw, "contact_id", "contact"))
        .text("species", raw.text("species.name").or_else(|| raw.text("species")))
        .text("breed", raw.text("breed.name").or_else(|| raw.text("breed")))
        .text("sex", raw.text("sex"))
        .timestamp("date_of_birth", raw.timestamp("date_of_birth"))
        .flag("is_deceased", raw.flag("is_dead"))
        .text("microchip", raw.text("microchip_number"))
        .float("weight_kg", raw.float("weight"))
        .flag("is_active", raw.flag("active"))
        .timestamp("modified_at", raw.timestamp("modified_at"))
}

pub fn consult(raw: &RawRecord, synced_at: DateTime<Utc>) -> LocalRecord {
    keyed(raw, synced_at)
        .text("consult_number", raw.text("consult_number"))
        .text("patient_id", reference(raw, "animal_id", "animal"))
        .text("contact_id", reference(raw, "contact_id", "contact"))
        .text(
            "practitioner_id",
            reference(raw, "practitioner_id", "practitioner"),
        )
        .timestamp("started_at", raw.timestamp("date"))
        .text("reason", raw.text("reason"))
        .flag("is_finalised", raw.flag("finalised"))
        .timestamp("modified_at", raw.timestamp("modified_at"))
}

pub fn invoice(raw: &RawRecord, synced_at: DateTime<Utc>) -> LocalRecord {
    keyed(raw, synced_at)
        .text("invoice_number", raw.text("invoice_number"))
        .text("contact_id", reference(raw, "contact_id", "contact"))
        .text("consult_id", reference(raw, "consult_id", "consult"))
        .timestamp("invoice_date", raw.timestamp("date"))
        .float("total", raw.float("total"))
        .float("amount_due", raw.float("amount_due"))
        .text("status", raw.text("status"))
        .flag("is_active", raw.flag("active"))
        .timestamp("modified_at", raw.timestamp("modified_at"))
}

pub fn invoice_line(raw: &RawRecord, synced_at: DateTime<Utc>) -> LocalRecord {
    keyed(raw, synced_at)
        .text("invoice_id", reference(raw, "invoice_id", "invoice"))
        .text("product_id", reference(raw, "product_id", "product"))
        .text("consult_id", reference(raw, "consult_id", "consult"))
        .text("description", raw.text("comment").or_else(|| raw.text("description")))
        .float("quantity", raw.float("quantity"))
        .float("unit_price", raw.float("price_each"))
        .float("line_total", raw.float("total"))
        .timestamp("modified_at", raw.timestamp("modified_at"))
}
