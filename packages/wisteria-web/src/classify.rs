//! The property/attribute classification table (§6, §4.5): which attribute-binding keys are
//! written as DOM properties (`value`, `checked`, ...) rather than plain attributes, and how.
//!
//! Seeded with the element-specific keys §4.5 calls out by name; "open to extension at startup"
//! is [`add_property_alias`], which callers run once during app setup before any binding reads
//! the table.

use std::cell::RefCell;
use std::collections::HashMap;

use wisteria_core::bindings::{ClassificationTable, PropertyKind};

thread_local! {
    static TABLE: RefCell<ClassificationTable> = RefCell::new(default_table());
}

fn default_table() -> ClassificationTable {
    let mut table: HashMap<&'static str, PropertyKind> = HashMap::new();
    // String-like: fall back to `""` when nullish, per §4.5.
    table.insert("value", PropertyKind::StringProperty);
    // Boolean-like: fall back to `false` when nullish, per §4.5.
    table.insert("checked", PropertyKind::BoolProperty);
    table.insert("selected", PropertyKind::BoolProperty);
    table.insert("disabled", PropertyKind::BoolProperty);
    table.insert("readonly", PropertyKind::BoolProperty);
    table.insert("multiple", PropertyKind::BoolProperty);
    table.insert("muted", PropertyKind::BoolProperty);
    table
}

/// Looks up how `name` should be written: as a property per the startup-extensible table, or as
/// a plain attribute (the default for anything not in the table).
pub fn classify(name: &str) -> PropertyKind {
    TABLE.with(|table| {
        table
            .borrow()
            .get(name)
            .copied()
            .unwrap_or(PropertyKind::Attribute)
    })
}

/// Registers (or overrides) how `name` is classified. Affects every binding created afterwards;
/// bindings already wired up keep whatever classification they resolved at bind time.
pub fn add_property_alias(name: &'static str, kind: PropertyKind) {
    TABLE.with(|table| {
        table.borrow_mut().insert(name, kind);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_keys_classify_as_properties() {
        assert_eq!(classify("value"), PropertyKind::StringProperty);
        assert_eq!(classify("checked"), PropertyKind::BoolProperty);
        assert_eq!(classify("disabled"), PropertyKind::BoolProperty);
    }

    #[test]
    fn unknown_keys_default_to_attribute() {
        assert_eq!(classify("href"), PropertyKind::Attribute);
    }

    #[test]
    fn add_property_alias_extends_the_table_at_runtime() {
        assert_eq!(classify("data-custom-prop"), PropertyKind::Attribute);
        add_property_alias("data-custom-prop", PropertyKind::StringProperty);
        assert_eq!(classify("data-custom-prop"), PropertyKind::StringProperty);
    }
}
