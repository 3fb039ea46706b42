//! # Example Populator
//!
//! Builds a sample instance of any message type from its descriptor alone, to show
//! the *shape* of a request in the documentation page.
//!
//! The walk is deterministic:
//!
//! * Singular message fields get a nested populated instance.
//! * Repeated message fields (and maps with message values) get exactly one element.
//! * For every `oneof` group only the first declared field is set.
//! * Scalars and enums keep their default value.
//!
//! Well-known types (`google.protobuf.*`) have their own JSON representation, so they
//! are never expanded. A message type that is already being populated further up the
//! current path is left unset, which keeps self-referential schemas finite.
use crate::message::MessageType;
use prost_reflect::{DynamicMessage, FieldDescriptor, Kind, MapKey, MessageDescriptor, Value};
use std::collections::HashMap;

const WELL_KNOWN_PACKAGE: &str = "google.protobuf";

// No default instance of these serializes to valid JSON.
const UNSET_WELL_KNOWN_TYPES: &[&str] = &["google.protobuf.Any", "google.protobuf.Value"];

/// Builds a fully populated example instance of `message`.
pub fn populate(message: &MessageType) -> DynamicMessage {
    let mut path = Vec::new();
    populate_message(message.descriptor(), &mut path)
}

fn populate_message(desc: &MessageDescriptor, path: &mut Vec<String>) -> DynamicMessage {
    let mut instance = DynamicMessage::new(desc.clone());
    path.push(desc.full_name().to_string());

    for field in desc.fields() {
        if let Some(oneof) = field.containing_oneof()
            && !oneof.is_synthetic()
        {
            let is_first = oneof
                .fields()
                .next()
                .is_some_and(|first| first.number() == field.number());

            if is_first && !is_unset_well_known(&field) {
                let value = populate_singular(&field, path)
                    .unwrap_or_else(|| Value::default_value_for_field(&field));
                instance.set_field(&field, value);
            }
            continue;
        }

        if let Some(value) = populate_field(&field, path) {
            instance.set_field(&field, value);
        }
    }

    path.pop();
    instance
}

/// Returns the value to store in `field`, or `None` to leave it at its default.
fn populate_field(field: &FieldDescriptor, path: &mut Vec<String>) -> Option<Value> {
    if field.is_map() {
        let entry = field.kind();
        let entry = entry.as_message()?;
        let key_field = entry.map_entry_key_field();
        let value_field = entry.map_entry_value_field();

        let value = populate_singular(&value_field, path)?;
        let key = MapKey::default_value(&key_field.kind());

        return Some(Value::Map(HashMap::from([(key, value)])));
    }

    if field.is_list() {
        let element = populate_singular(field, path)?;
        return Some(Value::List(vec![element]));
    }

    populate_singular(field, path)
}

/// Populates one message value of `field`'s type. Scalars yield `None`.
fn populate_singular(field: &FieldDescriptor, path: &mut Vec<String>) -> Option<Value> {
    let Kind::Message(nested) = field.kind() else {
        return None;
    };

    if path.iter().any(|ancestor| ancestor == nested.full_name()) {
        return None;
    }

    if is_unset_well_known(field) {
        return None;
    }
    if nested.package_name() == WELL_KNOWN_PACKAGE {
        return Some(Value::Message(DynamicMessage::new(nested)));
    }

    Some(Value::Message(populate_message(&nested, path)))
}

fn is_unset_well_known(field: &FieldDescriptor) -> bool {
    match field.kind() {
        Kind::Message(nested) => UNSET_WELL_KNOWN_TYPES.contains(&nested.full_name()),
        _ => false,
    }
}
