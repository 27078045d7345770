//! Color entry extraction from export trees.
//!
//! Only two module shapes are recognized, described as data in
//! [`MODULE_SHAPES`]. Everything else in the tree is ignored here and
//! passed through verbatim on write-back.
//!
//! Accepted layouts, from the UAssetAPI-style export down to plain objects:
//!
//! ```text
//! { "Exports": [                                  or a bare export array
//!     { "ObjectName": "ParticleModuleColorOverLife_0",
//!       "Data": [                                 or "Properties", array or object
//!         { "Name": "ColorOverLife",
//!           "Value": [                            or an object keyed by field
//!             { "Name": "MinValueVec",
//!               "Value": [ { "Value": { "X": 0.1, "Y": 0.2, "Z": 0.3 } } ] } ] } ] } ] }
//! ```

use serde_json::Value;
use tracing::debug;

use crate::color::ColorVector;
use crate::document::DocumentId;
use crate::document::JsonDocument;
use crate::document::NodeRef;
use crate::document::pointer_push;
use crate::entry::ColorEntry;
use crate::entry::ColorMode;

/// Tag of a recognized module shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    ColorOverLife,
    StartColor,
}

/// One vector field of a module and the mode it yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorField {
    pub name: &'static str,
    pub mode: ColorMode,
}

/// Declarative description of a color-bearing module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleShape {
    pub kind: ModuleKind,
    /// Prefix of the export's `ObjectName`.
    pub object_prefix: &'static str,
    /// Property holding the vectors.
    pub property: &'static str,
    pub vectors: [VectorField; 2],
}

const MIN_MAX_VECTORS: [VectorField; 2] = [
    VectorField {
        name: "MinValueVec",
        mode: ColorMode::Min,
    },
    VectorField {
        name: "MaxValueVec",
        mode: ColorMode::Max,
    },
];

/// Recognized shapes in match order. `ParticleModuleColorOverLife` must be
/// tried before its prefix `ParticleModuleColor`.
pub const MODULE_SHAPES: [ModuleShape; 2] = [
    ModuleShape {
        kind: ModuleKind::ColorOverLife,
        object_prefix: "ParticleModuleColorOverLife",
        property: "ColorOverLife",
        vectors: MIN_MAX_VECTORS,
    },
    ModuleShape {
        kind: ModuleKind::StartColor,
        object_prefix: "ParticleModuleColor",
        property: "StartColor",
        vectors: MIN_MAX_VECTORS,
    },
];

impl ModuleShape {
    /// First shape whose prefix matches `object_name`.
    pub fn for_object_name(object_name: &str) -> Option<&'static ModuleShape> {
        MODULE_SHAPES
            .iter()
            .find(|shape| object_name.starts_with(shape.object_prefix))
    }
}

/// Extract every color entry of one document, in tree order.
pub fn extract_entries(id: DocumentId, document: &JsonDocument) -> Vec<ColorEntry> {
    let (exports, base) = match document.root() {
        Value::Object(map) => match map.get("Exports") {
            Some(Value::Array(exports)) => (exports, "/Exports"),
            _ => return Vec::new(),
        },
        Value::Array(exports) => (exports, ""),
        _ => return Vec::new(),
    };

    let mut entries = Vec::new();
    for (idx, export) in exports.iter().enumerate() {
        let Some(object_name) = export.get("ObjectName").and_then(Value::as_str) else {
            continue;
        };
        let Some(shape) = ModuleShape::for_object_name(object_name) else {
            continue;
        };
        let export_ptr = format!("{base}/{idx}");
        extract_module(
            id,
            document,
            shape,
            object_name,
            export,
            &export_ptr,
            &mut entries,
        );
    }
    entries
}

/// Shared routine for every module shape.
fn extract_module(
    id: DocumentId,
    document: &JsonDocument,
    shape: &ModuleShape,
    object_name: &str,
    export: &Value,
    export_ptr: &str,
    out: &mut Vec<ColorEntry>,
) {
    let Some((block_key, block)) = ["Data", "Properties"]
        .into_iter()
        .find_map(|key| export.get(key).map(|block| (key, block)))
    else {
        return;
    };
    let block_ptr = pointer_push(export_ptr, block_key);

    for (prop_ptr, prop) in named_children(block, shape.property, &block_ptr) {
        let (fields, fields_ptr) = match prop.get("Value") {
            Some(value) => (value, pointer_push(&prop_ptr, "Value")),
            None => (prop, prop_ptr.clone()),
        };

        for field in shape.vectors {
            // Later duplicates of a field win.
            let Some((field_ptr, field_node)) =
                named_children(fields, field.name, &fields_ptr).pop()
            else {
                continue;
            };
            let Some((vec_ptr, vec_node)) = vector_node(field_node, &field_ptr) else {
                debug!(
                    document = %document.json_path().display(),
                    pointer = %field_ptr,
                    module = object_name,
                    "skipping malformed vector field: no {{X,Y,Z}} node"
                );
                continue;
            };
            match ColorVector::from_json(vec_node) {
                Ok(color) => out.push(ColorEntry::new(
                    document.json_path(),
                    object_name,
                    field.mode,
                    color,
                    NodeRef {
                        document: id,
                        pointer: vec_ptr,
                    },
                )),
                Err(reason) => debug!(
                    document = %document.json_path().display(),
                    pointer = %vec_ptr,
                    module = object_name,
                    %reason,
                    "skipping malformed vector node"
                ),
            }
        }
    }
}

/// Children of `container` named `name`: array items whose `Name` matches,
/// or the object member with that key.
fn named_children<'a>(container: &'a Value, name: &str, base: &str) -> Vec<(String, &'a Value)> {
    match container {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.get("Name").and_then(Value::as_str) == Some(name))
            .map(|(idx, item)| (pointer_push(base, &idx.to_string()), item))
            .collect(),
        Value::Object(map) => map
            .get(name)
            .map(|child| vec![(pointer_push(base, name), child)])
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Locate the `{X,Y,Z}` object of a vector field descriptor.
fn vector_node<'a>(field: &'a Value, field_ptr: &str) -> Option<(String, &'a Value)> {
    match field.get("Value") {
        // UAssetAPI struct wrapper: Value[0].Value
        Some(Value::Array(items)) => {
            let inner = items.first()?.get("Value")?;
            let ptr = pointer_push(&pointer_push(&pointer_push(field_ptr, "Value"), "0"), "Value");
            Some((ptr, inner))
        }
        Some(inner @ Value::Object(_)) => Some((pointer_push(field_ptr, "Value"), inner)),
        Some(_) => None,
        None => {
            let is_vector = field.is_object()
                && ["X", "Y", "Z"].iter().any(|k| field.get(k).is_some());
            is_vector.then(|| (field_ptr.to_string(), field))
        }
    }
}
