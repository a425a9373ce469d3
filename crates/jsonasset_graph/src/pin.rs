// SPDX-License-Identifier: MIT OR Apache-2.0
//! Expression pins: the input side of a connection between two nodes.
//!
//! A pin names the upstream node, which of its outputs feeds the pin and an
//! optional channel mask. Material inputs additionally carry a constant that
//! is used when no node is connected.

use jsonasset_core::reference::export_name_of_subobject;
use jsonasset_core::structs::FallbackStructCodec;
use jsonasset_core::{
    CompareContext, FieldTable, ImportResult, ObjectHandle, ObjectSerializer, Severity, StructCodec,
    StructId, StructValue, TypeRegistry, Value,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::rc::Rc;

/// Pin flavour, selecting which constant a pin can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinType {
    /// Plain expression input
    Default,
    /// Color material input
    Color,
    /// Scalar material input
    Scalar,
    /// Vector material input
    Vector,
}

/// Channel mask of a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChannelMask {
    /// Whether the mask applies at all
    pub enabled: bool,
    /// Red
    pub r: bool,
    /// Green
    pub g: bool,
    /// Blue
    pub b: bool,
    /// Alpha
    pub a: bool,
}

/// Constant carried by a material input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PinConstant {
    /// sRGB color as `[r, g, b, a]`
    Color([u8; 4]),
    /// Scalar
    Scalar(f64),
    /// Vector as `[x, y, z]`
    Vector([f64; 3]),
}

/// One input pin
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pin {
    /// Upstream node
    pub expression: Option<ObjectHandle>,
    /// Output of the upstream node
    pub output_index: i64,
    /// Input name, mostly empty
    pub input_name: String,
    /// Channel mask
    pub mask: ChannelMask,
    /// Use the constant instead of a node
    pub use_constant: bool,
    /// Constant for material inputs
    pub constant: Option<PinConstant>,
}

impl Pin {
    /// Whether a node feeds this pin
    pub fn is_connected(&self) -> bool {
        self.expression.is_some()
    }

    /// Build the pin struct value. Fields the struct does not have are
    /// left at their defaults.
    pub fn to_value(&self, registry: &TypeRegistry, struct_id: StructId) -> StructValue {
        let mut value = registry.default_struct(struct_id);
        let mut set = |name: &str, field: Value| set_field(registry, &mut value, name, field);

        set("Expression", Value::Object(self.expression));
        set("OutputIndex", Value::Int(self.output_index));
        set("InputName", Value::Name(self.input_name.clone()));
        set("Mask", Value::Int(i64::from(self.mask.enabled)));
        set("MaskR", Value::Int(i64::from(self.mask.r)));
        set("MaskG", Value::Int(i64::from(self.mask.g)));
        set("MaskB", Value::Int(i64::from(self.mask.b)));
        set("MaskA", Value::Int(i64::from(self.mask.a)));
        set("UseConstant", Value::Bool(self.use_constant));

        match &self.constant {
            Some(PinConstant::Scalar(v)) => set("Constant", Value::Float(*v)),
            Some(PinConstant::Color([r, g, b, a])) => {
                if let Some(color) = registry.find_struct("Color") {
                    let mut bytes = registry.default_struct(color);
                    for (name, channel) in [("R", r), ("G", g), ("B", b), ("A", a)] {
                        set_field(registry, &mut bytes, name, Value::Int(i64::from(*channel)));
                    }
                    set("Constant", Value::Struct(bytes));
                }
            }
            Some(PinConstant::Vector([x, y, z])) => {
                if let Some(vector) = registry.find_struct("Vector") {
                    let mut xyz = registry.default_struct(vector);
                    for (name, axis) in [("X", x), ("Y", y), ("Z", z)] {
                        set_field(registry, &mut xyz, name, Value::Float(*axis));
                    }
                    set("Constant", Value::Struct(xyz));
                }
            }
            None => {}
        }
        value
    }

    /// Read a pin back from its struct value
    pub fn from_value(registry: &TypeRegistry, value: &StructValue) -> Self {
        let field = |name: &str| get_field(registry, value, name);
        let flag = |name: &str| field(name).and_then(Value::as_int).unwrap_or(0) != 0;

        let constant = field("Constant").and_then(|c| match c {
            Value::Float(v) => Some(PinConstant::Scalar(*v)),
            Value::Struct(s) => {
                let channel = |name: &str| get_field(registry, s, name);
                match registry.struct_type(s.struct_id).name.as_str() {
                    "Color" => {
                        let byte = |name: &str| {
                            channel(name)
                                .and_then(Value::as_int)
                                .and_then(|b| u8::try_from(b).ok())
                                .unwrap_or(0)
                        };
                        Some(PinConstant::Color([byte("R"), byte("G"), byte("B"), byte("A")]))
                    }
                    "Vector" => {
                        let axis =
                            |name: &str| channel(name).and_then(Value::as_float).unwrap_or(0.0);
                        Some(PinConstant::Vector([axis("X"), axis("Y"), axis("Z")]))
                    }
                    _ => None,
                }
            }
            _ => None,
        });

        Self {
            expression: field("Expression").and_then(Value::as_object),
            output_index: field("OutputIndex").and_then(Value::as_int).unwrap_or(0),
            input_name: field("InputName").and_then(Value::as_str).unwrap_or_default().to_string(),
            mask: ChannelMask {
                enabled: flag("Mask"),
                r: flag("MaskR"),
                g: flag("MaskG"),
                b: flag("MaskB"),
                a: flag("MaskA"),
            },
            use_constant: field("UseConstant").and_then(Value::as_bool).unwrap_or(false),
            constant,
        }
    }
}

fn set_field(registry: &TypeRegistry, value: &mut StructValue, name: &str, field: Value) {
    if let Some(slot) = registry.struct_type(value.struct_id).field_index(name) {
        value.fields[slot] = field;
    }
}

fn get_field<'v>(registry: &TypeRegistry, value: &'v StructValue, name: &str) -> Option<&'v Value> {
    let slot = registry.struct_type(value.struct_id).field_index(name)?;
    value.fields.get(slot)
}

/// Name of the node a pin JSON points at. `Expression` holds a
/// package-index object; older exports carry a bare `ExpressionName`
/// instead.
pub fn expression_name(json: &Map<String, Json>) -> Option<String> {
    match json.get("Expression") {
        Some(Json::Object(reference)) => reference
            .get("ObjectName")
            .and_then(Json::as_str)
            .map(|name| export_name_of_subobject(name).to_string()),
        Some(Json::String(name)) if !name.is_empty() && name != "None" => {
            Some(export_name_of_subobject(name).to_string())
        }
        Some(Json::Null) | None => json
            .get("ExpressionName")
            .and_then(Json::as_str)
            .filter(|name| !name.is_empty() && *name != "None")
            .map(str::to_string),
        _ => None,
    }
}

fn json_flag(json: &Map<String, Json>, name: &str) -> bool {
    match json.get(name) {
        Some(Json::Bool(b)) => *b,
        Some(Json::Number(n)) => n.as_f64().map_or(false, |v| v != 0.0),
        _ => false,
    }
}

fn json_float(json: &Map<String, Json>, name: &str) -> f64 {
    json.get(name).and_then(Json::as_f64).unwrap_or(0.0)
}

/// Linear channel to an sRGB byte
fn linear_to_srgb(linear: f64) -> u8 {
    let linear = linear.clamp(0.0, 1.0);
    let srgb = if linear <= 0.003_130_8 {
        linear * 12.92
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    };
    // Clamped to [0, 255] above, so the cast cannot truncate.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let byte = (srgb * 255.0).round() as u8;
    byte
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn linear_alpha(alpha: f64) -> u8 {
    (alpha.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Build a pin from its JSON, with `node` already resolved by the caller
pub fn populate_pin(
    json: &Map<String, Json>,
    node: Option<ObjectHandle>,
    pin_type: PinType,
) -> Pin {
    let mut pin = Pin {
        expression: node,
        output_index: json.get("OutputIndex").and_then(Json::as_i64).unwrap_or(0),
        input_name: json
            .get("InputName")
            .and_then(Json::as_str)
            .filter(|name| *name != "None")
            .unwrap_or_default()
            .to_string(),
        mask: ChannelMask {
            enabled: json_flag(json, "Mask"),
            r: json_flag(json, "MaskR"),
            g: json_flag(json, "MaskG"),
            b: json_flag(json, "MaskB"),
            a: json_flag(json, "MaskA"),
        },
        ..Pin::default()
    };

    if pin_type == PinType::Default {
        return pin;
    }
    pin.use_constant = json_flag(json, "UseConstant");
    pin.constant = match (pin_type, json.get("Constant")) {
        (PinType::Scalar, Some(constant)) => constant.as_f64().map(PinConstant::Scalar),
        (PinType::Color, Some(Json::Object(rgba))) => Some(PinConstant::Color([
            linear_to_srgb(json_float(rgba, "R")),
            linear_to_srgb(json_float(rgba, "G")),
            linear_to_srgb(json_float(rgba, "B")),
            linear_alpha(rgba.get("A").and_then(Json::as_f64).unwrap_or(1.0)),
        ])),
        (PinType::Vector, Some(Json::Object(xyz))) => Some(PinConstant::Vector([
            json_float(xyz, "X"),
            json_float(xyz, "Y"),
            json_float(xyz, "Z"),
        ])),
        _ => None,
    };
    pin
}

/// Pin struct codec that also accepts the legacy `ExpressionName` shape,
/// resolving the name through the session's named scope
#[derive(Debug, Default, Clone, Copy)]
pub struct PinStructCodec;

impl StructCodec for PinStructCodec {
    fn serialize(
        &self,
        session: &mut ObjectSerializer<'_>,
        value: &StructValue,
        out: &mut Map<String, Json>,
        refs: &mut Vec<i32>,
    ) -> ImportResult<()> {
        FallbackStructCodec.serialize(session, value, out, refs)
    }

    fn deserialize(
        &self,
        session: &mut ObjectSerializer<'_>,
        value: &mut StructValue,
        json: &Map<String, Json>,
    ) -> ImportResult<()> {
        FallbackStructCodec.deserialize(session, value, json)?;

        let legacy = matches!(json.get("Expression"), None | Some(Json::Null));
        if !legacy {
            return Ok(());
        }
        let Some(name) = expression_name(json) else {
            return Ok(());
        };
        match session.scoped_object(&name) {
            Some(node) => {
                let registry = Rc::clone(session.registry());
                set_field(&registry, value, "Expression", Value::Object(Some(node)));
            }
            None => {
                let message = format!("Pin refers to unknown node {name}");
                session.report(Severity::Warning, &message);
            }
        }
        Ok(())
    }

    fn compare(
        &self,
        session: &mut ObjectSerializer<'_>,
        json: &Map<String, Json>,
        value: &StructValue,
        ctx: &mut CompareContext,
    ) -> ImportResult<bool> {
        FallbackStructCodec.compare(session, json, value, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::material::register_material_types;
    use serde_json::json;

    fn as_map(value: Json) -> Map<String, Json> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_expression_name() {
        let current = as_map(json!({
            "Expression": {
                "ObjectName": "MaterialExpressionAdd'M_Test:MaterialExpressionAdd_0'",
                "ObjectPath": "/Game/M_Test.4"
            }
        }));
        assert_eq!(expression_name(&current).as_deref(), Some("MaterialExpressionAdd_0"));

        let legacy =
            as_map(json!({"Expression": null, "ExpressionName": "MaterialExpressionAdd_1"}));
        assert_eq!(expression_name(&legacy).as_deref(), Some("MaterialExpressionAdd_1"));

        let missing = as_map(json!({"ExpressionName": "MaterialExpressionAdd_2"}));
        assert_eq!(expression_name(&missing).as_deref(), Some("MaterialExpressionAdd_2"));

        assert_eq!(expression_name(&as_map(json!({"OutputIndex": 0}))), None);
    }

    #[test]
    fn test_populate_material_inputs() {
        let node = Some(ObjectHandle(7));
        let scalar_json = as_map(json!({"UseConstant": true, "Constant": 0.5}));
        let scalar = populate_pin(&scalar_json, node, PinType::Scalar);
        assert!(scalar.use_constant);
        assert_eq!(scalar.constant, Some(PinConstant::Scalar(0.5)));
        assert_eq!(scalar.expression, node);

        let color = populate_pin(
            &as_map(json!({"Constant": {"R": 1.0, "G": 0.0, "B": 0.5, "A": 1.0}})),
            None,
            PinType::Color,
        );
        assert_eq!(color.constant, Some(PinConstant::Color([255, 0, 188, 255])));

        let plain = populate_pin(
            &as_map(json!({"OutputIndex": 2, "Mask": 1, "MaskG": 1, "Constant": 3.0})),
            node,
            PinType::Default,
        );
        assert_eq!(plain.output_index, 2);
        assert!(plain.mask.enabled && plain.mask.g && !plain.mask.r);
        assert_eq!(plain.constant, None);
    }

    #[test]
    fn test_pin_value_conversion() {
        let mut registry = TypeRegistry::new();
        let types = register_material_types(&mut registry);
        let pin = Pin {
            expression: Some(ObjectHandle(3)),
            output_index: 1,
            mask: ChannelMask {
                enabled: true,
                r: true,
                ..ChannelMask::default()
            },
            use_constant: true,
            constant: Some(PinConstant::Vector([0.0, 0.0, 1.0])),
            ..Pin::default()
        };
        let value = pin.to_value(&registry, types.vector_input);
        assert_eq!(Pin::from_value(&registry, &value), pin);

        // A plain input has no constant slot.
        let plain = pin.to_value(&registry, types.expression_input);
        let back = Pin::from_value(&registry, &plain);
        assert_eq!(back.constant, None);
        assert_eq!(back.expression, pin.expression);
    }
}
