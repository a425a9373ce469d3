// SPDX-License-Identifier: MIT OR Apache-2.0
//! Struct codecs.
//!
//! Most structs go through [`FallbackStructCodec`], which walks the field
//! table. Types with a compact wire form register their own codec with the
//! [`PropertySerializer`](crate::property::PropertySerializer).

use crate::compare::CompareContext;
use crate::diagnostics::Severity;
use crate::error::{ImportError, ImportResult};
use crate::reflect::{FieldTable, StructId};
use crate::table::ObjectSerializer;
use crate::value::{StructValue, Value};
use serde_json::{Map, Value as Json};
use std::rc::Rc;
use uuid::Uuid;

/// Converts one struct type between its value and JSON forms
pub trait StructCodec {
    /// Write the struct's fields into `out`
    fn serialize(
        &self,
        session: &mut ObjectSerializer<'_>,
        value: &StructValue,
        out: &mut Map<String, Json>,
        refs: &mut Vec<i32>,
    ) -> ImportResult<()>;

    /// Read fields from `json` into `value`
    fn deserialize(
        &self,
        session: &mut ObjectSerializer<'_>,
        value: &mut StructValue,
        json: &Map<String, Json>,
    ) -> ImportResult<()>;

    /// Whether `value` already matches `json`
    fn compare(
        &self,
        session: &mut ObjectSerializer<'_>,
        json: &Map<String, Json>,
        value: &StructValue,
        ctx: &mut CompareContext,
    ) -> ImportResult<bool>;
}

/// Field-walking codec used when no specific codec is registered
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackStructCodec;

impl StructCodec for FallbackStructCodec {
    fn serialize(
        &self,
        session: &mut ObjectSerializer<'_>,
        value: &StructValue,
        out: &mut Map<String, Json>,
        refs: &mut Vec<i32>,
    ) -> ImportResult<()> {
        let registry = Rc::clone(session.registry());
        let fields = registry.struct_type(value.struct_id).fields();
        for (field, slot) in fields.iter().zip(&value.fields) {
            if !session.properties().should_serialize(field) {
                continue;
            }
            let json = session.serialize_property(field, slot, refs)?;
            out.insert(field.name.clone(), json);
        }
        Ok(())
    }

    fn deserialize(
        &self,
        session: &mut ObjectSerializer<'_>,
        value: &mut StructValue,
        json: &Map<String, Json>,
    ) -> ImportResult<()> {
        let registry = Rc::clone(session.registry());
        let def = registry.struct_type(value.struct_id);
        for (field, slot) in def.fields().iter().zip(value.fields.iter_mut()) {
            if !session.properties().should_serialize(field) {
                continue;
            }
            let Some(item) = json.get(&field.name) else {
                continue;
            };
            let mut scratch = slot.clone();
            match session.deserialize_property(field, item, &mut scratch) {
                Ok(()) => *slot = scratch,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    let message = format!("Skipping field {} of {}: {}", field.name, def.name, e);
                    session.report(Severity::Warning, &message);
                }
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
        let registry = Rc::clone(session.registry());
        let fields = registry.struct_type(value.struct_id).fields();
        for (field, slot) in fields.iter().zip(&value.fields) {
            if !session.properties().should_serialize(field) {
                continue;
            }
            let Some(item) = json.get(&field.name) else {
                continue;
            };
            if !session.compare_property(field, item, slot, ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

const TICKS: &str = "Ticks";

fn ticks_of(session: &ObjectSerializer<'_>, value: &StructValue) -> ImportResult<i64> {
    match value.fields.first() {
        Some(Value::Int(ticks)) => Ok(*ticks),
        _ => Err(ImportError::CodecMismatch(
            session.registry().struct_type(value.struct_id).name.clone(),
        )),
    }
}

fn set_ticks(
    session: &ObjectSerializer<'_>,
    value: &mut StructValue,
    ticks: i64,
) -> ImportResult<()> {
    match value.fields.first_mut() {
        Some(Value::Int(slot)) => {
            *slot = ticks;
            Ok(())
        }
        _ => Err(ImportError::CodecMismatch(
            session.registry().struct_type(value.struct_id).name.clone(),
        )),
    }
}

/// Read `Ticks` as a decimal string or a plain number
fn parse_ticks(json: &Map<String, Json>, unsigned: bool) -> ImportResult<i64> {
    let expected = if unsigned { "unsigned tick count" } else { "tick count" };
    let invalid = || ImportError::invalid(TICKS, expected);
    let ticks = match json.get(TICKS).ok_or_else(invalid)? {
        Json::String(s) if unsigned => s.parse::<u64>().ok().and_then(|t| i64::try_from(t).ok()),
        Json::String(s) => s.parse::<i64>().ok(),
        Json::Number(n) if unsigned => n.as_u64().and_then(|t| i64::try_from(t).ok()),
        Json::Number(n) => n.as_i64(),
        _ => None,
    };
    ticks.ok_or_else(invalid)
}

/// `DateTime`: a single unsigned 64-bit tick count, written as a string
#[derive(Debug, Default, Clone, Copy)]
pub struct DateTimeCodec;

impl StructCodec for DateTimeCodec {
    fn serialize(
        &self,
        session: &mut ObjectSerializer<'_>,
        value: &StructValue,
        out: &mut Map<String, Json>,
        _refs: &mut Vec<i32>,
    ) -> ImportResult<()> {
        let ticks = u64::try_from(ticks_of(session, value)?)
            .map_err(|_| ImportError::invalid(TICKS, "unsigned tick count"))?;
        out.insert(TICKS.to_string(), Json::String(ticks.to_string()));
        Ok(())
    }

    fn deserialize(
        &self,
        session: &mut ObjectSerializer<'_>,
        value: &mut StructValue,
        json: &Map<String, Json>,
    ) -> ImportResult<()> {
        let ticks = parse_ticks(json, true)?;
        set_ticks(session, value, ticks)
    }

    fn compare(
        &self,
        session: &mut ObjectSerializer<'_>,
        json: &Map<String, Json>,
        value: &StructValue,
        _ctx: &mut CompareContext,
    ) -> ImportResult<bool> {
        let current = ticks_of(session, value)?;
        Ok(parse_ticks(json, true).map_or(false, |ticks| ticks == current))
    }
}

/// `Timespan`: a single signed 64-bit tick count, written as a string
#[derive(Debug, Default, Clone, Copy)]
pub struct TimespanCodec;

impl StructCodec for TimespanCodec {
    fn serialize(
        &self,
        session: &mut ObjectSerializer<'_>,
        value: &StructValue,
        out: &mut Map<String, Json>,
        _refs: &mut Vec<i32>,
    ) -> ImportResult<()> {
        let ticks = ticks_of(session, value)?;
        out.insert(TICKS.to_string(), Json::String(ticks.to_string()));
        Ok(())
    }

    fn deserialize(
        &self,
        session: &mut ObjectSerializer<'_>,
        value: &mut StructValue,
        json: &Map<String, Json>,
    ) -> ImportResult<()> {
        let ticks = parse_ticks(json, false)?;
        set_ticks(session, value, ticks)
    }

    fn compare(
        &self,
        session: &mut ObjectSerializer<'_>,
        json: &Map<String, Json>,
        value: &StructValue,
        _ctx: &mut CompareContext,
    ) -> ImportResult<bool> {
        let current = ticks_of(session, value)?;
        Ok(parse_ticks(json, false).map_or(false, |ticks| ticks == current))
    }
}

/// Split a GUID into its four big-endian 32-bit components
pub fn guid_parts(guid: &Uuid) -> [u32; 4] {
    let bytes = guid.as_bytes();
    let mut parts = [0u32; 4];
    for (part, chunk) in parts.iter_mut().zip(bytes.chunks_exact(4)) {
        *part = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    parts
}

/// Parse a GUID string in any of the usual spellings
pub fn guid_from_str(text: &str) -> Option<[u32; 4]> {
    Uuid::parse_str(text.trim()).ok().map(|guid| guid_parts(&guid))
}

/// The `{A, B, C, D}` object form of a GUID
pub fn guid_json(parts: [u32; 4]) -> Map<String, Json> {
    ["A", "B", "C", "D"]
        .iter()
        .zip(parts)
        .map(|(name, part)| ((*name).to_string(), Json::from(part)))
        .collect()
}

/// Guid struct value from its components
pub fn guid_value(struct_id: StructId, parts: [u32; 4]) -> StructValue {
    StructValue::new(struct_id, parts.iter().map(|p| Value::Int(i64::from(*p))).collect())
}

/// Whether a Guid struct value is all zeros
pub fn guid_is_zero(value: &StructValue) -> bool {
    value.fields.iter().all(|f| matches!(f, Value::Int(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectArena;
    use crate::reflect::{FieldDescriptor, PropertyKind, StructDescriptor, TypeRegistry};
    use serde_json::json;

    #[test]
    fn test_guid_parts() {
        let parts = guid_from_str("0000000A-0000-000B-0000-000C0000000D").unwrap();
        assert_eq!(parts, [10, 11, 12, 13]);
        assert_eq!(guid_from_str("0000000A0000000B0000000C0000000D"), Some(parts));
        assert_eq!(guid_json(parts)["C"], json!(12));
        assert!(guid_from_str("not a guid").is_none());
    }

    #[test]
    fn test_tick_codecs() {
        let registry = Rc::new(TypeRegistry::with_engine_types());
        let date_time = registry.find_struct("DateTime").unwrap();
        let timespan = registry.find_struct("Timespan").unwrap();
        let mut arena = ObjectArena::new(Rc::clone(&registry));
        let mut session = ObjectSerializer::new(&mut arena);
        let mut ctx = CompareContext::new();

        let mut out = Map::new();
        let negative = StructValue::new(timespan, vec![Value::Int(-5)]);
        TimespanCodec.serialize(&mut session, &negative, &mut out, &mut Vec::new()).unwrap();
        assert_eq!(out["Ticks"], json!("-5"));

        let before_epoch = StructValue::new(date_time, vec![Value::Int(-5)]);
        let err = DateTimeCodec
            .serialize(&mut session, &before_epoch, &mut Map::new(), &mut Vec::new())
            .unwrap_err();
        assert!(!err.is_fatal());

        let mut value = registry.default_struct(date_time);
        let json = json!({"Ticks": 42}).as_object().cloned().unwrap();
        DateTimeCodec.deserialize(&mut session, &mut value, &json).unwrap();
        assert_eq!(value.fields, vec![Value::Int(42)]);
        let text = json!({"Ticks": "42"}).as_object().cloned().unwrap();
        assert!(DateTimeCodec.compare(&mut session, &text, &value, &mut ctx).unwrap());
    }

    #[test]
    fn test_tick_codec_rejects_wrong_layout() {
        let mut registry = TypeRegistry::new();
        let odd = registry.register_struct(
            StructDescriptor::new("Odd").field(FieldDescriptor::new("Label", PropertyKind::Str)),
        );
        let mut arena = ObjectArena::new(Rc::new(registry));
        let mut session = ObjectSerializer::new(&mut arena);
        let value = StructValue::new(odd, vec![Value::Str(String::new())]);
        let err = DateTimeCodec
            .serialize(&mut session, &value, &mut Map::new(), &mut Vec::new())
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_fallback_skips_bad_fields() {
        let registry = Rc::new(TypeRegistry::with_engine_types());
        let color = registry.find_struct("LinearColor").unwrap();
        let mut arena = ObjectArena::new(Rc::clone(&registry));
        let mut session = ObjectSerializer::new(&mut arena);
        let mut ctx = CompareContext::new();

        let mut value = registry.default_struct(color);
        let json = json!({"R": 1.0, "G": "bad", "B": 0.25}).as_object().cloned().unwrap();
        FallbackStructCodec.deserialize(&mut session, &mut value, &json).unwrap();
        assert_eq!(value.fields[0], Value::Float(1.0));
        assert_eq!(value.fields[1], Value::Float(0.0));
        assert_eq!(value.fields[2], Value::Float(0.25));

        let partial = json!({"R": 1.0}).as_object().cloned().unwrap();
        assert!(FallbackStructCodec.compare(&mut session, &partial, &value, &mut ctx).unwrap());
        let differs = json!({"B": 0.5}).as_object().cloned().unwrap();
        assert!(!FallbackStructCodec.compare(&mut session, &differs, &value, &mut ctx).unwrap());
    }
}
