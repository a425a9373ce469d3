// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine types the codec knows out of the box: math structs, GUIDs, tick
//! based time types, rich curves and the curve asset classes.

use crate::reflect::{
    ClassDescriptor, EnumDescriptor, FieldDescriptor, PropertyKind, StructDescriptor, TypeRegistry,
    CORE_PACKAGE,
};

impl TypeRegistry {
    /// Registry with the core and engine types registered
    pub fn with_engine_types() -> Self {
        let mut registry = Self::new();
        registry.register_engine_types();
        registry
    }

    /// Register the engine structs, enums and classes
    pub fn register_engine_types(&mut self) {
        use FieldDescriptor as F;
        use PropertyKind as K;

        // Core structs
        let guid = self.register_struct(
            StructDescriptor::new("Guid")
                .in_package(CORE_PACKAGE)
                .field(F::new("A", K::Int))
                .field(F::new("B", K::Int))
                .field(F::new("C", K::Int))
                .field(F::new("D", K::Int)),
        );
        self.register_struct(
            StructDescriptor::new("DateTime")
                .in_package(CORE_PACKAGE)
                .field(F::new("Ticks", K::Int)),
        );
        self.register_struct(
            StructDescriptor::new("Timespan")
                .in_package(CORE_PACKAGE)
                .field(F::new("Ticks", K::Int)),
        );

        // Math
        self.register_struct(
            StructDescriptor::new("Vector")
                .in_package(CORE_PACKAGE)
                .field(F::new("X", K::Float))
                .field(F::new("Y", K::Float))
                .field(F::new("Z", K::Float)),
        );
        self.register_struct(
            StructDescriptor::new("Vector2D")
                .in_package(CORE_PACKAGE)
                .field(F::new("X", K::Float))
                .field(F::new("Y", K::Float)),
        );
        self.register_struct(
            StructDescriptor::new("Vector4")
                .in_package(CORE_PACKAGE)
                .field(F::new("X", K::Float))
                .field(F::new("Y", K::Float))
                .field(F::new("Z", K::Float))
                .field(F::new("W", K::Float)),
        );
        self.register_struct(
            StructDescriptor::new("LinearColor")
                .in_package(CORE_PACKAGE)
                .field(F::new("R", K::Float))
                .field(F::new("G", K::Float))
                .field(F::new("B", K::Float))
                .field(F::new("A", K::Float)),
        );
        self.register_struct(
            StructDescriptor::new("Color")
                .in_package(CORE_PACKAGE)
                .field(F::new("B", K::Byte(None)))
                .field(F::new("G", K::Byte(None)))
                .field(F::new("R", K::Byte(None)))
                .field(F::new("A", K::Byte(None))),
        );

        // Curves
        let interp = self.register_enum(EnumDescriptor::namespaced(
            "ERichCurveInterpMode",
            &["RCIM_Linear", "RCIM_Constant", "RCIM_Cubic", "RCIM_None"],
        ));
        let tangent = self.register_enum(EnumDescriptor::namespaced(
            "ERichCurveTangentMode",
            &["RCTM_Auto", "RCTM_User", "RCTM_Break", "RCTM_None"],
        ));
        let weight = self.register_enum(EnumDescriptor::namespaced(
            "ERichCurveTangentWeightMode",
            &[
                "RCTWM_WeightedNone",
                "RCTWM_WeightedArrive",
                "RCTWM_WeightedLeave",
                "RCTWM_WeightedBoth",
            ],
        ));
        let extrapolation = self.register_enum(EnumDescriptor::namespaced(
            "ERichCurveExtrapolation",
            &[
                "RCCE_Cycle",
                "RCCE_CycleWithOffset",
                "RCCE_Oscillate",
                "RCCE_Linear",
                "RCCE_Constant",
                "RCCE_None",
            ],
        ));

        let key = self.register_struct(
            StructDescriptor::new("RichCurveKey")
                .field(F::new("InterpMode", K::Byte(Some(interp))))
                .field(F::new("TangentMode", K::Byte(Some(tangent))))
                .field(F::new("TangentWeightMode", K::Byte(Some(weight))))
                .field(F::new("Time", K::Float))
                .field(F::new("Value", K::Float))
                .field(F::new("ArriveTangent", K::Float))
                .field(F::new("ArriveTangentWeight", K::Float))
                .field(F::new("LeaveTangent", K::Float))
                .field(F::new("LeaveTangentWeight", K::Float)),
        );
        let real = self.register_struct(
            StructDescriptor::new("RealCurve")
                .field(F::new("DefaultValue", K::Float))
                .field(F::new("PreInfinityExtrap", K::Byte(Some(extrapolation))))
                .field(F::new("PostInfinityExtrap", K::Byte(Some(extrapolation)))),
        );
        let rich = self.register_struct(
            StructDescriptor::new("RichCurve")
                .with_parent(real)
                .field(F::new("Keys", K::array(K::Struct(key)))),
        );

        let object = self.object_class();
        let curve_base = self.register_class(ClassDescriptor::new("CurveBase").with_parent(object));
        self.register_class(
            ClassDescriptor::new("CurveFloat")
                .with_parent(curve_base)
                .field(F::new("FloatCurve", K::Struct(rich)))
                .field(F::new("bIsEventCurve", K::Bool)),
        );
        self.register_class(
            ClassDescriptor::new("CurveLinearColor")
                .with_parent(curve_base)
                .field(F::new("FloatCurves", K::Struct(rich)).fixed(4)),
        );
        self.register_class(
            ClassDescriptor::new("CurveVector")
                .with_parent(curve_base)
                .field(F::new("FloatCurves", K::Struct(rich)).fixed(3)),
        );

        let texture = self.register_class(
            ClassDescriptor::new("Texture")
                .with_parent(object)
                .field(F::new("SRGB", K::Bool))
                .field(F::new("LightingGuid", K::Struct(guid)))
                .field(F::new("AssetImportData", K::Object).editor_only()),
        );
        self.register_class(ClassDescriptor::new("Texture2D").with_parent(texture));
        self.register_class(ClassDescriptor::new("DataAsset").with_parent(object));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::FieldTable;
    use crate::value::Value;

    #[test]
    fn test_rich_curve_layout() {
        let registry = TypeRegistry::with_engine_types();
        let rich = registry.find_struct("RichCurve").unwrap();
        let names: Vec<_> = registry
            .struct_type(rich)
            .fields()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["DefaultValue", "PreInfinityExtrap", "PostInfinityExtrap", "Keys"]);
        assert_eq!(registry.struct_type(rich).fields()[3].owner, "RichCurve");

        let interp = registry.find_enum("ERichCurveInterpMode").unwrap();
        assert_eq!(registry.enum_type(interp).value_of("RCIM_Cubic"), Some(2));
    }

    #[test]
    fn test_curve_classes() {
        let registry = TypeRegistry::with_engine_types();
        let base = registry.find_class("CurveBase").unwrap();
        let color = registry.find_class("CurveLinearColor").unwrap();
        assert!(registry.is_child_of(color, base));

        let defaults = registry.default_properties(color);
        let Value::Fixed(channels) = &defaults[0] else {
            panic!("expected a static array");
        };
        assert_eq!(channels.len(), 4);
        let guid = registry.find_struct("Guid").unwrap();
        assert_eq!(registry.struct_type(guid).package, CORE_PACKAGE);
    }
}
