// SPDX-License-Identifier: MIT OR Apache-2.0
//! Material and material function types: pin structs, the expression node
//! hierarchy and the parent asset classes.

use crate::pin::PinType;
use jsonasset_core::{
    ClassDescriptor, ClassId, EnumDescriptor, FieldDescriptor, PropertyKind, StructDescriptor,
    StructId, TypeRegistry,
};

/// Base class of every expression node
pub const MATERIAL_EXPRESSION: &str = "MaterialExpression";
/// Generic pin struct
pub const EXPRESSION_INPUT: &str = "ExpressionInput";
/// Comment annotation node
pub const COMMENT_NODE: &str = "MaterialExpressionComment";
/// Function call node
pub const FUNCTION_CALL_NODE: &str = "MaterialExpressionMaterialFunctionCall";
/// Material asset class
pub const MATERIAL: &str = "Material";
/// Material function asset class
pub const MATERIAL_FUNCTION: &str = "MaterialFunction";

/// Nodes whose `Inputs` is a fixed-size pin array filled positionally
pub const POSITIONAL_INPUT_NODES: &[(&str, usize)] = &[
    ("MaterialExpressionFeatureLevelSwitch", 5),
    ("MaterialExpressionQualitySwitch", 4),
    ("MaterialExpressionShadingPathSwitch", 3),
];

/// Material inputs wired from the editor data, with their pin tags
pub const MATERIAL_INPUTS: &[(&str, PinType)] = &[
    ("BaseColor", PinType::Color),
    ("EmissiveColor", PinType::Color),
    ("SubsurfaceColor", PinType::Color),
    ("Metallic", PinType::Scalar),
    ("Specular", PinType::Scalar),
    ("Roughness", PinType::Scalar),
    ("Anisotropy", PinType::Scalar),
    ("Opacity", PinType::Scalar),
    ("OpacityMask", PinType::Scalar),
    ("AmbientOcclusion", PinType::Scalar),
    ("Refraction", PinType::Scalar),
    ("PixelDepthOffset", PinType::Scalar),
    ("Normal", PinType::Vector),
    ("Tangent", PinType::Vector),
    ("WorldPositionOffset", PinType::Vector),
    ("MaterialAttributes", PinType::Default),
    ("ShadingModelFromMaterialExpression", PinType::Default),
    ("FrontMaterial", PinType::Default),
];

/// Ids the graph builder needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialTypes {
    /// `MaterialExpression`
    pub expression: ClassId,
    /// `MaterialExpressionComment`
    pub comment: ClassId,
    /// `MaterialExpressionReroute`, used in place of unknown node types
    pub placeholder: ClassId,
    /// `Material`
    pub material: ClassId,
    /// `MaterialFunction`
    pub material_function: ClassId,
    /// `ExpressionInput` and its material input subtypes
    pub expression_input: StructId,
    /// `ColorMaterialInput`
    pub color_input: StructId,
    /// `ScalarMaterialInput`
    pub scalar_input: StructId,
    /// `VectorMaterialInput`
    pub vector_input: StructId,
}

impl MaterialTypes {
    /// Look the ids up in a registry that already has the material types
    pub fn from_registry(registry: &TypeRegistry) -> Option<Self> {
        Some(Self {
            expression: registry.find_class(MATERIAL_EXPRESSION)?,
            comment: registry.find_class(COMMENT_NODE)?,
            placeholder: registry.find_class(crate::node::PLACEHOLDER_NODE)?,
            material: registry.find_class(MATERIAL)?,
            material_function: registry.find_class(MATERIAL_FUNCTION)?,
            expression_input: registry.find_struct(EXPRESSION_INPUT)?,
            color_input: registry.find_struct("ColorMaterialInput")?,
            scalar_input: registry.find_struct("ScalarMaterialInput")?,
            vector_input: registry.find_struct("VectorMaterialInput")?,
        })
    }

    /// Pin struct for a pin tag
    pub fn pin_struct(&self, pin_type: PinType) -> StructId {
        match pin_type {
            PinType::Default => self.expression_input,
            PinType::Color => self.color_input,
            PinType::Scalar => self.scalar_input,
            PinType::Vector => self.vector_input,
        }
    }

    /// Every pin struct
    pub fn pin_structs(&self) -> [StructId; 4] {
        [self.expression_input, self.color_input, self.scalar_input, self.vector_input]
    }
}

fn node(
    registry: &mut TypeRegistry,
    name: &str,
    parent: ClassId,
    fields: Vec<FieldDescriptor>,
) -> ClassId {
    let class = fields
        .into_iter()
        .fold(ClassDescriptor::new(name).with_parent(parent), ClassDescriptor::field);
    registry.register_class(class)
}

fn find(registry: &TypeRegistry, name: &str) -> StructId {
    registry
        .find_struct(name)
        .expect("engine structs are registered before material types")
}

/// Register the material types. Engine types are registered first when
/// missing.
pub fn register_material_types(registry: &mut TypeRegistry) -> MaterialTypes {
    use FieldDescriptor as F;
    use PropertyKind as K;

    if registry.find_struct("Guid").is_none() {
        registry.register_engine_types();
    }
    let guid = find(registry, "Guid");
    let color = find(registry, "Color");
    let linear_color = find(registry, "LinearColor");
    let vector = find(registry, "Vector");
    let vector4 = find(registry, "Vector4");

    // ========================================================================
    // Pins
    // ========================================================================

    let expression_input = registry.register_struct(
        StructDescriptor::new(EXPRESSION_INPUT)
            .field(F::new("Expression", K::Object))
            .field(F::new("OutputIndex", K::Int))
            .field(F::new("InputName", K::Name))
            .field(F::new("Mask", K::Int))
            .field(F::new("MaskR", K::Int))
            .field(F::new("MaskG", K::Int))
            .field(F::new("MaskB", K::Int))
            .field(F::new("MaskA", K::Int)),
    );
    let color_input = registry.register_struct(
        StructDescriptor::new("ColorMaterialInput")
            .with_parent(expression_input)
            .field(F::new("UseConstant", K::Bool))
            .field(F::new("Constant", K::Struct(color))),
    );
    let scalar_input = registry.register_struct(
        StructDescriptor::new("ScalarMaterialInput")
            .with_parent(expression_input)
            .field(F::new("UseConstant", K::Bool))
            .field(F::new("Constant", K::Float)),
    );
    let vector_input = registry.register_struct(
        StructDescriptor::new("VectorMaterialInput")
            .with_parent(expression_input)
            .field(F::new("UseConstant", K::Bool))
            .field(F::new("Constant", K::Struct(vector))),
    );
    let expression_output = registry.register_struct(
        StructDescriptor::new("ExpressionOutput")
            .field(F::new("OutputName", K::Name))
            .field(F::new("Mask", K::Int))
            .field(F::new("MaskR", K::Int))
            .field(F::new("MaskG", K::Int))
            .field(F::new("MaskB", K::Int))
            .field(F::new("MaskA", K::Int)),
    );
    let function_input = registry.register_struct(
        StructDescriptor::new("FunctionExpressionInput")
            .field(F::new("ExpressionInputId", K::Struct(guid)))
            .field(F::new("Input", K::Struct(expression_input))),
    );
    let function_output = registry.register_struct(
        StructDescriptor::new("FunctionExpressionOutput")
            .field(F::new("ExpressionOutputId", K::Struct(guid)))
            .field(F::new("Output", K::Struct(expression_output))),
    );
    let custom_input = registry.register_struct(
        StructDescriptor::new("CustomInput")
            .field(F::new("InputName", K::Name))
            .field(F::new("Input", K::Struct(expression_input))),
    );

    // ========================================================================
    // Enums
    // ========================================================================

    let sampler_type = registry.register_enum(EnumDescriptor::namespaced(
        "EMaterialSamplerType",
        &[
            "SAMPLERTYPE_Color",
            "SAMPLERTYPE_Grayscale",
            "SAMPLERTYPE_Alpha",
            "SAMPLERTYPE_Normal",
            "SAMPLERTYPE_Masks",
            "SAMPLERTYPE_DistanceFieldFont",
            "SAMPLERTYPE_LinearColor",
            "SAMPLERTYPE_LinearGrayscale",
            "SAMPLERTYPE_Data",
            "SAMPLERTYPE_External",
            "SAMPLERTYPE_VirtualColor",
        ],
    ));
    let function_input_type = registry.register_enum(EnumDescriptor::namespaced(
        "EFunctionInputType",
        &[
            "FunctionInput_Scalar",
            "FunctionInput_Vector2",
            "FunctionInput_Vector3",
            "FunctionInput_Vector4",
            "FunctionInput_Texture2D",
            "FunctionInput_TextureCube",
            "FunctionInput_Texture2DArray",
            "FunctionInput_VolumeTexture",
            "FunctionInput_StaticBool",
            "FunctionInput_MaterialAttributes",
            "FunctionInput_TextureExternal",
            "FunctionInput_Bool",
            "FunctionInput_Substrate",
        ],
    ));
    let custom_output_type = registry.register_enum(EnumDescriptor::namespaced(
        "ECustomMaterialOutputType",
        &["CMOT_Float1", "CMOT_Float2", "CMOT_Float3", "CMOT_Float4", "CMOT_MaterialAttributes"],
    ));
    let blend_mode = registry.register_enum(EnumDescriptor::namespaced(
        "EBlendMode",
        &[
            "BLEND_Opaque",
            "BLEND_Masked",
            "BLEND_Translucent",
            "BLEND_Additive",
            "BLEND_Modulate",
            "BLEND_AlphaComposite",
            "BLEND_AlphaHoldout",
        ],
    ));
    let shading_model = registry.register_enum(EnumDescriptor::namespaced(
        "EMaterialShadingModel",
        &[
            "MSM_Unlit",
            "MSM_DefaultLit",
            "MSM_Subsurface",
            "MSM_PreintegratedSkin",
            "MSM_ClearCoat",
            "MSM_SubsurfaceProfile",
            "MSM_TwoSidedFoliage",
            "MSM_Hair",
            "MSM_Cloth",
            "MSM_Eye",
            "MSM_SingleLayerWater",
            "MSM_ThinTranslucent",
            "MSM_Strata",
            "MSM_FromMaterialExpression",
        ],
    ));
    let domain = registry.register_enum(EnumDescriptor::namespaced(
        "EMaterialDomain",
        &[
            "MD_Surface",
            "MD_DeferredDecal",
            "MD_LightFunction",
            "MD_Volume",
            "MD_PostProcess",
            "MD_UI",
            "MD_RuntimeVirtualTexture",
        ],
    ));

    // ========================================================================
    // Parents
    // ========================================================================

    let object = registry.object_class();
    let material = node(
        registry,
        MATERIAL,
        object,
        vec![
            F::new("MaterialDomain", K::Byte(Some(domain))),
            F::new("BlendMode", K::Byte(Some(blend_mode))),
            F::new("ShadingModel", K::Byte(Some(shading_model))),
            F::new("TwoSided", K::Bool),
            F::new("OpacityMaskClipValue", K::Float),
            F::new("BaseColor", K::Struct(color_input)).editor_only(),
            F::new("EmissiveColor", K::Struct(color_input)).editor_only(),
            F::new("SubsurfaceColor", K::Struct(color_input)).editor_only(),
            F::new("Metallic", K::Struct(scalar_input)).editor_only(),
            F::new("Specular", K::Struct(scalar_input)).editor_only(),
            F::new("Roughness", K::Struct(scalar_input)).editor_only(),
            F::new("Anisotropy", K::Struct(scalar_input)).editor_only(),
            F::new("Opacity", K::Struct(scalar_input)).editor_only(),
            F::new("OpacityMask", K::Struct(scalar_input)).editor_only(),
            F::new("AmbientOcclusion", K::Struct(scalar_input)).editor_only(),
            F::new("Refraction", K::Struct(scalar_input)).editor_only(),
            F::new("PixelDepthOffset", K::Struct(scalar_input)).editor_only(),
            F::new("Normal", K::Struct(vector_input)).editor_only(),
            F::new("Tangent", K::Struct(vector_input)).editor_only(),
            F::new("WorldPositionOffset", K::Struct(vector_input)).editor_only(),
            F::new("MaterialAttributes", K::Struct(expression_input)).editor_only(),
            F::new("ShadingModelFromMaterialExpression", K::Struct(expression_input)).editor_only(),
            F::new("FrontMaterial", K::Struct(expression_input)).editor_only(),
        ],
    );
    let material_function = node(
        registry,
        MATERIAL_FUNCTION,
        object,
        vec![
            F::new("Description", K::Str),
            F::new("UserExposedCaption", K::Str),
            F::new("bExposeToLibrary", K::Bool),
            F::new("LibraryCategoriesText", K::array(K::Text)),
        ],
    );

    // ========================================================================
    // Expressions
    // ========================================================================

    let input = |name: &str| F::new(name, K::Struct(expression_input));
    let float = |name: &str| F::new(name, K::Float);

    let expression = node(
        registry,
        MATERIAL_EXPRESSION,
        object,
        vec![
            F::new("MaterialExpressionEditorX", K::Int),
            F::new("MaterialExpressionEditorY", K::Int),
            F::new("MaterialExpressionGuid", K::Struct(guid)),
            F::new("Material", K::Object),
            F::new("Function", K::Object),
            F::new("Desc", K::Str),
            F::new("bCommentBubbleVisible", K::Bool).editor_only(),
            F::new("bCollapsed", K::Bool).editor_only(),
            F::new("bRealtimePreview", K::Bool).editor_only(),
            F::new("bShowOutputNameOnPin", K::Bool),
            F::new("Outputs", K::array(K::Struct(expression_output))),
        ],
    );

    let parameter = node(
        registry,
        "MaterialExpressionParameter",
        expression,
        vec![
            F::new("ParameterName", K::Name),
            F::new("ExpressionGUID", K::Struct(guid)),
            F::new("Group", K::Name),
            F::new("SortPriority", K::Int),
        ],
    );
    node(
        registry,
        "MaterialExpressionScalarParameter",
        parameter,
        vec![float("DefaultValue"), float("SliderMin"), float("SliderMax")],
    );
    node(
        registry,
        "MaterialExpressionVectorParameter",
        parameter,
        vec![F::new("DefaultValue", K::Struct(linear_color))],
    );
    let static_bool_parameter = node(
        registry,
        "MaterialExpressionStaticBoolParameter",
        parameter,
        vec![F::new("DefaultValue", K::Bool)],
    );
    node(
        registry,
        "MaterialExpressionStaticSwitchParameter",
        static_bool_parameter,
        vec![input("A"), input("B")],
    );

    // Constants
    node(registry, "MaterialExpressionConstant", expression, vec![float("R")]);
    node(registry, "MaterialExpressionConstant2Vector", expression, vec![float("R"), float("G")]);
    node(
        registry,
        "MaterialExpressionConstant3Vector",
        expression,
        vec![F::new("Constant", K::Struct(linear_color))],
    );
    node(
        registry,
        "MaterialExpressionConstant4Vector",
        expression,
        vec![F::new("Constant", K::Struct(linear_color))],
    );
    node(registry, "MaterialExpressionStaticBool", expression, vec![F::new("Value", K::Bool)]);

    // Math
    for name in [
        "MaterialExpressionAdd",
        "MaterialExpressionSubtract",
        "MaterialExpressionMultiply",
        "MaterialExpressionDivide",
        "MaterialExpressionMin",
        "MaterialExpressionMax",
    ] {
        let fields = vec![input("A"), input("B"), float("ConstA"), float("ConstB")];
        node(registry, name, expression, fields);
    }
    for name in [
        "MaterialExpressionAbs",
        "MaterialExpressionOneMinus",
        "MaterialExpressionFrac",
        "MaterialExpressionFloor",
        "MaterialExpressionCeil",
        "MaterialExpressionSaturate",
        "MaterialExpressionSine",
        "MaterialExpressionCosine",
        "MaterialExpressionSign",
        "MaterialExpressionSquareRoot",
        "MaterialExpressionNormalize",
        "MaterialExpressionReroute",
    ] {
        node(registry, name, expression, vec![input("Input")]);
    }
    for name in [
        "MaterialExpressionDotProduct",
        "MaterialExpressionCrossProduct",
        "MaterialExpressionAppendVector",
        "MaterialExpressionDistance",
    ] {
        node(registry, name, expression, vec![input("A"), input("B")]);
    }
    node(
        registry,
        "MaterialExpressionLinearInterpolate",
        expression,
        vec![
            input("A"),
            input("B"),
            input("Alpha"),
            float("ConstA"),
            float("ConstB"),
            float("ConstAlpha"),
        ],
    );
    node(
        registry,
        "MaterialExpressionPower",
        expression,
        vec![input("Base"), input("Exponent"), float("ConstExponent")],
    );
    node(
        registry,
        "MaterialExpressionClamp",
        expression,
        vec![input("Input"), input("Min"), input("Max"), float("MinDefault"), float("MaxDefault")],
    );
    node(
        registry,
        "MaterialExpressionComponentMask",
        expression,
        vec![
            input("Input"),
            F::new("R", K::Bool),
            F::new("G", K::Bool),
            F::new("B", K::Bool),
            F::new("A", K::Bool),
        ],
    );
    node(
        registry,
        "MaterialExpressionIf",
        expression,
        vec![
            input("A"),
            input("B"),
            input("AGreaterThanB"),
            input("AEqualsB"),
            input("ALessThanB"),
            float("EqualsThreshold"),
            float("ConstB"),
        ],
    );

    // Coordinates and time
    node(
        registry,
        "MaterialExpressionTextureCoordinate",
        expression,
        vec![F::new("CoordinateIndex", K::Int), float("UTiling"), float("VTiling")],
    );
    node(
        registry,
        "MaterialExpressionPanner",
        expression,
        vec![input("Coordinate"), input("Time"), input("Speed"), float("SpeedX"), float("SpeedY")],
    );
    node(registry, "MaterialExpressionTime", expression, vec![F::new("bIgnorePause", K::Bool)]);
    node(registry, "MaterialExpressionWorldPosition", expression, Vec::new());

    // Textures
    let texture_base = node(
        registry,
        "MaterialExpressionTextureBase",
        expression,
        vec![
            F::new("Texture", K::Object),
            F::new("SamplerType", K::Byte(Some(sampler_type))),
            F::new("IsDefaultMeshpaintTexture", K::Bool),
        ],
    );
    let texture_sample = node(
        registry,
        "MaterialExpressionTextureSample",
        texture_base,
        vec![
            input("Coordinates"),
            input("TextureObject"),
            input("MipValue"),
            F::new("ConstCoordinate", K::Int),
        ],
    );
    let texture_parameter = node(
        registry,
        "MaterialExpressionTextureSampleParameter",
        texture_sample,
        vec![
            F::new("ParameterName", K::Name),
            F::new("ExpressionGUID", K::Struct(guid)),
            F::new("Group", K::Name),
            F::new("SortPriority", K::Int),
        ],
    );
    let texture_parameter_2d =
        node(registry, "MaterialExpressionTextureSampleParameter2D", texture_parameter, Vec::new());
    node(
        registry,
        "MaterialExpressionTextureSampleParameterSubUV",
        texture_parameter_2d,
        vec![F::new("bBlend", K::Bool)],
    );
    node(registry, "MaterialExpressionTextureObject", texture_base, Vec::new());

    // Functions
    node(
        registry,
        "MaterialExpressionFunctionInput",
        expression,
        vec![
            input("Preview"),
            F::new("InputName", K::Name),
            F::new("Description", K::Str),
            F::new("Id", K::Struct(guid)),
            F::new("InputType", K::Byte(Some(function_input_type))),
            F::new("PreviewValue", K::Struct(vector4)),
            F::new("bUsePreviewValueAsDefault", K::Bool),
            F::new("SortPriority", K::Int),
        ],
    );
    node(
        registry,
        "MaterialExpressionFunctionOutput",
        expression,
        vec![
            input("A"),
            F::new("OutputName", K::Name),
            F::new("Description", K::Str),
            F::new("SortPriority", K::Int),
            F::new("Id", K::Struct(guid)),
            F::new("bLastPreviewed", K::Bool),
        ],
    );
    node(
        registry,
        FUNCTION_CALL_NODE,
        expression,
        vec![
            F::new("MaterialFunction", K::Object),
            F::new("FunctionInputs", K::array(K::Struct(function_input))),
            F::new("FunctionOutputs", K::array(K::Struct(function_output))),
        ],
    );
    node(
        registry,
        "MaterialExpressionCustom",
        expression,
        vec![
            F::new("Code", K::Str),
            F::new("OutputType", K::Byte(Some(custom_output_type))),
            F::new("Description", K::Str),
            F::new("Inputs", K::array(K::Struct(custom_input))),
        ],
    );

    // Switches
    for (name, count) in POSITIONAL_INPUT_NODES {
        node(registry, name, expression, vec![input("Default"), input("Inputs").fixed(*count)]);
    }
    node(
        registry,
        "MaterialExpressionStaticSwitch",
        expression,
        vec![input("A"), input("B"), input("Value"), F::new("DefaultValue", K::Bool)],
    );

    // Renamed across engine versions
    node(
        registry,
        "MaterialExpressionGIReplace",
        expression,
        vec![input("Default"), input("StaticIndirect"), input("DynamicIndirect")],
    );
    node(
        registry,
        "MaterialExpressionSubstrateSlabBSDF",
        expression,
        vec![input("DiffuseAlbedo"), input("F0"), input("Roughness"), input("Normal")],
    );
    node(
        registry,
        "MaterialExpressionSubstrateConvertMaterialAttributes",
        expression,
        vec![input("MaterialAttributes")],
    );

    // Editor-only structure
    let comment = node(
        registry,
        COMMENT_NODE,
        expression,
        vec![
            F::new("SizeX", K::Int),
            F::new("SizeY", K::Int),
            F::new("Text", K::Str),
            F::new("CommentColor", K::Struct(linear_color)),
            F::new("FontSize", K::Int),
        ],
    );
    node(
        registry,
        "MaterialExpressionComposite",
        expression,
        vec![
            F::new("SubgraphName", K::Str),
            F::new("InputExpressions", K::Object),
            F::new("OutputExpressions", K::Object),
        ],
    );

    MaterialTypes {
        expression,
        comment,
        placeholder: registry
            .find_class(crate::node::PLACEHOLDER_NODE)
            .unwrap_or(expression),
        material,
        material_function,
        expression_input,
        color_input,
        scalar_input,
        vector_input,
    }
}
