//! Shader table
//!
//! Every shader the UI engine can request, together with the vertex format it
//! consumes. The table is static; a shader's format fixes its vertex stride and
//! input layout.
//!
//! | Attribute | Format             | Size | Semantic             |
//! |-----------|--------------------|------|----------------------|
//! | Pos       | R32G32_FLOAT       | 8    | Position (x,y)       |
//! | Color     | R8G8B8A8_UNORM     | 4    | Color (rgba)         |
//! | Tex0      | R32G32_FLOAT       | 8    | Texture (u,v)        |
//! | Tex1      | R32G32_FLOAT       | 8    | Texture (u,v)        |
//! | Tex2      | R16G16B16A16_UNORM | 8    | Rect (x0,y0, x1,y1)  |
//! | Coverage  | R32_FLOAT          | 4    | Coverage (x)         |

use smallvec::SmallVec;

use crate::error::{RenderError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Vertex format
// ─────────────────────────────────────────────────────────────────────────────

/// Bitmask of the vertex attributes a shader consumes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct VertexFormat(u8);

impl VertexFormat {
    pub const POS: VertexFormat = VertexFormat(1 << 0);
    pub const COLOR: VertexFormat = VertexFormat(1 << 1);
    pub const TEX0: VertexFormat = VertexFormat(1 << 2);
    pub const TEX1: VertexFormat = VertexFormat(1 << 3);
    pub const TEX2: VertexFormat = VertexFormat(1 << 4);
    pub const COVERAGE: VertexFormat = VertexFormat(1 << 5);
    /// Not a vertex attribute: the vertex stage generates glyph coordinates
    pub const SDF: VertexFormat = VertexFormat(1 << 6);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: VertexFormat) -> bool {
        self.0 & other.0 == other.0
    }

    const fn with(self, other: VertexFormat) -> Self {
        VertexFormat(self.0 | other.0)
    }

    /// Byte stride of one vertex in this format
    pub fn stride(self) -> u32 {
        Semantic::ALL
            .iter()
            .filter(|semantic| self.contains(semantic.flag()))
            .map(|semantic| semantic.format().size())
            .sum()
    }

    /// Input layout for this format, attributes packed in table order
    pub fn layout(self) -> VertexLayout {
        let mut attributes = SmallVec::new();
        let mut offset = 0;
        for semantic in Semantic::ALL {
            if !self.contains(semantic.flag()) {
                continue;
            }
            attributes.push(VertexAttribute {
                semantic,
                format: semantic.format(),
                offset,
                location: semantic.location(),
            });
            offset += semantic.format().size();
        }
        VertexLayout {
            stride: offset,
            attributes,
        }
    }
}

impl std::ops::BitOr for VertexFormat {
    type Output = VertexFormat;

    fn bitor(self, rhs: Self) -> Self {
        self.with(rhs)
    }
}

/// Vertex attribute semantics, in packing order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Semantic {
    Position,
    Color,
    Tex0,
    Tex1,
    Tex2,
    Coverage,
}

impl Semantic {
    pub const ALL: [Semantic; 6] = [
        Semantic::Position,
        Semantic::Color,
        Semantic::Tex0,
        Semantic::Tex1,
        Semantic::Tex2,
        Semantic::Coverage,
    ];

    pub const fn flag(self) -> VertexFormat {
        match self {
            Semantic::Position => VertexFormat::POS,
            Semantic::Color => VertexFormat::COLOR,
            Semantic::Tex0 => VertexFormat::TEX0,
            Semantic::Tex1 => VertexFormat::TEX1,
            Semantic::Tex2 => VertexFormat::TEX2,
            Semantic::Coverage => VertexFormat::COVERAGE,
        }
    }

    pub const fn format(self) -> AttributeFormat {
        match self {
            Semantic::Position | Semantic::Tex0 | Semantic::Tex1 => AttributeFormat::Float32x2,
            Semantic::Color => AttributeFormat::Unorm8x4,
            Semantic::Tex2 => AttributeFormat::Unorm16x4,
            Semantic::Coverage => AttributeFormat::Float32,
        }
    }

    /// Shader input location; stable per semantic so every program agrees
    pub const fn location(self) -> u32 {
        self as u32
    }
}

/// Component encodings used by the vertex formats
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeFormat {
    Float32x2,
    Unorm8x4,
    Unorm16x4,
    Float32,
}

impl AttributeFormat {
    pub const fn size(self) -> u32 {
        match self {
            AttributeFormat::Float32x2 => 8,
            AttributeFormat::Unorm8x4 => 4,
            AttributeFormat::Unorm16x4 => 8,
            AttributeFormat::Float32 => 4,
        }
    }
}

/// One attribute of an input layout
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub semantic: Semantic,
    pub format: AttributeFormat,
    pub offset: u32,
    pub location: u32,
}

/// Input layout of a vertex stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: SmallVec<[VertexAttribute; 6]>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Shader ids
// ─────────────────────────────────────────────────────────────────────────────

/// How a shader fills the covered area
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Paint {
    Solid,
    Linear,
    Radial,
    Pattern,
}

/// Shader families sharing one pixel program structure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderFamily {
    Rgba,
    Mask,
    Path,
    PathAa,
    Sdf,
    SdfLcd,
    ImageOpacity,
    ImageShadowV,
    ImageShadowH,
    ImageBlurV,
    ImageBlurH,
}

macro_rules! shaders {
    ($($variant:ident = $name:literal : $fmt:expr),* $(,)?) => {
        /// Shader ids, in wire order
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum Shader {
            $($variant),*
        }

        impl Shader {
            pub const ALL: &'static [Shader] = &[$(Shader::$variant),*];

            /// Name used in backend labels and generated shader sources
            pub const fn name(self) -> &'static str {
                match self {
                    $(Shader::$variant => $name),*
                }
            }

            /// Vertex format consumed by this shader
            pub const fn format(self) -> VertexFormat {
                match self {
                    $(Shader::$variant => $fmt),*
                }
            }
        }
    };
}

const P: VertexFormat = VertexFormat::POS;
const PC: VertexFormat = VertexFormat::POS.with(VertexFormat::COLOR);
const PT0: VertexFormat = VertexFormat::POS.with(VertexFormat::TEX0);
const PC_COV: VertexFormat = PC.with(VertexFormat::COVERAGE);
const PT0_COV: VertexFormat = PT0.with(VertexFormat::COVERAGE);
const PC_T1: VertexFormat = PC.with(VertexFormat::TEX1);
const PT0_T1: VertexFormat = PT0.with(VertexFormat::TEX1);
const PC_T1_SDF: VertexFormat = PC_T1.with(VertexFormat::SDF);
const PT0_T1_SDF: VertexFormat = PT0_T1.with(VertexFormat::SDF);
const PC_T1_T2: VertexFormat = PC_T1.with(VertexFormat::TEX2);
const PT0_T1_T2: VertexFormat = PT0_T1.with(VertexFormat::TEX2);

shaders! {
    Rgba = "RGBA": P,
    Mask = "Mask": P,

    PathSolid = "Path_Solid": PC,
    PathLinear = "Path_Linear": PT0,
    PathRadial = "Path_Radial": PT0,
    PathPattern = "Path_Pattern": PT0,

    PathAaSolid = "PathAA_Solid": PC_COV,
    PathAaLinear = "PathAA_Linear": PT0_COV,
    PathAaRadial = "PathAA_Radial": PT0_COV,
    PathAaPattern = "PathAA_Pattern": PT0_COV,

    SdfSolid = "SDF_Solid": PC_T1_SDF,
    SdfLinear = "SDF_Linear": PT0_T1_SDF,
    SdfRadial = "SDF_Radial": PT0_T1_SDF,
    SdfPattern = "SDF_Pattern": PT0_T1_SDF,

    SdfLcdSolid = "SDF_LCD_Solid": PC_T1_SDF,
    SdfLcdLinear = "SDF_LCD_Linear": PT0_T1_SDF,
    SdfLcdRadial = "SDF_LCD_Radial": PT0_T1_SDF,
    SdfLcdPattern = "SDF_LCD_Pattern": PT0_T1_SDF,

    ImageOpacitySolid = "Image_Opacity_Solid": PC_T1,
    ImageOpacityLinear = "Image_Opacity_Linear": PT0_T1,
    ImageOpacityRadial = "Image_Opacity_Radial": PT0_T1,
    ImageOpacityPattern = "Image_Opacity_Pattern": PT0_T1,

    ImageShadow35V = "Image_Shadow35V": PC_T1_T2,
    ImageShadow63V = "Image_Shadow63V": PC_T1_T2,
    ImageShadow127V = "Image_Shadow127V": PC_T1_T2,

    ImageShadow35HSolid = "Image_Shadow35H_Solid": PC_T1_T2,
    ImageShadow35HLinear = "Image_Shadow35H_Linear": PT0_T1_T2,
    ImageShadow35HRadial = "Image_Shadow35H_Radial": PT0_T1_T2,
    ImageShadow35HPattern = "Image_Shadow35H_Pattern": PT0_T1_T2,

    ImageShadow63HSolid = "Image_Shadow63H_Solid": PC_T1_T2,
    ImageShadow63HLinear = "Image_Shadow63H_Linear": PT0_T1_T2,
    ImageShadow63HRadial = "Image_Shadow63H_Radial": PT0_T1_T2,
    ImageShadow63HPattern = "Image_Shadow63H_Pattern": PT0_T1_T2,

    ImageShadow127HSolid = "Image_Shadow127H_Solid": PC_T1_T2,
    ImageShadow127HLinear = "Image_Shadow127H_Linear": PT0_T1_T2,
    ImageShadow127HRadial = "Image_Shadow127H_Radial": PT0_T1_T2,
    ImageShadow127HPattern = "Image_Shadow127H_Pattern": PT0_T1_T2,

    ImageBlur35V = "Image_Blur35V": PC_T1_T2,
    ImageBlur63V = "Image_Blur63V": PC_T1_T2,
    ImageBlur127V = "Image_Blur127V": PC_T1_T2,

    ImageBlur35HSolid = "Image_Blur35H_Solid": PC_T1_T2,
    ImageBlur35HLinear = "Image_Blur35H_Linear": PT0_T1_T2,
    ImageBlur35HRadial = "Image_Blur35H_Radial": PT0_T1_T2,
    ImageBlur35HPattern = "Image_Blur35H_Pattern": PT0_T1_T2,

    ImageBlur63HSolid = "Image_Blur63H_Solid": PC_T1_T2,
    ImageBlur63HLinear = "Image_Blur63H_Linear": PT0_T1_T2,
    ImageBlur63HRadial = "Image_Blur63H_Radial": PT0_T1_T2,
    ImageBlur63HPattern = "Image_Blur63H_Pattern": PT0_T1_T2,

    ImageBlur127HSolid = "Image_Blur127H_Solid": PC_T1_T2,
    ImageBlur127HLinear = "Image_Blur127H_Linear": PT0_T1_T2,
    ImageBlur127HRadial = "Image_Blur127H_Radial": PT0_T1_T2,
    ImageBlur127HPattern = "Image_Blur127H_Pattern": PT0_T1_T2,
}

impl Shader {
    /// Number of shaders in the table
    pub const COUNT: usize = Shader::ALL.len();

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Look up a shader by its wire id
    pub fn from_id(id: u8) -> Result<Shader> {
        Shader::ALL
            .get(id as usize)
            .copied()
            .ok_or(RenderError::InvalidShader(id))
    }

    /// Paint source of the shader, `None` for shaders that do not paint
    pub fn paint(self) -> Option<Paint> {
        let name = self.name();
        if matches!(self, Shader::Rgba | Shader::Mask) {
            None
        } else if name.ends_with("_Linear") {
            Some(Paint::Linear)
        } else if name.ends_with("_Radial") {
            Some(Paint::Radial)
        } else if name.ends_with("_Pattern") {
            Some(Paint::Pattern)
        } else {
            // Solid variants and the vertical image passes take vertex color
            Some(Paint::Solid)
        }
    }

    pub fn family(self) -> ShaderFamily {
        let name = self.name();
        match self {
            Shader::Rgba => ShaderFamily::Rgba,
            Shader::Mask => ShaderFamily::Mask,
            _ if name.starts_with("PathAA_") => ShaderFamily::PathAa,
            _ if name.starts_with("Path_") => ShaderFamily::Path,
            _ if name.starts_with("SDF_LCD_") => ShaderFamily::SdfLcd,
            _ if name.starts_with("SDF_") => ShaderFamily::Sdf,
            _ if name.starts_with("Image_Opacity_") => ShaderFamily::ImageOpacity,
            _ if name.starts_with("Image_Shadow") && name.contains('V') => {
                ShaderFamily::ImageShadowV
            }
            _ if name.starts_with("Image_Shadow") => ShaderFamily::ImageShadowH,
            _ if name.starts_with("Image_Blur") && name.contains('V') => ShaderFamily::ImageBlurV,
            _ => ShaderFamily::ImageBlurH,
        }
    }

    /// Kernel width of the blur and shadow shaders
    pub fn kernel_taps(self) -> Option<u32> {
        let name = self.name();
        [127, 63, 35]
            .into_iter()
            .find(|taps| name.contains(&taps.to_string()))
    }
}
