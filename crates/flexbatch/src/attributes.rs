//! Vertex layout declaration and attribute offset resolution.
//!
//! Item kinds declare an ordered list of [`VertexAttribute`]s; the engine
//! turns that into a [`VertexLayout`] (with a float stride) exactly once at
//! construction and resolves it into [`AttributeOffsets`] so vertex writers
//! can address attributes by name or declaration index without re-walking
//! the layout.
//!
//! All offsets and strides are measured in `f32` units, not bytes. A packed
//! color attribute is one float wide (see [`crate::Color::packed`]).

use std::fmt;

use ahash::AHashMap;

/// Shader attribute name used for vertex positions.
pub const POSITION: &str = "a_position";
/// Shader attribute name used for the packed vertex color.
pub const COLOR: &str = "a_color";
/// Prefix for per-unit texture coordinate attributes (`a_texCoord0`, ...).
pub const TEX_COORD_PREFIX: &str = "a_texCoord";

/// The texture coordinate attribute name for a texture unit.
pub fn tex_coord_name(unit: usize) -> String {
    format!("{TEX_COORD_PREFIX}{unit}")
}

/// One attribute of a vertex: a shader-facing name and a component count
/// in `1..=4` floats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexAttribute {
    pub name: String,
    pub components: usize,
}

impl VertexAttribute {
    pub fn new(name: impl Into<String>, components: usize) -> Self {
        Self {
            name: name.into(),
            components,
        }
    }

    /// A 2D position attribute named [`POSITION`].
    pub fn position_2d() -> Self {
        Self::new(POSITION, 2)
    }

    /// A 3D position attribute named [`POSITION`].
    pub fn position_3d() -> Self {
        Self::new(POSITION, 3)
    }

    /// A packed-color attribute named [`COLOR`]; one float wide.
    pub fn color_packed() -> Self {
        Self::new(COLOR, 1)
    }

    /// A 2D texture coordinate attribute for the given unit.
    pub fn tex_coords(unit: usize) -> Self {
        Self::new(tex_coord_name(unit), 2)
    }
}

/// The attribute set shared by the built-in item kinds: position, packed
/// color, then one 2D texture coordinate pair per texture unit.
pub fn standard_attributes(position_components: usize, texture_units: usize) -> Vec<VertexAttribute> {
    let mut attributes = Vec::with_capacity(2 + texture_units);
    attributes.push(VertexAttribute::new(POSITION, position_components));
    attributes.push(VertexAttribute::color_packed());
    for unit in 0..texture_units {
        attributes.push(VertexAttribute::tex_coords(unit));
    }
    attributes
}

/// Rejected vertex layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// A layout must declare at least one attribute.
    Empty,
    /// Component counts outside `1..=4` are not addressable as a GPU
    /// vertex attribute.
    BadComponents { name: String, components: usize },
    /// Attribute names must be unique within a layout.
    DuplicateName { name: String },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::Empty => write!(f, "vertex layout declares no attributes"),
            LayoutError::BadComponents { name, components } => write!(
                f,
                "attribute '{name}' has {components} components, expected 1..=4"
            ),
            LayoutError::DuplicateName { name } => {
                write!(f, "attribute '{name}' is declared more than once")
            }
        }
    }
}

impl std::error::Error for LayoutError {}

/// An ordered, validated attribute list with a computed float stride.
#[derive(Debug, Clone)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
    stride: usize,
}

impl VertexLayout {
    pub fn new(attributes: Vec<VertexAttribute>) -> Result<Self, LayoutError> {
        if attributes.is_empty() {
            return Err(LayoutError::Empty);
        }
        let mut stride = 0;
        for (i, attribute) in attributes.iter().enumerate() {
            if attribute.components == 0 || attribute.components > 4 {
                return Err(LayoutError::BadComponents {
                    name: attribute.name.clone(),
                    components: attribute.components,
                });
            }
            if attributes[..i].iter().any(|a| a.name == attribute.name) {
                return Err(LayoutError::DuplicateName {
                    name: attribute.name.clone(),
                });
            }
            stride += attribute.components;
        }
        Ok(Self { attributes, stride })
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Floats per vertex.
    pub fn stride(&self) -> usize {
        self.stride
    }
}

/// Per-attribute float offsets, resolved once from a [`VertexLayout`].
///
/// Offsets are cumulative: attribute `i` starts at the sum of the component
/// counts of attributes `0..i`. Lookups are stable for the life of the
/// engine; name and index lookups always agree.
#[derive(Debug, Clone)]
pub struct AttributeOffsets {
    by_name: AHashMap<String, usize>,
    by_index: Vec<usize>,
}

impl AttributeOffsets {
    pub fn new(layout: &VertexLayout) -> Self {
        let mut by_name = AHashMap::with_capacity(layout.attributes().len());
        let mut by_index = Vec::with_capacity(layout.attributes().len());
        let mut offset = 0;
        for attribute in layout.attributes() {
            by_name.insert(attribute.name.clone(), offset);
            by_index.push(offset);
            offset += attribute.components;
        }
        Self { by_name, by_index }
    }

    /// Float offset of the named attribute, or `None` if the layout does
    /// not declare it.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Float offset of the attribute at the given declaration index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not within the declared attribute count.
    pub fn offset_of_index(&self, index: usize) -> usize {
        self.by_index[index]
    }

    /// Number of declared attributes.
    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }
}
