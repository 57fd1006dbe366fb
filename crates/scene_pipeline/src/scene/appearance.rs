//! Appearance, geometry and render state carried by shapes
//!
//! Every state object is shared through an `Arc`; the sort stages compare
//! state by pointer identity, so two shapes that should share GPU state must
//! share the same `Arc`.

use std::sync::Arc;

use bitflags::bitflags;

use crate::foundation::math::Vec3;
use crate::scene::node::NodeId;

/// Primitive topology of a geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Primitive {
    /// Independent triangles
    #[default]
    Triangles,
    /// Triangle strips
    TriangleStrips,
    /// Independent lines
    Lines,
    /// Points
    Points,
}

/// Vertex data of a shape, as far as the pipeline needs to know it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Geometry {
    /// Debug name
    pub name: String,
    /// Topology
    pub primitive: Primitive,
    /// Number of vertices
    pub vertex_count: usize,
    /// Per-vertex colours carry alpha below one
    pub has_transparency: bool,
}

impl Geometry {
    /// Create an opaque triangle geometry
    pub fn new(name: impl Into<String>, vertex_count: usize) -> Self {
        Self {
            name: name.into(),
            vertex_count,
            ..Self::default()
        }
    }

    /// Mark the vertex colours as translucent
    pub fn with_transparency(mut self, has_transparency: bool) -> Self {
        self.has_transparency = has_transparency;
        self
    }
}

/// Fixed-function style material
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Ambient reflectance
    pub ambient: Vec3,
    /// Diffuse reflectance
    pub diffuse: Vec3,
    /// Specular reflectance
    pub specular: Vec3,
    /// Emitted colour
    pub emissive: Vec3,
    /// Specular exponent
    pub shininess: f32,
    /// 0.0 is fully opaque, 1.0 fully transparent
    pub transparency: f32,
    /// Whether lighting is evaluated at all
    pub lighting_enabled: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Vec3::new(0.2, 0.2, 0.2),
            diffuse: Vec3::new(0.8, 0.8, 0.8),
            specular: Vec3::zeros(),
            emissive: Vec3::zeros(),
            shininess: 0.0,
            transparency: 0.0,
            lighting_enabled: true,
        }
    }
}

impl Material {
    /// Create an opaque material with the given diffuse colour
    pub fn diffuse(color: Vec3) -> Self {
        Self {
            diffuse: color,
            ..Self::default()
        }
    }

    /// Set the transparency
    pub fn with_transparency(mut self, transparency: f32) -> Self {
        self.transparency = transparency;
        self
    }
}

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullFace {
    /// Draw both faces
    None,
    /// Drop back faces
    #[default]
    Back,
    /// Drop front faces
    Front,
}

/// Polygon rasterisation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawMode {
    /// Filled polygons
    #[default]
    Fill,
    /// Outlines only
    Line,
    /// Vertices only
    Point,
}

/// Polygon rasterisation state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolygonAttributes {
    /// Which faces are removed
    pub cull_face: CullFace,
    /// How polygons are drawn
    pub draw_mode: DrawMode,
    /// Counter-clockwise winding is front facing
    pub front_ccw: bool,
}

/// Line rasterisation state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LineAttributes {
    /// Width in pixels
    pub width: f32,
    /// Stipple pattern, if any
    pub stipple: Option<u16>,
}

/// Point rasterisation state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointAttributes {
    /// Size in pixels
    pub size: f32,
    /// Smooth points
    pub antialiased: bool,
}

/// Blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendFactor {
    /// 0
    Zero,
    /// 1
    #[default]
    One,
    /// Source alpha
    SrcAlpha,
    /// 1 - source alpha
    OneMinusSrcAlpha,
}

/// Framebuffer blending state
#[derive(Debug, Clone, PartialEq)]
pub struct BlendAttributes {
    /// Source factor
    pub source: BlendFactor,
    /// Destination factor
    pub destination: BlendFactor,
    /// Blending active
    pub enabled: bool,
}

impl Default for BlendAttributes {
    fn default() -> Self {
        Self {
            source: BlendFactor::SrcAlpha,
            destination: BlendFactor::OneMinusSrcAlpha,
            enabled: true,
        }
    }
}

/// Comparison used by depth and stencil tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareFunction {
    /// Never passes
    Never,
    /// Passes when less
    #[default]
    Less,
    /// Passes when less or equal
    LessEqual,
    /// Passes when equal
    Equal,
    /// Always passes
    Always,
}

/// Depth buffer state
#[derive(Debug, Clone, PartialEq)]
pub struct DepthAttributes {
    /// Depth testing active
    pub test_enabled: bool,
    /// Depth writes active
    pub write_enabled: bool,
    /// Depth comparison
    pub function: CompareFunction,
}

impl Default for DepthAttributes {
    fn default() -> Self {
        Self {
            test_enabled: true,
            write_enabled: true,
            function: CompareFunction::Less,
        }
    }
}

/// Stencil buffer state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StencilAttributes {
    /// Stencil comparison
    pub function: CompareFunction,
    /// Reference value
    pub reference: u32,
    /// Comparison mask
    pub mask: u32,
}

/// A linked shader program
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShaderProgram {
    /// Program name, used by backends to look up compiled objects
    pub name: String,
}

impl ShaderProgram {
    /// Create a program reference
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Value of a single shader uniform
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderValue {
    /// Scalar float
    Float(f32),
    /// Integer
    Int(i32),
    /// 4-component vector
    Vec4([f32; 4]),
    /// Column-major 4x4 matrix
    Matrix([f32; 16]),
}

/// Uniform values bound alongside a shader program
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShaderArguments {
    /// Named uniform values
    pub values: Vec<(String, ShaderValue)>,
}

/// A render-to-texture target whose content is another sub-scene
#[derive(Debug, Clone, PartialEq)]
pub struct OffscreenTexture {
    /// Debug name
    pub name: String,
    /// Root of the sub-scene rendered into the texture
    pub root: NodeId,
    /// Target size in pixels
    pub size: (u32, u32),
    /// The sub-scene must be re-rendered this frame
    pub repaint_required: bool,
}

/// Where a texture's texels come from
#[derive(Debug, Clone, PartialEq)]
pub enum TextureSource {
    /// Uploaded image data
    Image {
        /// Size in pixels
        size: (u32, u32),
    },
    /// Rendered from a sub-scene
    Offscreen(Arc<OffscreenTexture>),
}

/// A texture bound to a texture unit
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    /// Debug name
    pub name: String,
    /// Texel source
    pub source: TextureSource,
    /// Texels carry alpha below one
    pub has_alpha: bool,
}

impl Texture {
    /// Create an image texture
    pub fn image(name: impl Into<String>, size: (u32, u32)) -> Self {
        Self {
            name: name.into(),
            source: TextureSource::Image { size },
            has_alpha: false,
        }
    }

    /// Create a texture rendered from a sub-scene
    pub fn offscreen(target: Arc<OffscreenTexture>) -> Self {
        Self {
            name: target.name.clone(),
            source: TextureSource::Offscreen(target),
            has_alpha: false,
        }
    }

    /// Mark the texels as translucent
    pub fn with_alpha(mut self, has_alpha: bool) -> Self {
        self.has_alpha = has_alpha;
        self
    }

    /// Offscreen target backing this texture, if any
    pub fn offscreen_target(&self) -> Option<&Arc<OffscreenTexture>> {
        match &self.source {
            TextureSource::Offscreen(target) => Some(target),
            TextureSource::Image { .. } => None,
        }
    }
}

bitflags! {
    /// Which state components an appearance declares
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AppearanceComponents: u16 {
        /// Material
        const MATERIAL = 1 << 0;
        /// Shader program
        const SHADER = 1 << 1;
        /// Shader arguments
        const SHADER_ARGS = 1 << 2;
        /// At least one texture unit
        const TEXTURES = 1 << 3;
        /// Polygon attributes
        const POLYGON = 1 << 4;
        /// Line attributes
        const LINE = 1 << 5;
        /// Point attributes
        const POINT = 1 << 6;
        /// Blend attributes
        const BLEND = 1 << 7;
        /// Depth attributes
        const DEPTH = 1 << 8;
        /// Stencil attributes
        const STENCIL = 1 << 9;

        /// Components that decide whether a shape is transparent
        const TRANSPARENCY_INFO = Self::MATERIAL.bits() | Self::BLEND.bits() | Self::TEXTURES.bits();
    }
}

/// Kinds of fixed-function attribute state the sort stages track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    /// Material
    Material,
    /// Polygon attributes
    Polygon,
    /// Line attributes
    Line,
    /// Point attributes
    Point,
    /// Blend attributes
    Blend,
    /// Depth attributes
    Depth,
    /// Stencil attributes
    Stencil,
}

impl AttributeKind {
    /// Every kind, in emission order
    pub const ALL: [AttributeKind; 7] = [
        AttributeKind::Material,
        AttributeKind::Polygon,
        AttributeKind::Line,
        AttributeKind::Point,
        AttributeKind::Blend,
        AttributeKind::Depth,
        AttributeKind::Stencil,
    ];

    /// Position of this kind in [`AttributeKind::ALL`]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// One piece of state that can be started and stopped as a unit
#[derive(Debug, Clone)]
pub enum StateComponent {
    /// A whole appearance, used when state is not split up
    Appearance(Arc<Appearance>),
    /// Material
    Material(Arc<Material>),
    /// Polygon attributes
    Polygon(Arc<PolygonAttributes>),
    /// Line attributes
    Line(Arc<LineAttributes>),
    /// Point attributes
    Point(Arc<PointAttributes>),
    /// Blend attributes
    Blend(Arc<BlendAttributes>),
    /// Depth attributes
    Depth(Arc<DepthAttributes>),
    /// Stencil attributes
    Stencil(Arc<StencilAttributes>),
}

impl StateComponent {
    /// Whether both components are the same shared state object
    pub fn same_as(&self, other: &StateComponent) -> bool {
        match (self, other) {
            (Self::Appearance(a), Self::Appearance(b)) => Arc::ptr_eq(a, b),
            (Self::Material(a), Self::Material(b)) => Arc::ptr_eq(a, b),
            (Self::Polygon(a), Self::Polygon(b)) => Arc::ptr_eq(a, b),
            (Self::Line(a), Self::Line(b)) => Arc::ptr_eq(a, b),
            (Self::Point(a), Self::Point(b)) => Arc::ptr_eq(a, b),
            (Self::Blend(a), Self::Blend(b)) => Arc::ptr_eq(a, b),
            (Self::Depth(a), Self::Depth(b)) => Arc::ptr_eq(a, b),
            (Self::Stencil(a), Self::Stencil(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Address of the shared state object, usable as a sort key
    pub fn address(&self) -> usize {
        match self {
            Self::Appearance(a) => Arc::as_ptr(a) as usize,
            Self::Material(a) => Arc::as_ptr(a) as usize,
            Self::Polygon(a) => Arc::as_ptr(a) as usize,
            Self::Line(a) => Arc::as_ptr(a) as usize,
            Self::Point(a) => Arc::as_ptr(a) as usize,
            Self::Blend(a) => Arc::as_ptr(a) as usize,
            Self::Depth(a) => Arc::as_ptr(a) as usize,
            Self::Stencil(a) => Arc::as_ptr(a) as usize,
        }
    }
}

/// Complete visual state of a shape
#[derive(Debug, Clone, Default)]
pub struct Appearance {
    /// Material
    pub material: Option<Arc<Material>>,
    /// Shader program
    pub shader: Option<Arc<ShaderProgram>>,
    /// Shader arguments
    pub shader_args: Option<Arc<ShaderArguments>>,
    /// Textures indexed by texture unit; `None` leaves the unit unused
    pub textures: Vec<Option<Arc<Texture>>>,
    /// Polygon attributes
    pub polygon: Option<Arc<PolygonAttributes>>,
    /// Line attributes
    pub line: Option<Arc<LineAttributes>>,
    /// Point attributes
    pub point: Option<Arc<PointAttributes>>,
    /// Blend attributes
    pub blend: Option<Arc<BlendAttributes>>,
    /// Depth attributes
    pub depth: Option<Arc<DepthAttributes>>,
    /// Stencil attributes
    pub stencil: Option<Arc<StencilAttributes>>,
}

impl Appearance {
    /// Create an appearance with only a material
    pub fn with_material(material: Arc<Material>) -> Self {
        Self {
            material: Some(material),
            ..Self::default()
        }
    }

    /// Components this appearance declares
    pub fn components(&self) -> AppearanceComponents {
        let mut flags = AppearanceComponents::empty();
        flags.set(AppearanceComponents::MATERIAL, self.material.is_some());
        flags.set(AppearanceComponents::SHADER, self.shader.is_some());
        flags.set(AppearanceComponents::SHADER_ARGS, self.shader_args.is_some());
        flags.set(AppearanceComponents::TEXTURES, self.textures.iter().any(Option::is_some));
        flags.set(AppearanceComponents::POLYGON, self.polygon.is_some());
        flags.set(AppearanceComponents::LINE, self.line.is_some());
        flags.set(AppearanceComponents::POINT, self.point.is_some());
        flags.set(AppearanceComponents::BLEND, self.blend.is_some());
        flags.set(AppearanceComponents::DEPTH, self.depth.is_some());
        flags.set(AppearanceComponents::STENCIL, self.stencil.is_some());
        flags
    }

    /// Whether this appearance says anything about transparency
    pub fn has_transparency_info(&self) -> bool {
        self.components().intersects(AppearanceComponents::TRANSPARENCY_INFO)
    }

    /// Transparency as declared by material, blending and textures
    pub fn is_transparent(&self) -> bool {
        self.material.as_ref().is_some_and(|m| m.transparency > 0.0)
            || self.blend.as_ref().is_some_and(|b| b.enabled)
            || self.textures.iter().flatten().any(|t| t.has_alpha)
    }

    /// Attribute of the given kind, wrapped for emission
    pub fn attribute(&self, kind: AttributeKind) -> Option<StateComponent> {
        match kind {
            AttributeKind::Material => self.material.clone().map(StateComponent::Material),
            AttributeKind::Polygon => self.polygon.clone().map(StateComponent::Polygon),
            AttributeKind::Line => self.line.clone().map(StateComponent::Line),
            AttributeKind::Point => self.point.clone().map(StateComponent::Point),
            AttributeKind::Blend => self.blend.clone().map(StateComponent::Blend),
            AttributeKind::Depth => self.depth.clone().map(StateComponent::Depth),
            AttributeKind::Stencil => self.stencil.clone().map(StateComponent::Stencil),
        }
    }

    /// Combine an override with a leaf's own appearance.
    ///
    /// Fields the override sets always win. Fields it leaves unset come from
    /// the leaf when `use_local` is true and stay unset otherwise.
    pub fn merged(overriding: &Appearance, local: Option<&Appearance>, use_local: bool) -> Appearance {
        fn pick<T>(over: &Option<Arc<T>>, local: Option<&Option<Arc<T>>>) -> Option<Arc<T>> {
            over.clone().or_else(|| local.and_then(Option::clone))
        }

        let fallback = if use_local { local } else { None };

        let textures = if overriding.textures.iter().any(Option::is_some) {
            overriding.textures.clone()
        } else {
            fallback.map(|app| app.textures.clone()).unwrap_or_default()
        };

        Appearance {
            material: pick(&overriding.material, fallback.map(|a| &a.material)),
            shader: pick(&overriding.shader, fallback.map(|a| &a.shader)),
            shader_args: pick(&overriding.shader_args, fallback.map(|a| &a.shader_args)),
            textures,
            polygon: pick(&overriding.polygon, fallback.map(|a| &a.polygon)),
            line: pick(&overriding.line, fallback.map(|a| &a.line)),
            point: pick(&overriding.point, fallback.map(|a| &a.point)),
            blend: pick(&overriding.blend, fallback.map(|a| &a.blend)),
            depth: pick(&overriding.depth, fallback.map(|a| &a.depth)),
            stencil: pick(&overriding.stencil, fallback.map(|a| &a.stencil)),
        }
    }
}

/// Appearance override leaf: replaces the appearance of every shape below
/// the declaring group.
#[derive(Debug, Clone)]
pub struct AppearanceOverride {
    /// Appearance applied to the affected shapes
    pub appearance: Arc<Appearance>,
    /// Disabled overrides are skipped by culling
    pub enabled: bool,
    /// Overrides declared deeper in the graph are ignored while this one is
    /// active
    pub override_lower: bool,
    /// Fields this override leaves unset are taken from each shape's own
    /// appearance
    pub use_local_appearance: bool,
}

impl AppearanceOverride {
    /// Create an enabled override that does not block lower overrides
    pub fn new(appearance: Arc<Appearance>) -> Self {
        Self {
            appearance,
            enabled: true,
            override_lower: false,
            use_local_appearance: false,
        }
    }

    /// Make this override win over overrides declared below it
    pub fn with_override_lower(mut self, override_lower: bool) -> Self {
        self.override_lower = override_lower;
        self
    }

    /// Fall back to each shape's own appearance for unset fields
    pub fn with_local_appearance(mut self, use_local: bool) -> Self {
        self.use_local_appearance = use_local;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transparency_info() {
        let plain = Appearance::default();
        assert!(!plain.has_transparency_info());

        let with_polygon = Appearance {
            polygon: Some(Arc::new(PolygonAttributes::default())),
            ..Appearance::default()
        };
        assert!(!with_polygon.has_transparency_info());

        let glassy = Appearance::with_material(Arc::new(Material::default().with_transparency(0.5)));
        assert!(glassy.has_transparency_info());
        assert!(glassy.is_transparent());

        let alpha_texture = Appearance {
            textures: vec![None, Some(Arc::new(Texture::image("leaf", (8, 8)).with_alpha(true)))],
            ..Appearance::default()
        };
        assert!(alpha_texture.is_transparent());
    }

    #[test]
    fn test_merge_override_wins_and_local_fills() {
        let local_material = Arc::new(Material::diffuse(Vec3::new(1.0, 0.0, 0.0)));
        let local_polygon = Arc::new(PolygonAttributes::default());
        let local = Appearance {
            material: Some(local_material.clone()),
            polygon: Some(local_polygon.clone()),
            ..Appearance::default()
        };

        let override_material = Arc::new(Material::diffuse(Vec3::new(0.0, 1.0, 0.0)));
        let overriding = Appearance::with_material(override_material.clone());

        let merged = Appearance::merged(&overriding, Some(&local), true);
        assert!(Arc::ptr_eq(merged.material.as_ref().unwrap(), &override_material));
        assert!(Arc::ptr_eq(merged.polygon.as_ref().unwrap(), &local_polygon));

        let replaced = Appearance::merged(&overriding, Some(&local), false);
        assert!(Arc::ptr_eq(replaced.material.as_ref().unwrap(), &override_material));
        assert!(replaced.polygon.is_none());
    }

    #[test]
    fn test_state_component_identity() {
        let material = Arc::new(Material::default());
        let a = StateComponent::Material(material.clone());
        let b = StateComponent::Material(material);
        let c = StateComponent::Material(Arc::new(Material::default()));
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
        assert_eq!(a.address(), b.address());
    }
}
