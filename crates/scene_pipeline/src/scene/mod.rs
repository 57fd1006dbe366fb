//! Scene graph model read by the cull stages
//!
//! The graph is an arena of [`Node`]s addressed by [`NodeId`]. Renderable
//! data (geometry, appearance, effects) is shared through `Arc` so the sort
//! stages can compare state by identity.

pub mod appearance;
pub mod bounds;
pub mod custom;
pub mod effects;
pub mod graph;
pub mod node;

pub use appearance::{
    Appearance, AppearanceOverride, AttributeKind, BlendAttributes, DepthAttributes, Geometry,
    LineAttributes, Material, OffscreenTexture, PointAttributes, PolygonAttributes, ShaderArguments,
    ShaderProgram, StateComponent, StencilAttributes, Texture,
};
pub use bounds::{Frustum, FrustumTest, Plane, AABB};
pub use custom::{CustomCullOutput, CustomCullRequest, CustomCullable, CustomData, CustomRenderable};
pub use effects::{ClipPlane, Fog, FogMode, Light, LightKind};
pub use graph::{SceneError, SceneGraph};
pub use node::{LeafNode, Node, NodeId, ShapeGeometry, ShapeNode};
