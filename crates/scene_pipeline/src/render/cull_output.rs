//! Per-frame output of a cull pass
//!
//! Records are recycled: the cull stage overwrites them in place each frame
//! and only grows the backing buffer when a frame has more visible shapes
//! than any frame before it.

use std::sync::Arc;

use crate::foundation::collections::GrowableBuffer;
use crate::foundation::math::{MatrixSnapshot, IDENTITY_SNAPSHOT};
use crate::render::visual_details::{ClipDetails, LightDetails};
use crate::scene::appearance::{Appearance, OffscreenTexture};
use crate::scene::bounds::AABB;
use crate::scene::custom::CustomData;
use crate::scene::effects::Fog;
use crate::scene::node::{NodeId, ShapeGeometry};

/// One visible shape together with the effect state active at it
#[derive(Debug, Clone)]
pub struct CullOutputRecord {
    /// Shape node the record came from
    pub node: Option<NodeId>,
    /// Geometry to draw; `None` is reported and skipped by the sort stages
    pub geometry: Option<ShapeGeometry>,
    /// Effective appearance, with any override already merged in
    pub appearance: Option<Arc<Appearance>>,
    /// Column-major world transform, reduced for 2D records
    pub transform: MatrixSnapshot,
    /// Lights affecting the shape
    pub lights: Vec<LightDetails>,
    /// Clip planes affecting the shape
    pub clip_planes: Vec<ClipDetails>,
    /// Local fog
    pub fog: Option<Arc<Fog>>,
    /// Payload from a custom renderable
    pub custom_data: Option<CustomData>,
    /// World-space bounds
    pub bounds: Option<AABB>,
    /// Record belongs to the screen-space pass
    pub is_2d: bool,
}

impl Default for CullOutputRecord {
    fn default() -> Self {
        Self {
            node: None,
            geometry: None,
            appearance: None,
            transform: IDENTITY_SNAPSHOT,
            lights: Vec::new(),
            clip_planes: Vec::new(),
            fog: None,
            custom_data: None,
            bounds: None,
            is_2d: false,
        }
    }
}

impl CullOutputRecord {
    /// Clear the record for reuse, keeping the light and clip allocations
    pub fn reset(&mut self) {
        self.node = None;
        self.geometry = None;
        self.appearance = None;
        self.transform = IDENTITY_SNAPSHOT;
        self.lights.clear();
        self.clip_planes.clear();
        self.fog = None;
        self.custom_data = None;
        self.bounds = None;
        self.is_2d = false;
    }
}

/// Everything one cull pass produces
#[derive(Debug)]
pub struct CullResults {
    /// Visible shapes
    pub records: GrowableBuffer<CullOutputRecord>,
    /// Global lights without effect bounds
    pub global_lights: Vec<LightDetails>,
    /// Global lights with world-space effect bounds
    pub bounded_global_lights: Vec<(LightDetails, AABB)>,
    /// Render-to-texture targets used by visible shapes, dependencies first
    pub offscreen: Vec<Arc<OffscreenTexture>>,
    /// The pass was aborted; the output is incomplete
    pub terminated: bool,
}

impl CullResults {
    /// Create empty results with `capacity` preallocated records
    pub fn new(capacity: usize, increment: usize) -> Self {
        Self {
            records: GrowableBuffer::new(capacity, increment),
            global_lights: Vec::new(),
            bounded_global_lights: Vec::new(),
            offscreen: Vec::new(),
            terminated: false,
        }
    }

    /// Reset for a new pass
    pub fn begin(&mut self) {
        self.records.clear();
        self.global_lights.clear();
        self.bounded_global_lights.clear();
        self.offscreen.clear();
        self.terminated = false;
    }

    /// Visible records of the last pass
    pub fn records(&self) -> &[CullOutputRecord] {
        self.records.as_slice()
    }

    /// Append the global lights to every visible 3D record.
    ///
    /// Unbounded global lights go to every record. Bounded ones only go to
    /// records whose bounds intersect the light's effect bounds; a record
    /// without bounds is treated as intersecting everything.
    pub fn distribute_global_lights(&mut self) {
        if self.global_lights.is_empty() && self.bounded_global_lights.is_empty() {
            return;
        }
        for record in self.records.as_mut_slice() {
            if record.is_2d {
                continue;
            }
            record.lights.extend(self.global_lights.iter().cloned());
            for (light, effect_bounds) in &self.bounded_global_lights {
                let hit = record.bounds.map_or(true, |b| b.intersects(effect_bounds));
                if hit {
                    record.lights.push(light.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::scene::effects::Light;

    fn record_at(center: Vec3, is_2d: bool) -> CullOutputRecord {
        CullOutputRecord {
            bounds: Some(AABB::from_center_extents(center, Vec3::new(1.0, 1.0, 1.0))),
            is_2d,
            ..CullOutputRecord::default()
        }
    }

    #[test]
    fn test_distribute_global_lights() {
        let mut results = CullResults::new(4, 4);
        *results.records.next_slot() = record_at(Vec3::zeros(), false);
        *results.records.next_slot() = record_at(Vec3::new(50.0, 0.0, 0.0), false);
        *results.records.next_slot() = record_at(Vec3::zeros(), true);

        let sun = Arc::new(Light::directional(Vec3::new(0.0, -1.0, 0.0)).with_global_only(true));
        let lamp = Arc::new(Light::point(Vec3::zeros()).with_global_only(true));
        results.global_lights.push(LightDetails::new(sun, IDENTITY_SNAPSHOT));
        results.bounded_global_lights.push((
            LightDetails::new(lamp, IDENTITY_SNAPSHOT),
            AABB::from_center_extents(Vec3::zeros(), Vec3::new(5.0, 5.0, 5.0)),
        ));

        results.distribute_global_lights();

        let records = results.records();
        assert_eq!(records[0].lights.len(), 2);
        assert_eq!(records[1].lights.len(), 1);
        assert!(records[2].lights.is_empty());
    }

    #[test]
    fn test_reset_keeps_allocations() {
        let mut record = record_at(Vec3::zeros(), true);
        record.lights.reserve(8);
        let capacity = record.lights.capacity();
        record.reset();
        assert!(!record.is_2d);
        assert!(record.bounds.is_none());
        assert_eq!(record.lights.capacity(), capacity);
    }
}
