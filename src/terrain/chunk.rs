//! A single Marching Cubes chunk.
//!
//! A chunk covers a fixed block of the shared density field. Remeshing walks
//! every cell of that block, emits flat-shaded triangles in the chunk's unit
//! cube, and rebuilds a small octree over them for narrow-phase raycasts.
//! Corner reads may reach one sample into the neighbouring chunk, so adjacent
//! chunks share their boundary samples and the surface has no seams.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::core::transform::{transform_normal, Transform};
use crate::core::types::{IVec3, Vec3};
use crate::math::{Aabb, Ray};
use crate::spatial::{Octree, SpatialIndex};
use super::config::TerrainConfig;
use super::density::DensityField;
use super::physics::{ColliderHandle, PhysicsBackend};
use super::raycast::RayHit;
use super::tables::{CORNER_OFFSETS, EDGE_CONNECTIONS, EDGE_TABLE, TRI_TABLE};

/// Integer coordinate of a chunk in the volume grid
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn as_ivec3(&self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }

    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

impl From<IVec3> for ChunkCoord {
    fn from(v: IVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

/// GPU vertex layout: position then flat normal, both in chunk space
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl TerrainVertex {
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }
}

/// Three vertices in emission order
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub points: [Vec3; 3],
}

impl Triangle {
    /// Plane normal from the winding order
    pub fn flat_normal(&self) -> Vec3 {
        let [a, b, c] = self.points;
        (b - a).cross(c - a).normalize_or_zero()
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(&self.points)
    }
}

/// Interpolate the surface crossing between two corners.
///
/// Equal corner values give the edge midpoint.
fn point_lerp(p1: Vec3, v1: f32, p2: Vec3, v2: f32, surface: f32) -> Vec3 {
    let t = if v1 == v2 {
        0.5
    } else {
        ((surface - v1) / (v2 - v1)).clamp(0.0, 1.0)
    };
    p1 + (p2 - p1) * t
}

/// Triangulated block of the density field.
#[derive(Debug)]
pub struct Chunk {
    coord: ChunkCoord,
    /// First sample of this chunk in the field
    start: IVec3,
    /// Cells per axis
    size: IVec3,
    config: TerrainConfig,
    /// Placement of the chunk's unit cube inside the volume's unit cube
    transform: Transform,
    vertices: Vec<TerrainVertex>,
    triangles: Octree<Triangle>,
    collider: Option<ColliderHandle>,
    simulation_active: bool,
}

impl Chunk {
    /// Create an empty chunk at `coord` in a grid of `config.grid_size` chunks
    /// per axis, covering `size` cells per axis of the field.
    pub fn new(coord: ChunkCoord, size: IVec3, config: TerrainConfig) -> Self {
        let grid_step = config.grid_step();
        let transform = Transform::new(
            coord.as_ivec3().as_vec3() * grid_step,
            Default::default(),
            Vec3::splat(grid_step),
        );
        Self {
            coord,
            start: coord.as_ivec3() * size,
            size,
            config,
            transform,
            vertices: Vec::new(),
            triangles: Octree::default(),
            collider: None,
            simulation_active: false,
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn start(&self) -> IVec3 {
        self.start
    }

    pub fn size(&self) -> IVec3 {
        self.size
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Bounds in the volume's local unit cube
    pub fn bounds(&self) -> Aabb {
        let min = self.transform.position;
        Aabb::new(min, min + self.transform.scale)
    }

    /// True when the last remesh produced no triangles
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertices(&self) -> &[TerrainVertex] {
        &self.vertices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Vertex stream ready for upload
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Vertex positions in chunk space, as fed to a collider
    pub fn vertex_positions(&self) -> Vec<Vec3> {
        self.vertices.iter().map(TerrainVertex::position).collect()
    }

    /// Triangles in emission order
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.vertices.chunks_exact(3).map(|v| Triangle {
            points: [v[0].position(), v[1].position(), v[2].position()],
        })
    }

    /// Regenerate triangles and the triangle index from the field.
    pub fn remesh(&mut self, field: &DensityField) {
        self.vertices.clear();
        for z in 0..self.size.z {
            for y in 0..self.size.y {
                for x in 0..self.size.x {
                    self.march_cell(field, IVec3::new(x, y, z));
                }
            }
        }
        self.vertices.shrink_to_fit();
        self.rebuild_index();
    }

    fn march_cell(&mut self, field: &DensityField, cell: IVec3) {
        let surface = self.config.surface_value as f32;
        let cell_length = self.size.as_vec3().recip();

        let mut positions = [Vec3::ZERO; 8];
        let mut values = [0.0f32; 8];
        let mut cube_index = 0usize;
        for (i, offset) in CORNER_OFFSETS.iter().enumerate() {
            let corner = cell + IVec3::new(offset[0] as i32, offset[1] as i32, offset[2] as i32);
            let value = field.get_or(self.start + corner, self.config.chunk_out_of_bounds) as f32;
            positions[i] = corner.as_vec3() * cell_length;
            values[i] = value;
            if value < surface {
                cube_index |= 1 << i;
            }
        }

        if EDGE_TABLE[cube_index] == 0 {
            return;
        }

        let edge_point = |edge: i8| {
            let [a, b] = EDGE_CONNECTIONS[edge as usize];
            point_lerp(positions[a], values[a], positions[b], values[b], surface)
        };

        for tri in TRI_TABLE[cube_index].chunks_exact(3).take_while(|t| t[0] != -1) {
            // First two edges swapped so the winding faces the air side
            let points = [edge_point(tri[1]), edge_point(tri[0]), edge_point(tri[2])];
            let normal = Triangle { points }.flat_normal();
            if normal == Vec3::ZERO {
                continue;
            }
            self.vertices.extend(points.iter().map(|&p| TerrainVertex::new(p, normal)));
        }
    }

    fn rebuild_index(&mut self) {
        if self.vertices.is_empty() {
            self.triangles = Octree::default();
            return;
        }
        let count = self.triangle_count();
        self.triangles.initialize(
            Aabb::new(Vec3::ZERO, Vec3::ONE),
            self.config.triangle_index_depth,
            self.config.triangle_index_leaf,
            count,
        );
        let triangles: Vec<Triangle> = self.triangles().collect();
        for triangle in triangles {
            self.triangles.insert(triangle.bounds(), triangle, false);
        }
        self.triangles.rebalance();
    }

    /// Closest hit against this chunk's triangles.
    ///
    /// `ray` and the returned hit are in volume-local space. `tests` is
    /// incremented by the number of candidate triangles examined.
    pub fn raycast(&self, ray: &Ray, distance: f32, tests: &mut usize) -> Option<RayHit> {
        if ray.direction.length_squared() == 0.0 || distance == 0.0 {
            return None;
        }

        let to_local = self.transform.inverse_matrix();
        let (local_ray, local_distance) = ray.transform_segment(&to_local, distance);

        let candidates = self.triangles.cull_by_ray(&local_ray, local_distance);
        *tests += candidates.len();

        let (t, triangle) = candidates
            .into_iter()
            .filter_map(|(_, tri)| {
                let [a, b, c] = tri.points;
                local_ray
                    .intersects_triangle(a, b, c)
                    .filter(|t| *t <= local_distance)
                    .map(|t| (t, tri))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))?;

        let point = self.transform.matrix().transform_point3(local_ray.at(t));
        let normal = transform_normal(&self.transform.normal_matrix(), triangle.flat_normal());
        Some(RayHit {
            point,
            normal,
            distance: (point - ray.origin).length(),
        })
    }

    /// Drop the current collider and build a new one from the triangles.
    ///
    /// `volume` is the volume's world placement. New colliders start with
    /// simulation disabled.
    pub fn regenerate_collider(&mut self, physics: &mut dyn PhysicsBackend, volume: &Transform) {
        if let Some(handle) = self.collider.take() {
            physics.release_collider(handle);
        }
        self.simulation_active = false;
        if self.vertices.is_empty() {
            return;
        }

        let position = volume.matrix().transform_point3(self.transform.position);
        let placement = Transform::new(position, volume.rotation, self.transform.scale * volume.scale);
        self.collider = physics.create_triangle_mesh(&self.vertex_positions(), &placement);
        if let Some(handle) = self.collider {
            physics.set_simulation_enabled(handle, false);
        }
    }

    pub fn collider(&self) -> Option<ColliderHandle> {
        self.collider
    }

    pub fn is_physics_active(&self) -> bool {
        self.simulation_active
    }

    /// Enable or disable collider simulation. Only calls into the backend
    /// when the state changes and a collider exists.
    pub fn set_physics_active(&mut self, physics: &mut dyn PhysicsBackend, active: bool) {
        let Some(handle) = self.collider else {
            return;
        };
        if active != self.simulation_active {
            self.simulation_active = active;
            physics.set_simulation_enabled(handle, active);
        }
    }
}
