//! UV sphere tessellation

use std::f32::consts::PI;

use eyeorb_core::RenderTier;

/// Sphere radius in world units
pub const SPHERE_RADIUS: f32 = 1.0;

/// Width and height segments for a tier
pub fn segments_for(tier: RenderTier) -> u32 {
    match tier {
        RenderTier::High => 64,
        RenderTier::Medium => 48,
    }
}

/// Indexed sphere mesh. Normals are unit length and point outwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SphereMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub segments: u32,
}

impl SphereMesh {
    /// Build a sphere with `segments` slices around and `segments` stacks
    /// from pole to pole. Degenerate pole triangles are skipped.
    pub fn new(radius: f32, segments: u32) -> Self {
        let width = segments.max(3);
        let height = segments.max(2);
        let row = width + 1;

        let vertex_count = ((width + 1) * (height + 1)) as usize;
        let mut positions = Vec::with_capacity(vertex_count);
        let mut normals = Vec::with_capacity(vertex_count);

        for iy in 0..=height {
            let v = iy as f32 / height as f32;
            let (sin_theta, cos_theta) = (v * PI).sin_cos();
            for ix in 0..=width {
                let u = ix as f32 / width as f32;
                let (sin_phi, cos_phi) = (u * 2.0 * PI).sin_cos();

                let normal = [-cos_phi * sin_theta, cos_theta, sin_phi * sin_theta];
                positions.push([normal[0] * radius, normal[1] * radius, normal[2] * radius]);
                normals.push(normal);
            }
        }

        let mut indices = Vec::with_capacity((6 * width * (height - 1)) as usize);
        for iy in 0..height {
            for ix in 0..width {
                let a = iy * row + ix + 1;
                let b = iy * row + ix;
                let c = (iy + 1) * row + ix;
                let d = (iy + 1) * row + ix + 1;

                if iy != 0 {
                    indices.extend_from_slice(&[a, b, d]);
                }
                if iy != height - 1 {
                    indices.extend_from_slice(&[b, c, d]);
                }
            }
        }

        SphereMesh {
            positions,
            normals,
            indices,
            segments,
        }
    }

    pub fn for_tier(tier: RenderTier) -> Self {
        Self::new(SPHERE_RADIUS, segments_for(tier))
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Interleaved `position, normal` vertex data, six floats per vertex
    pub fn interleaved(&self) -> Vec<f32> {
        self.positions
            .iter()
            .zip(&self.normals)
            .flat_map(|(p, n)| [p[0], p[1], p[2], n[0], n[1], n[2]])
            .collect()
    }
}
