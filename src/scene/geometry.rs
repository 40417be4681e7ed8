//! Procedural mesh geometry.

use std::f32::consts::{PI, TAU};

use anyhow::bail;
use nalgebra::Vector3;
use serde::Serialize;

/// Indexed triangle mesh data.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Appends the back faces of all triangles, so the mesh is visible from both sides.
    pub fn make_double_sided(&mut self) {
        let offset = self.positions.len() as u32;
        self.positions.extend_from_within(..);
        self.uvs.extend_from_within(..);
        let flipped = self
            .normals
            .iter()
            .map(|[x, y, z]| [-x, -y, -z])
            .collect::<Vec<_>>();
        self.normals.extend(flipped);

        let back = self
            .indices
            .chunks_exact(3)
            .flat_map(|tri| [tri[0] + offset, tri[2] + offset, tri[1] + offset])
            .collect::<Vec<_>>();
        self.indices.extend(back);
    }

    /// Recomputes smooth vertex normals from the triangles.
    ///
    /// Triangles referencing vertices out of range are skipped.
    pub fn compute_normals(&mut self) {
        let mut normals = vec![Vector3::<f32>::zeros(); self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let (Some(pa), Some(pb), Some(pc)) = (
                self.positions.get(a),
                self.positions.get(b),
                self.positions.get(c),
            ) else {
                continue;
            };
            let (pa, pb, pc) = (Vector3::from(*pa), Vector3::from(*pb), Vector3::from(*pc));
            // Area weighted.
            let n = (pb - pa).cross(&(pc - pa));
            for i in [a, b, c] {
                normals[i] += n;
            }
        }
        self.normals = normals
            .into_iter()
            .map(|n| n.try_normalize(1e-12).unwrap_or_else(Vector3::y).into())
            .collect();
    }
}

/// Which ends of a tube are closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cap {
    None,
    Start,
    End,
    Both,
}

impl Cap {
    fn start(self) -> bool {
        matches!(self, Cap::Start | Cap::Both)
    }

    fn end(self) -> bool {
        matches!(self, Cap::End | Cap::Both)
    }
}

/// Builds a tube of constant `radius` along `path`.
///
/// Every path point gets a ring of `tessellation` segments. The ring orientation is carried along
/// the path by parallel transport, so the tube does not twist around its own axis.
///
/// Fails if the path has fewer than two points or zero length.
pub fn tube(
    path: &[Vector3<f32>],
    radius: f32,
    tessellation: u32,
    cap: Cap,
) -> anyhow::Result<MeshData> {
    if path.len() < 2 {
        bail!("tube path needs at least 2 points, got {}", path.len());
    }
    if path.iter().any(|p| !p.iter().all(|c| c.is_finite())) {
        bail!("tube path contains non-finite coordinates");
    }
    let tangents = tangents(path)?;
    let tessellation = tessellation.max(3);

    // Initial normal: perpendicular to the first tangent, using the least aligned axis.
    let t0 = tangents[0];
    let axis = if t0.x.abs() <= t0.y.abs() && t0.x.abs() <= t0.z.abs() {
        Vector3::x()
    } else if t0.y.abs() <= t0.z.abs() {
        Vector3::y()
    } else {
        Vector3::z()
    };
    let mut normal = t0.cross(&axis).normalize();

    let mut mesh = MeshData::default();
    let ring_len = tessellation + 1;
    let last = (path.len() - 1) as f32;
    let mut frames = Vec::with_capacity(path.len());

    for (i, (point, tangent)) in path.iter().zip(&tangents).enumerate() {
        // Project the previous normal onto the plane of the new tangent.
        let projected = normal - tangent * tangent.dot(&normal);
        normal = match projected.try_normalize(1e-6) {
            Some(n) => n,
            None => tangent.cross(&axis).try_normalize(1e-6).unwrap_or_else(Vector3::y),
        };
        let binormal = tangent.cross(&normal);
        frames.push((normal, binormal));

        for j in 0..ring_len {
            let angle = TAU * j as f32 / tessellation as f32;
            let dir = normal * angle.cos() + binormal * angle.sin();
            mesh.positions.push((point + dir * radius).into());
            mesh.normals.push(dir.into());
            mesh.uvs.push([j as f32 / tessellation as f32, i as f32 / last]);
        }
    }

    for i in 0..path.len() as u32 - 1 {
        for j in 0..tessellation {
            let a = i * ring_len + j;
            let b = a + ring_len;
            mesh.indices.extend([a, b, a + 1, a + 1, b, b + 1]);
        }
    }

    if cap.start() {
        add_cap(&mut mesh, path[0], -tangents[0], frames[0], radius, tessellation, true);
    }
    if cap.end() {
        let n = path.len() - 1;
        add_cap(&mut mesh, path[n], tangents[n], frames[n], radius, tessellation, false);
    }

    Ok(mesh)
}

/// Per-point unit tangents. Points that coincide with their neighbor inherit a nearby tangent.
fn tangents(path: &[Vector3<f32>]) -> anyhow::Result<Vec<Vector3<f32>>> {
    let mut tangents = (0..path.len())
        .map(|i| {
            let (a, b) = if i + 1 < path.len() {
                (path[i], path[i + 1])
            } else {
                (path[i - 1], path[i])
            };
            (b - a).try_normalize(1e-9)
        })
        .collect::<Vec<_>>();

    let Some(first) = tangents.iter().flatten().next().copied() else {
        bail!("tube path has zero length");
    };
    let mut prev = first;
    for t in &mut tangents {
        match *t {
            Some(tangent) => prev = tangent,
            None => *t = Some(prev),
        }
    }
    Ok(tangents.into_iter().flatten().collect())
}

fn add_cap(
    mesh: &mut MeshData,
    center: Vector3<f32>,
    outward: Vector3<f32>,
    (normal, binormal): (Vector3<f32>, Vector3<f32>),
    radius: f32,
    tessellation: u32,
    start: bool,
) {
    let base = mesh.positions.len() as u32;
    mesh.positions.push(center.into());
    mesh.normals.push(outward.into());
    mesh.uvs.push([0.5, 0.5]);

    for j in 0..tessellation {
        let angle = TAU * j as f32 / tessellation as f32;
        let (sin, cos) = angle.sin_cos();
        let dir = normal * cos + binormal * sin;
        mesh.positions.push((center + dir * radius).into());
        mesh.normals.push(outward.into());
        mesh.uvs.push([0.5 + 0.5 * cos, 0.5 + 0.5 * sin]);
    }

    for j in 0..tessellation {
        let a = base + 1 + j;
        let b = base + 1 + (j + 1) % tessellation;
        if start {
            mesh.indices.extend([base, b, a]);
        } else {
            mesh.indices.extend([base, a, b]);
        }
    }
}

/// Builds a UV sphere centered at the origin.
///
/// `segments` is the number of horizontal rings; each ring has twice as many segments.
pub fn sphere(diameter: f32, segments: u32) -> MeshData {
    let radius = diameter / 2.0;
    let rings = segments.max(2);
    let sectors = rings * 2;
    let mut mesh = MeshData::default();

    for y in 0..=rings {
        let v = y as f32 / rings as f32;
        let theta = v * PI;
        let (ring_radius, py) = (theta.sin(), -theta.cos());

        for x in 0..=sectors {
            let u = x as f32 / sectors as f32;
            let phi = u * TAU;
            let normal = [-ring_radius * phi.cos(), py, ring_radius * phi.sin()];
            mesh.positions
                .push([normal[0] * radius, normal[1] * radius, normal[2] * radius]);
            mesh.normals.push(normal);
            mesh.uvs.push([u, 1.0 - v]);
        }
    }

    let stride = sectors + 1;
    for y in 0..rings {
        for x in 0..sectors {
            let v0 = y * stride + x;
            let v1 = v0 + 1;
            let v2 = v0 + stride;
            let v3 = v2 + 1;
            mesh.indices.extend([v0, v1, v2, v1, v3, v2]);
        }
    }

    mesh
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn v(x: f32, y: f32, z: f32) -> Vector3<f32> {
        Vector3::new(x, y, z)
    }

    #[test]
    fn tube_rings_surround_path() {
        let path = [v(0.0, 0.0, 0.0), v(0.0, 1.0, 0.0), v(1.0, 1.0, 0.0)];
        let mesh = tube(&path, 0.25, 8, Cap::None).unwrap();
        assert_eq!(mesh.vertex_count(), 3 * 9);
        assert_eq!(mesh.triangle_count(), 2 * 8 * 2);

        for (ring, center) in mesh.positions.chunks(9).zip(&path) {
            for p in ring {
                assert_relative_eq!((Vector3::from(*p) - center).norm(), 0.25, epsilon = 1e-5);
            }
        }
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
    }

    #[test]
    fn tube_along_random_path() {
        let mut rng = fastrand::Rng::with_seed(0x5ce7e);
        let path = (0..12)
            .map(|_| v(rng.f32(), rng.f32(), rng.f32()))
            .collect::<Vec<_>>();
        let mesh = tube(&path, 0.05, 12, Cap::Both).unwrap();

        for (ring, center) in mesh.positions.chunks(13).zip(&path) {
            for p in ring {
                assert_relative_eq!((Vector3::from(*p) - center).norm(), 0.05, epsilon = 1e-4);
            }
        }
        for n in &mesh.normals {
            assert_relative_eq!(Vector3::from(*n).norm(), 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn tube_caps() {
        let path = [v(0.0, 0.0, 0.0), v(0.0, 0.0, 2.0)];
        let open = tube(&path, 1.0, 6, Cap::None).unwrap();
        let capped = tube(&path, 1.0, 6, Cap::Both).unwrap();
        assert_eq!(capped.vertex_count(), open.vertex_count() + 2 * 7);
        assert_eq!(capped.triangle_count(), open.triangle_count() + 2 * 6);
        assert_eq!(capped.normals.last(), Some(&[0.0, 0.0, 1.0]));
    }

    #[test]
    fn tube_tolerates_repeated_points() {
        let path = [v(0.0, 0.0, 0.0), v(0.0, 0.0, 0.0), v(1.0, 0.0, 0.0)];
        let mesh = tube(&path, 0.1, 4, Cap::Both).unwrap();
        assert!(mesh.positions.iter().flatten().all(|c| c.is_finite()));
    }

    #[test]
    fn degenerate_tubes() {
        assert!(tube(&[v(1.0, 2.0, 3.0)], 1.0, 8, Cap::None).is_err());
        let err = tube(&[v(1.0, 2.0, 3.0); 3], 1.0, 8, Cap::None).unwrap_err();
        assert_eq!(err.to_string(), "tube path has zero length");
        assert!(tube(&[v(0.0, 0.0, 0.0), v(f32::NAN, 0.0, 0.0)], 1.0, 8, Cap::None).is_err());
    }

    #[test]
    fn sphere_radius() {
        let mesh = sphere(0.5, 8);
        assert!(mesh
            .positions
            .iter()
            .all(|p| (Vector3::from(*p).norm() - 0.25).abs() < 1e-5));
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
    }

    #[test]
    fn flat_normals() {
        let mut mesh = MeshData {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [5.0, 5.0, 5.0]],
            indices: vec![0, 1, 2, 0, 1, 9],
            ..Default::default()
        };
        mesh.compute_normals();
        assert_eq!(mesh.normals.len(), 4);
        assert_eq!(mesh.normals[0], [0.0, 0.0, 1.0]);
        assert_eq!(mesh.normals[3], [0.0, 1.0, 0.0], "unused vertex");
    }

    #[test]
    fn double_sided() {
        let mut mesh = sphere(1.0, 4);
        let (verts, tris) = (mesh.vertex_count(), mesh.triangle_count());
        mesh.make_double_sided();
        assert_eq!(mesh.vertex_count(), 2 * verts);
        assert_eq!(mesh.triangle_count(), 2 * tris);
    }
}
