use super::{Error, F, Result};

/// Flat triangle mesh with a single UV channel.
///
/// UVs follow the OpenGL convention (v = 0 is the bottom row of the texture), so they are
/// flipped relative to how GLTF stores them.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Mesh {
    pub v: Vec<[F; 3]>,
    /// 1-1 with `v`.
    pub uv: Vec<[F; 2]>,

    pub f: Vec<[usize; 3]>,
    /// Material of each face, 1-1 with `f`.
    pub face_mat: Vec<Option<usize>>,
}

impl Mesh {
    /// Mesh with only positions and faces, no UVs or materials.
    pub fn new_geometry(v: Vec<[F; 3]>, f: Vec<[usize; 3]>) -> Self {
        Self {
            uv: vec![[0.; 2]; v.len()],
            face_mat: vec![None; f.len()],
            v,
            f,
        }
    }

    pub fn num_tris(&self) -> usize {
        self.f.len()
    }

    pub fn flip_uv_v(&mut self) {
        for uv in self.uv.iter_mut() {
            uv[1] = 1. - uv[1];
        }
    }

    /// Check that all per-vertex and per-face attributes line up,
    /// and that faces only reference existing vertices.
    pub fn validate(&self) -> Result<()> {
        if self.uv.len() != self.v.len() {
            return Err(Error::invalid_mesh(format!(
                "{} uvs for {} vertices",
                self.uv.len(),
                self.v.len()
            )));
        }
        if self.face_mat.len() != self.f.len() {
            return Err(Error::invalid_mesh(format!(
                "{} face materials for {} faces",
                self.face_mat.len(),
                self.f.len()
            )));
        }
        let nv = self.v.len();
        if let Some((fi, f)) = self
            .f
            .iter()
            .enumerate()
            .find(|(_, f)| f.iter().any(|&vi| vi >= nv))
        {
            return Err(Error::invalid_mesh(format!(
                "face {fi} = {f:?} references a vertex out of {nv}"
            )));
        }
        Ok(())
    }

    /// Average UV of each vertex of face `fi`.
    pub fn face_uv(&self, fi: usize) -> [F; 2] {
        let [a, b, c] = self.f[fi].map(|vi| self.uv[vi]);
        std::array::from_fn(|i| (a[i] + b[i] + c[i]) / 3.)
    }

    /// Extracts the faces in `fis` into a new mesh.
    /// Only vertices referenced by those faces are kept, in order of first use.
    pub fn submesh(&self, fis: impl IntoIterator<Item = usize>) -> Self {
        let mut remap = vec![usize::MAX; self.v.len()];
        let mut out = Self::default();
        for fi in fis {
            let f = self.f[fi].map(|vi| {
                if remap[vi] == usize::MAX {
                    remap[vi] = out.v.len();
                    out.v.push(self.v[vi]);
                    out.uv.push(self.uv.get(vi).copied().unwrap_or_default());
                }
                remap[vi]
            });
            out.f.push(f);
            out.face_mat
                .push(self.face_mat.get(fi).copied().flatten());
        }
        out
    }

    /// Axis aligned bounds of all vertices, or None if there are no vertices.
    pub fn aabb(&self) -> Option<[[F; 3]; 2]> {
        if self.v.is_empty() {
            return None;
        }
        let bounds = self
            .v
            .iter()
            .fold([[F::INFINITY; 3], [F::NEG_INFINITY; 3]], |[l, h], v| {
                [
                    std::array::from_fn(|i| l[i].min(v[i])),
                    std::array::from_fn(|i| h[i].max(v[i])),
                ]
            });
        Some(bounds)
    }
}

#[cfg(test)]
fn quad() -> Mesh {
    Mesh::new_geometry(
        vec![[0., 0., 0.], [1., 0., 0.], [1., 1., 0.], [0., 1., 0.]],
        vec![[0, 1, 2], [0, 2, 3]],
    )
}

#[test]
fn test_submesh_compacts_vertices() {
    let m = quad();
    let s = m.submesh([1]);
    assert_eq!(s.v, vec![[0., 0., 0.], [1., 1., 0.], [0., 1., 0.]]);
    assert_eq!(s.f, vec![[0, 1, 2]]);
    assert_eq!(s.uv.len(), 3);
    assert_eq!(s.face_mat, vec![None]);
    s.validate().unwrap();
}

#[test]
fn test_validate() {
    let mut m = quad();
    m.validate().unwrap();
    m.f.push([0, 1, 4]);
    m.face_mat.push(None);
    assert!(matches!(m.validate(), Err(Error::InvalidMesh(_))));

    let mut m = quad();
    m.uv.pop();
    assert!(matches!(m.validate(), Err(Error::InvalidMesh(_))));
}
