use super::cluster::ClusterAssignment;
use super::mesh::Mesh;
use super::{Error, Result, Rgba};

/// A subset of the input faces, all printed in one color.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorPart {
    pub name: String,
    /// Uniform color of every face, alpha is always opaque for generated parts.
    pub color: Rgba,
    pub mesh: Mesh,
    /// Index of each face of `mesh` in the source mesh, empty for parts read from disk.
    pub source_faces: Vec<usize>,
}

impl ColorPart {
    pub fn rgb(&self) -> [u8; 3] {
        let [r, g, b, _] = self.color;
        [r, g, b]
    }
    pub fn num_faces(&self) -> usize {
        self.mesh.f.len()
    }
}

/// Name of the `n`th part (1-based).
pub fn part_name(n: usize) -> String {
    format!("Color_{n}")
}

/// Split `mesh` into one part per non-empty label, in label order.
/// Parts are named sequentially and take their label's centroid as their color.
pub fn segment(mesh: &Mesh, assignment: &ClusterAssignment) -> Result<Vec<ColorPart>> {
    if assignment.labels.len() != mesh.f.len() {
        return Err(Error::invalid_mesh(format!(
            "{} labels for {} faces",
            assignment.labels.len(),
            mesh.f.len()
        )));
    }
    let k = assignment.k();
    let mut by_label: Vec<Vec<usize>> = vec![vec![]; k];
    for (fi, &l) in assignment.labels.iter().enumerate() {
        let Some(faces) = by_label.get_mut(l) else {
            return Err(Error::invalid_mesh(format!(
                "face {fi} has label {l} but there are only {k} clusters"
            )));
        };
        faces.push(fi);
    }

    let parts = by_label
        .into_iter()
        .enumerate()
        .filter(|(_, fs)| !fs.is_empty())
        .enumerate()
        .map(|(n, (l, fs))| {
            let [r, g, b] = assignment.centroids[l];
            ColorPart {
                name: part_name(n + 1),
                color: [r, g, b, 255],
                mesh: mesh.submesh(fs.iter().copied()),
                source_faces: fs,
            }
        })
        .collect();
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::F;

    fn strip(n: usize) -> Mesh {
        let v = (0..n + 2).map(|i| [i as F, (i % 2) as F, 0.]).collect();
        let f = (0..n).map(|i| [i, i + 1, i + 2]).collect();
        Mesh::new_geometry(v, f)
    }

    #[test]
    fn test_faces_conserved() {
        let mesh = strip(10);
        let assignment = ClusterAssignment {
            labels: vec![0, 2, 2, 0, 3, 3, 3, 0, 2, 0],
            centroids: vec![[1; 3], [2; 3], [3; 3], [4; 3]],
            inertia: 0.,
        };
        let parts = segment(&mesh, &assignment).unwrap();
        // label 1 is empty
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.iter().map(ColorPart::num_faces).sum::<usize>(), 10);

        let names = parts.iter().map(|p| p.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["Color_1", "Color_2", "Color_3"]);
        assert_eq!(parts[1].color, [3, 3, 3, 255]);
        assert_eq!(parts[2].source_faces, vec![4, 5, 6]);
        // faces 4,5,6 touch vertices 4..=8
        assert_eq!(parts[2].mesh.v.len(), 5);
        for p in &parts {
            p.mesh.validate().unwrap();
        }
    }

    #[test]
    fn test_label_mismatch() {
        let mesh = strip(3);
        let assignment = ClusterAssignment {
            labels: vec![0, 0],
            centroids: vec![[0; 3]],
            inertia: 0.,
        };
        assert!(segment(&mesh, &assignment).is_err());

        let assignment = ClusterAssignment {
            labels: vec![0, 0, 5],
            centroids: vec![[0; 3]],
            inertia: 0.,
        };
        assert!(segment(&mesh, &assignment).is_err());
    }
}
