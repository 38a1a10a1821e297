use depthseg_core::{IntensityPoint, NormalSample, Point3D, PointCloud};

/// Normals and curvatures split out of a [`NormalSample`] cloud, one entry
/// per point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normals {
    pub nx: Vec<f32>,
    pub ny: Vec<f32>,
    pub nz: Vec<f32>,
    pub curvature: Vec<f32>,
}

impl Normals {
    pub fn len(&self) -> usize {
        self.nx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nx.is_empty()
    }
}

/// Split a normal cloud into its positions and a parallel [`Normals`]
/// list. Layout and density of the positions follow `cloud`.
pub fn split_normals(cloud: &PointCloud<NormalSample>) -> (PointCloud<Point3D>, Normals) {
    let positions = cloud.map(|s| Point3D::new(s.x, s.y, s.z));

    let n = cloud.len();
    let mut normals = Normals {
        nx: Vec::with_capacity(n),
        ny: Vec::with_capacity(n),
        nz: Vec::with_capacity(n),
        curvature: Vec::with_capacity(n),
    };
    for s in cloud.iter() {
        normals.nx.push(s.normal.x);
        normals.ny.push(s.normal.y);
        normals.nz.push(s.normal.z);
        normals.curvature.push(s.curvature);
    }

    (positions, normals)
}

/// Positions with the curvature as intensity, for color-mapped display.
pub fn curvature_to_intensity(cloud: &PointCloud<NormalSample>) -> PointCloud<IntensityPoint> {
    cloud.map(|s| IntensityPoint {
        x: s.x,
        y: s.y,
        z: s.z,
        intensity: s.curvature,
    })
}
