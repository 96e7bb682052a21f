use super::error::SpatialError;
use nalgebra::{Matrix3, Point3, Vector3};

const ANGLE_TOLERANCE: f64 = 1.0e-6;

/// Classification of the periodic cell, derived from its lengths and angles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoxKind {
    /// No periodicity; minimum-image conventions never apply.
    NonPeriodic,
    /// Three equal orthogonal axes.
    Cubic,
    /// Three orthogonal axes of differing length.
    Orthorhombic,
    /// One non-right angle.
    Monoclinic,
    /// General parallelepiped.
    Triclinic,
}

impl BoxKind {
    pub fn is_periodic(self) -> bool {
        self != BoxKind::NonPeriodic
    }
}

/// The simulation cell against which all coordinates are interpreted.
///
/// Axes are stored column-wise, so `axes * frac` yields a real-space vector and
/// `inverse_axes * real` yields fractional coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationBox {
    kind: BoxKind,
    axes: Matrix3<f64>,
    inverse_axes: Matrix3<f64>,
    lengths: Vector3<f64>,
    angles: Vector3<f64>,
    volume: f64,
}

impl SimulationBox {
    pub fn cubic(length: f64) -> Result<Self, SpatialError> {
        Self::from_lengths_and_angles(Vector3::repeat(length), Vector3::repeat(90.0))
    }

    pub fn orthorhombic(lengths: Vector3<f64>) -> Result<Self, SpatialError> {
        Self::from_lengths_and_angles(lengths, Vector3::repeat(90.0))
    }

    /// Creates a box with the given orthogonal extent but no periodicity.
    pub fn non_periodic(lengths: Vector3<f64>) -> Result<Self, SpatialError> {
        let mut simulation_box = Self::orthorhombic(lengths)?;
        simulation_box.kind = BoxKind::NonPeriodic;
        Ok(simulation_box)
    }

    /// Builds the cell from axis lengths and inter-axis angles (alpha, beta, gamma) in degrees.
    ///
    /// The `a` axis lies along x and `b` lies in the xy plane.
    pub fn from_lengths_and_angles(
        lengths: Vector3<f64>,
        angles: Vector3<f64>,
    ) -> Result<Self, SpatialError> {
        if lengths.iter().any(|&l| l <= 0.0 || !l.is_finite()) {
            return Err(SpatialError::InvalidBox(format!(
                "axis lengths must be positive and finite, got ({}, {}, {})",
                lengths.x, lengths.y, lengths.z
            )));
        }
        if angles.iter().any(|&a| !(a > 0.0 && a < 180.0)) {
            return Err(SpatialError::InvalidBox(format!(
                "axis angles must lie strictly between 0 and 180 degrees, got ({}, {}, {})",
                angles.x, angles.y, angles.z
            )));
        }

        let (cos_alpha, cos_beta, cos_gamma) = (
            angles.x.to_radians().cos(),
            angles.y.to_radians().cos(),
            angles.z.to_radians().cos(),
        );
        let sin_gamma = angles.z.to_radians().sin();

        let a = Vector3::new(1.0, 0.0, 0.0);
        let b = Vector3::new(cos_gamma, sin_gamma, 0.0);
        let cy = (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let cz_squared = 1.0 - cos_beta * cos_beta - cy * cy;
        if cz_squared <= 0.0 {
            return Err(SpatialError::InvalidBox(
                "axis angles do not describe a cell with positive volume".to_string(),
            ));
        }
        let c = Vector3::new(cos_beta, cy, cz_squared.sqrt());

        let axes = Matrix3::from_columns(&[a * lengths.x, b * lengths.y, c * lengths.z]);

        let right = |angle: f64| (angle - 90.0).abs() < ANGLE_TOLERANCE;
        let kind = match (right(angles.x), right(angles.y), right(angles.z)) {
            (true, true, true) => {
                if (lengths.x - lengths.y).abs() < ANGLE_TOLERANCE
                    && (lengths.x - lengths.z).abs() < ANGLE_TOLERANCE
                {
                    BoxKind::Cubic
                } else {
                    BoxKind::Orthorhombic
                }
            }
            (true, false, true) | (false, true, true) | (true, true, false) => BoxKind::Monoclinic,
            _ => BoxKind::Triclinic,
        };

        Self::from_axes(kind, axes, angles)
    }

    fn from_axes(
        kind: BoxKind,
        axes: Matrix3<f64>,
        angles: Vector3<f64>,
    ) -> Result<Self, SpatialError> {
        let inverse_axes = axes.try_inverse().ok_or_else(|| {
            SpatialError::InvalidBox("axes matrix is singular".to_string())
        })?;
        let lengths = Vector3::new(
            axes.column(0).norm(),
            axes.column(1).norm(),
            axes.column(2).norm(),
        );
        Ok(Self {
            kind,
            axes,
            inverse_axes,
            lengths,
            angles,
            volume: axes.determinant().abs(),
        })
    }

    pub fn kind(&self) -> BoxKind {
        self.kind
    }

    pub fn is_periodic(&self) -> bool {
        self.kind.is_periodic()
    }

    pub fn axes(&self) -> &Matrix3<f64> {
        &self.axes
    }

    pub fn inverse_axes(&self) -> &Matrix3<f64> {
        &self.inverse_axes
    }

    pub fn axis_lengths(&self) -> &Vector3<f64> {
        &self.lengths
    }

    pub fn axis_length(&self, axis: usize) -> f64 {
        self.lengths[axis]
    }

    pub fn angles(&self) -> &Vector3<f64> {
        &self.angles
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Distances between opposite faces of the box, one per axis.
    pub fn perpendicular_widths(&self) -> Vector3<f64> {
        perpendicular_widths(&self.axes)
    }

    pub fn frac_to_real(&self, frac: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.axes * frac.coords)
    }

    pub fn real_to_frac(&self, r: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.inverse_axes * r.coords)
    }

    /// Returns the fractional coordinates of `r`, folded into `[0, 1)` on every axis.
    pub fn fold_frac(&self, r: &Point3<f64>) -> Point3<f64> {
        self.real_to_frac(r).map(|f| {
            let folded = f - f.floor();
            if folded >= 1.0 { 0.0 } else { folded }
        })
    }

    /// Maps `r` into the box. Positions already inside are returned unchanged, so folding is
    /// bitwise idempotent.
    pub fn fold(&self, r: &Point3<f64>) -> Point3<f64> {
        let frac = self.real_to_frac(r);
        if frac.iter().all(|f| (0.0..1.0).contains(f)) {
            return *r;
        }
        self.frac_to_real(&self.fold_frac(r))
    }

    /// Minimum-image vector pointing from `a` to `b`.
    pub fn minimum_vector(&self, a: &Point3<f64>, b: &Point3<f64>) -> Vector3<f64> {
        let delta = b - a;
        if !self.is_periodic() {
            return delta;
        }
        let frac = (self.inverse_axes * delta).map(|f| f - f.round());
        self.axes * frac
    }

    pub fn minimum_distance(&self, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
        self.minimum_vector(a, b).norm()
    }

    /// Scales each axis by the matching factor. Angles are preserved.
    pub fn scale(&mut self, factors: &Vector3<f64>) -> Result<(), SpatialError> {
        let mut axes = self.axes;
        for (axis, factor) in factors.iter().enumerate() {
            axes.column_mut(axis).scale_mut(*factor);
        }
        let mut scaled = Self::from_axes(self.kind, axes, self.angles)?;
        if scaled.kind == BoxKind::Cubic
            && ((scaled.lengths.x - scaled.lengths.y).abs() >= ANGLE_TOLERANCE
                || (scaled.lengths.x - scaled.lengths.z).abs() >= ANGLE_TOLERANCE)
        {
            scaled.kind = BoxKind::Orthorhombic;
        }
        *self = scaled;
        Ok(())
    }
}

/// Face-to-face widths of the parallelepiped spanned by the columns of `axes`.
///
/// Width `i` is the volume divided by the area of the face spanned by the other two axes.
pub(crate) fn perpendicular_widths(axes: &Matrix3<f64>) -> Vector3<f64> {
    let volume = axes.determinant().abs();
    Vector3::from_fn(|axis, _| {
        let face = axes
            .column((axis + 1) % 3)
            .cross(&axes.column((axis + 2) % 3))
            .norm();
        volume / face
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn cubic_box_has_expected_geometry() {
        let b = SimulationBox::cubic(10.0).unwrap();
        assert_eq!(b.kind(), BoxKind::Cubic);
        assert_close(b.volume(), 1000.0);
        assert_close(b.axis_length(2), 10.0);
    }

    #[test]
    fn kind_is_classified_from_angles() {
        let ortho = SimulationBox::orthorhombic(Vector3::new(10.0, 12.0, 14.0)).unwrap();
        assert_eq!(ortho.kind(), BoxKind::Orthorhombic);
        let mono = SimulationBox::from_lengths_and_angles(
            Vector3::new(10.0, 12.0, 14.0),
            Vector3::new(90.0, 100.0, 90.0),
        )
        .unwrap();
        assert_eq!(mono.kind(), BoxKind::Monoclinic);
        let tri = SimulationBox::from_lengths_and_angles(
            Vector3::repeat(10.0),
            Vector3::new(80.0, 85.0, 95.0),
        )
        .unwrap();
        assert_eq!(tri.kind(), BoxKind::Triclinic);
        assert_close(tri.axis_length(1), 10.0);
    }

    #[test]
    fn invalid_geometry_is_rejected() {
        assert!(SimulationBox::cubic(0.0).is_err());
        assert!(
            SimulationBox::from_lengths_and_angles(Vector3::repeat(5.0), Vector3::new(90.0, 90.0, 0.0))
                .is_err()
        );
        assert!(
            SimulationBox::from_lengths_and_angles(
                Vector3::repeat(5.0),
                Vector3::new(150.0, 20.0, 20.0)
            )
            .is_err()
        );
    }

    #[test]
    fn frac_and_real_conversions_are_inverse() {
        let b = SimulationBox::from_lengths_and_angles(
            Vector3::new(9.0, 11.0, 13.0),
            Vector3::new(70.0, 80.0, 100.0),
        )
        .unwrap();
        let r = Point3::new(1.5, -2.0, 7.25);
        let back = b.frac_to_real(&b.real_to_frac(&r));
        assert!((back - r).norm() < 1e-9);
    }

    #[test]
    fn fold_maps_into_unit_cell() {
        let b = SimulationBox::cubic(10.0).unwrap();
        let folded = b.fold(&Point3::new(-1.0, 23.0, 10.0));
        assert_close(folded.x, 9.0);
        assert_close(folded.y, 3.0);
        assert_close(folded.z, 0.0);
        let frac = b.fold_frac(&Point3::new(-1.0e-17, 0.0, 0.0));
        assert!(frac.x >= 0.0 && frac.x < 1.0);
    }

    #[test]
    fn fold_leaves_inside_positions_bitwise_unchanged() {
        let b = SimulationBox::from_lengths_and_angles(
            Vector3::new(10.0, 11.0, 12.0),
            Vector3::new(90.0, 100.0, 90.0),
        )
        .unwrap();
        let inside = b.frac_to_real(&Point3::new(0.3, 0.7, 0.1));
        assert_eq!(b.fold(&inside), inside);
        let once = b.fold(&Point3::new(-3.3, 25.0, 13.7));
        assert_eq!(b.fold(&once), once);
    }

    #[test]
    fn minimum_image_picks_nearest_replica() {
        let b = SimulationBox::orthorhombic(Vector3::new(10.0, 20.0, 30.0)).unwrap();
        let v = b.minimum_vector(&Point3::new(1.0, 1.0, 1.0), &Point3::new(9.0, 19.0, 15.0));
        assert_close(v.x, -2.0);
        assert_close(v.y, -2.0);
        assert_close(v.z, 14.0);
        assert_close(
            b.minimum_distance(&Point3::new(0.5, 0.0, 0.0), &Point3::new(9.5, 0.0, 0.0)),
            1.0,
        );
    }

    #[test]
    fn perpendicular_widths_shrink_with_skew() {
        let b = SimulationBox::orthorhombic(Vector3::new(10.0, 20.0, 30.0)).unwrap();
        let w = b.perpendicular_widths();
        assert_close(w.x, 10.0);
        assert_close(w.y, 20.0);
        assert_close(w.z, 30.0);

        let rhombohedral =
            SimulationBox::from_lengths_and_angles(Vector3::repeat(20.0), Vector3::repeat(60.0))
                .unwrap();
        let expected = rhombohedral.volume() / (400.0 * 60f64.to_radians().sin());
        for width in rhombohedral.perpendicular_widths().iter() {
            assert_close(*width, expected);
            assert!(*width < 17.0);
        }
    }

    #[test]
    fn non_periodic_box_never_wraps() {
        let b = SimulationBox::non_periodic(Vector3::repeat(10.0)).unwrap();
        assert!(!b.is_periodic());
        assert_close(
            b.minimum_distance(&Point3::new(0.5, 0.0, 0.0), &Point3::new(9.5, 0.0, 0.0)),
            9.0,
        );
    }

    #[test]
    fn scale_stretches_axes() {
        let mut b = SimulationBox::cubic(10.0).unwrap();
        b.scale(&Vector3::new(2.0, 1.0, 0.5)).unwrap();
        assert_close(b.axis_length(0), 20.0);
        assert_close(b.axis_length(2), 5.0);
        assert_close(b.volume(), 1000.0);
        assert_eq!(b.kind(), BoxKind::Orthorhombic);
    }
}
