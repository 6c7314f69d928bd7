//! Vector and rotation math
//!
//! LSL uses row vectors: `v * q` rotates `v` by `q`, and `a * b` applies
//! rotation `a` first and `b` second. Components are single precision.

use std::ops::{Add, Neg, Sub};

/// Three-component float vector
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vector {
    /// `ZERO_VECTOR`
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    /// Unit X axis (forward)
    pub const X_AXIS: Self = Self::new(1.0, 0.0, 0.0);
    /// Unit Y axis (left)
    pub const Y_AXIS: Self = Self::new(0.0, 1.0, 0.0);
    /// Unit Z axis (up)
    pub const Z_AXIS: Self = Self::new(0.0, 0.0, 1.0);

    /// Create a vector
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Create from an array
    pub const fn from_array(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    /// Scale by a scalar
    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    /// Dot product
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Length
    pub fn magnitude(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or zero for a (near) zero vector
    pub fn normalize(self) -> Self {
        let mag = self.magnitude();
        if mag > f32::EPSILON {
            self.scale(1.0 / mag)
        } else {
            Self::ZERO
        }
    }

    /// Distance to another point
    pub fn distance(self, other: Self) -> f32 {
        (self - other).magnitude()
    }

    /// Rotate by a quaternion (`v * q`)
    pub fn rotate(self, q: Quaternion) -> Self {
        let rw = -q.x * self.x - q.y * self.y - q.z * self.z;
        let rx = q.s * self.x + q.y * self.z - q.z * self.y;
        let ry = q.s * self.y + q.z * self.x - q.x * self.z;
        let rz = q.s * self.z + q.x * self.y - q.y * self.x;

        Self::new(
            -rw * q.x + rx * q.s - ry * q.z + rz * q.y,
            -rw * q.y + ry * q.s - rz * q.x + rx * q.z,
            -rw * q.z + rz * q.s - rx * q.y + ry * q.x,
        )
    }

    /// Whether this is exactly `ZERO_VECTOR`
    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }
}

impl Add for Vector {
    type Output = Self;
    fn add(self, o: Self) -> Self {
        Self::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
}

impl Sub for Vector {
    type Output = Self;
    fn sub(self, o: Self) -> Self {
        Self::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }
}

impl Neg for Vector {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// Quaternion rotation (x, y, z, s)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
    /// Scalar component
    pub s: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    /// `ZERO_ROTATION`, the identity
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Create a quaternion
    pub const fn new(x: f32, y: f32, z: f32, s: f32) -> Self {
        Self { x, y, z, s }
    }

    /// Create from an array
    pub const fn from_array(q: [f32; 4]) -> Self {
        Self::new(q[0], q[1], q[2], q[3])
    }

    /// Four-component dot product
    pub fn dot(self, o: Self) -> f32 {
        self.x * o.x + self.y * o.y + self.z * o.z + self.s * o.s
    }

    /// Conjugate (inverse for unit quaternions)
    pub fn conjugate(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.s)
    }

    /// Unit quaternion, or identity for a (near) zero quaternion
    pub fn normalize(self) -> Self {
        let mag = self.dot(self).sqrt();
        if mag > f32::EPSILON {
            let inv = 1.0 / mag;
            Self::new(self.x * inv, self.y * inv, self.z * inv, self.s * inv)
        } else {
            Self::IDENTITY
        }
    }

    /// Compose rotations: `self` then `other` (`self * other`)
    pub fn compose(self, b: Self) -> Self {
        let a = self;
        Self::new(
            b.s * a.x + b.x * a.s + b.y * a.z - b.z * a.y,
            b.s * a.y + b.y * a.s + b.z * a.x - b.x * a.z,
            b.s * a.z + b.z * a.s + b.x * a.y - b.y * a.x,
            b.s * a.s - b.x * a.x - b.y * a.y - b.z * a.z,
        )
    }

    /// `self / other`, i.e. `self * conjugate(other)`
    pub fn divide(self, other: Self) -> Self {
        self.compose(other.conjugate())
    }

    /// Rotation from Euler angles in radians (X, then Y, then Z)
    pub fn from_euler(v: Vector) -> Self {
        let (ax, aw) = (v.x * 0.5).sin_cos();
        let (by, bw) = (v.y * 0.5).sin_cos();
        let (cz, cw) = (v.z * 0.5).sin_cos();
        Self::new(
            ax * bw * cw - aw * by * cz,
            aw * by * cw + ax * bw * cz,
            aw * bw * cz - ax * by * cw,
            aw * bw * cw + ax * by * cz,
        )
    }

    /// Rotation matrix rows for a unit quaternion
    fn matrix(self) -> [[f32; 3]; 3] {
        let q = self.normalize();
        let (x2, y2, z2) = (q.x * q.x, q.y * q.y, q.z * q.z);
        let (xy, xz, yz) = (q.x * q.y, q.x * q.z, q.y * q.z);
        let (wx, wy, wz) = (q.s * q.x, q.s * q.y, q.s * q.z);
        [
            [1.0 - 2.0 * (y2 + z2), 2.0 * (xy + wz), 2.0 * (xz - wy)],
            [2.0 * (xy - wz), 1.0 - 2.0 * (x2 + z2), 2.0 * (yz + wx)],
            [2.0 * (xz + wy), 2.0 * (yz - wx), 1.0 - 2.0 * (x2 + y2)],
        ]
    }

    /// Euler angles in radians
    pub fn to_euler(self) -> Vector {
        let m = self.matrix();
        let angle_y = (-m[0][2]).clamp(-1.0, 1.0).asin();
        if angle_y.cos().abs() > 0.005 {
            let angle_x = m[1][2].atan2(m[2][2]);
            let angle_z = m[0][1].atan2(m[0][0]);
            Vector::new(angle_x, angle_y, angle_z)
        } else {
            // Gimbal lock: fold the X rotation into Z
            Vector::new(0.0, angle_y, (-m[1][0]).atan2(m[1][1]))
        }
    }

    /// Rotation whose local axes are the given forward, left and up vectors
    pub fn from_axes(fwd: Vector, left: Vector, up: Vector) -> Self {
        let m = [
            [fwd.x, fwd.y, fwd.z],
            [left.x, left.y, left.z],
            [up.x, up.y, up.z],
        ];
        let trace = m[0][0] + m[1][1] + m[2][2];
        let mut q = [0.0f32; 4];
        if trace > 0.0 {
            let mut s = (trace + 1.0).sqrt();
            q[3] = s * 0.5;
            s = 0.5 / s;
            q[0] = (m[1][2] - m[2][1]) * s;
            q[1] = (m[2][0] - m[0][2]) * s;
            q[2] = (m[0][1] - m[1][0]) * s;
        } else {
            const NEXT: [usize; 3] = [1, 2, 0];
            let mut i = 0;
            if m[1][1] > m[0][0] {
                i = 1;
            }
            if m[2][2] > m[i][i] {
                i = 2;
            }
            let j = NEXT[i];
            let k = NEXT[j];
            let mut s = ((m[i][i] - (m[j][j] + m[k][k])) + 1.0).sqrt();
            q[i] = s * 0.5;
            if s != 0.0 {
                s = 0.5 / s;
            }
            q[3] = (m[j][k] - m[k][j]) * s;
            q[j] = (m[i][j] + m[j][i]) * s;
            q[k] = (m[i][k] + m[k][i]) * s;
        }
        Self::from_array(q).normalize()
    }

    /// Shortest-arc rotation taking direction `a` onto direction `b`
    pub fn between(a: Vector, b: Vector) -> Self {
        let a = a.normalize();
        let b = b.normalize();
        if a.is_zero() || b.is_zero() {
            return Self::IDENTITY;
        }
        let d = a.dot(b);
        if d >= 1.0 - 1e-6 {
            return Self::IDENTITY;
        }
        if d <= -1.0 + 1e-6 {
            // Opposite directions: half turn about any perpendicular axis
            let mut axis = Vector::X_AXIS.cross(a);
            if axis.magnitude() < 1e-6 {
                axis = Vector::Y_AXIS.cross(a);
            }
            let axis = axis.normalize();
            return Self::new(axis.x, axis.y, axis.z, 0.0);
        }
        let c = a.cross(b);
        Self::new(c.x, c.y, c.z, 1.0 + d).normalize()
    }

    /// Rotation of `angle` radians about `axis`
    pub fn from_axis_angle(axis: Vector, angle: f32) -> Self {
        let axis = axis.normalize();
        let (s, c) = (angle * 0.5).sin_cos();
        Self::new(axis.x * s, axis.y * s, axis.z * s, c)
    }

    /// Angle in radians and unit axis, with the angle in `[0, PI]`
    pub fn angle_axis(self) -> (f32, Vector) {
        let mut q = self.normalize();
        if q.s < 0.0 {
            q = Self::new(-q.x, -q.y, -q.z, -q.s);
        }
        let angle = 2.0 * q.s.clamp(-1.0, 1.0).acos();
        let axis = Vector::new(q.x, q.y, q.z).normalize();
        if axis.is_zero() {
            (0.0, Vector::ZERO)
        } else {
            (angle, axis)
        }
    }

    /// Angle in radians between two rotations
    pub fn angle_between(self, other: Self) -> f32 {
        let d = self.normalize().dot(other.normalize());
        (2.0 * d * d - 1.0).clamp(-1.0, 1.0).acos()
    }

    /// Whether this is exactly `ZERO_ROTATION`
    pub fn is_identity(self) -> bool {
        self == Self::IDENTITY
    }
}

impl Add for Quaternion {
    type Output = Self;
    fn add(self, o: Self) -> Self {
        Self::new(self.x + o.x, self.y + o.y, self.z + o.z, self.s + o.s)
    }
}

impl Sub for Quaternion {
    type Output = Self;
    fn sub(self, o: Self) -> Self {
        Self::new(self.x - o.x, self.y - o.y, self.z - o.z, self.s - o.s)
    }
}

impl Neg for Quaternion {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, -self.s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    fn vclose(a: Vector, b: Vector) -> bool {
        close(a.x, b.x) && close(a.y, b.y) && close(a.z, b.z)
    }

    #[test]
    fn test_vector_basics() {
        let v = Vector::new(3.0, 4.0, 0.0);
        assert_eq!(v.magnitude(), 5.0);
        assert!(vclose(v.normalize(), Vector::new(0.6, 0.8, 0.0)));
        assert_eq!(Vector::ZERO.normalize(), Vector::ZERO);
        assert_eq!(Vector::X_AXIS.cross(Vector::Y_AXIS), Vector::Z_AXIS);
    }

    #[test]
    fn test_rotate_quarter_turn_about_z() {
        let q = Quaternion::from_axis_angle(Vector::Z_AXIS, FRAC_PI_2);
        assert!(vclose(Vector::X_AXIS.rotate(q), Vector::Y_AXIS));
    }

    #[test]
    fn test_compose_order() {
        let about_z = Quaternion::from_axis_angle(Vector::Z_AXIS, FRAC_PI_2);
        let about_x = Quaternion::from_axis_angle(Vector::X_AXIS, FRAC_PI_2);
        // X -> Y (about Z), then Y -> Z (about X)
        let combined = about_z.compose(about_x);
        assert!(vclose(Vector::X_AXIS.rotate(combined), Vector::Z_AXIS));
    }

    #[test]
    fn test_euler_roundtrip() {
        let angles = Vector::new(0.3, -0.7, 1.2);
        let q = Quaternion::from_euler(angles);
        assert!(vclose(q.to_euler(), angles));
    }

    #[test]
    fn test_euler_matches_axis_angle() {
        let q = Quaternion::from_euler(Vector::new(0.0, 0.0, FRAC_PI_2));
        let expected = Quaternion::from_axis_angle(Vector::Z_AXIS, FRAC_PI_2);
        assert!(close(q.dot(expected).abs(), 1.0));
    }

    #[test]
    fn test_axes_roundtrip() {
        let q = Quaternion::from_euler(Vector::new(0.4, 0.2, -1.1));
        let fwd = Vector::X_AXIS.rotate(q);
        let left = Vector::Y_AXIS.rotate(q);
        let up = Vector::Z_AXIS.rotate(q);
        let back = Quaternion::from_axes(fwd, left, up);
        assert!(close(back.dot(q).abs(), 1.0));
    }

    #[test]
    fn test_between() {
        let q = Quaternion::between(Vector::X_AXIS, Vector::Y_AXIS);
        assert!(vclose(Vector::X_AXIS.rotate(q), Vector::Y_AXIS));

        let flip = Quaternion::between(Vector::X_AXIS, -Vector::X_AXIS);
        assert!(vclose(Vector::X_AXIS.rotate(flip), -Vector::X_AXIS));

        assert_eq!(Quaternion::between(Vector::Z_AXIS, Vector::Z_AXIS), Quaternion::IDENTITY);
    }

    #[test]
    fn test_angle_axis() {
        let q = Quaternion::from_axis_angle(Vector::new(0.0, 2.0, 0.0), 1.0);
        let (angle, axis) = q.angle_axis();
        assert!(close(angle, 1.0));
        assert!(vclose(axis, Vector::Y_AXIS));
        assert_eq!(Quaternion::IDENTITY.angle_axis(), (0.0, Vector::ZERO));
    }

    #[test]
    fn test_angle_between() {
        let a = Quaternion::IDENTITY;
        let b = Quaternion::from_axis_angle(Vector::Z_AXIS, PI / 3.0);
        assert!(close(a.angle_between(b), PI / 3.0));
        assert!(b.angle_between(b) < 1e-3);
    }

    #[test]
    fn test_divide_undoes_compose() {
        let a = Quaternion::from_euler(Vector::new(0.1, 0.2, 0.3));
        let b = Quaternion::from_euler(Vector::new(-0.5, 0.4, 0.0));
        let back = a.compose(b).divide(b);
        assert!(close(back.dot(a).abs(), 1.0));
    }
}
