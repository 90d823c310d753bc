//! Rigid-body geometry for field localisation.
//!
//! All quantities are `f64`.  Frames follow the field-robotics convention:
//! +X forward, +Y left, +Z up.  A camera looks down its own +X axis.
//!
//! A [`Pose3d`] is the placement of a frame in some parent frame (usually the
//! field).  A [`Transform3d`] is the relative placement of one frame with
//! respect to another, e.g. the camera mounting offset from the robot origin.
//!
//! # Example
//!
//! ```rust
//! use tagpose_types::geometry::{Pose3d, Rotation3d, Transform3d, Translation3d};
//!
//! // Robot 1 m along +X, facing +Y.
//! let robot = Pose3d::new(
//!     Translation3d::new(1.0, 0.0, 0.0),
//!     Rotation3d::from_euler(0.0, 0.0, std::f64::consts::FRAC_PI_2),
//! );
//! // Camera 0.5 m in front of the robot origin.
//! let robot_to_cam = Transform3d::new(Translation3d::new(0.5, 0.0, 0.0), Rotation3d::identity());
//!
//! let cam = robot.transform_by(&robot_to_cam);
//! assert!((cam.translation.x - 1.0).abs() < 1e-9);
//! assert!((cam.translation.y - 0.5).abs() < 1e-9);
//! ```

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Translations
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D translation (metres).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Translation3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Translation3d {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn scale(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }

    pub fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// Euclidean length.
    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Planar projection (drops `z`).
    pub fn to_translation2d(self) -> Translation2d {
        Translation2d::new(self.x, self.y)
    }
}

/// A planar translation (metres).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Translation2d {
    pub x: f64,
    pub y: f64,
}

impl Translation2d {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Planar Euclidean distance to `other`.
    pub fn distance(&self, other: &Translation2d) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rotations
// ────────────────────────────────────────────────────────────────────────────

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rotation3d {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Rotation3d {
    fn default() -> Self {
        Self::identity()
    }
}

impl Rotation3d {
    /// Build a rotation from raw quaternion components, normalising to unit
    /// length.  A degenerate (zero-length) quaternion yields the identity.
    pub fn from_quaternion(w: f64, x: f64, y: f64, z: f64) -> Self {
        let norm = (w * w + x * x + y * y + z * z).sqrt();
        if norm < 1e-12 || !norm.is_finite() {
            return Self::identity();
        }
        Self {
            w: w / norm,
            x: x / norm,
            y: y / norm,
            z: z / norm,
        }
    }

    pub fn identity() -> Self {
        Self {
            w: 1.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    /// Extrinsic roll (X), then pitch (Y), then yaw (Z), radians.
    pub fn from_euler(roll: f64, pitch: f64, yaw: f64) -> Self {
        let (sr, cr) = (roll * 0.5).sin_cos();
        let (sp, cp) = (pitch * 0.5).sin_cos();
        let (sy, cy) = (yaw * 0.5).sin_cos();
        Self {
            w: cr * cp * cy + sr * sp * sy,
            x: sr * cp * cy - cr * sp * sy,
            y: cr * sp * cy + sr * cp * sy,
            z: cr * cp * sy - sr * sp * cy,
        }
    }

    /// Pure rotation about +Z.
    pub fn from_yaw(yaw: f64) -> Self {
        Self::from_euler(0.0, 0.0, yaw)
    }

    pub fn roll(&self) -> f64 {
        let Self { w, x, y, z } = *self;
        (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y))
    }

    pub fn pitch(&self) -> f64 {
        let Self { w, x, y, z } = *self;
        (2.0 * (w * y - z * x)).clamp(-1.0, 1.0).asin()
    }

    pub fn yaw(&self) -> f64 {
        let Self { w, x, y, z } = *self;
        (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z))
    }

    /// Hamilton product: `self` followed by `rhs` in the body frame.
    pub fn mul(self, rhs: Self) -> Self {
        Self {
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        }
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn inverse(self) -> Self {
        Self {
            w: self.w,
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }

    /// Rotate a vector: p' = q * p * q*.
    pub fn rotate(self, v: Translation3d) -> Translation3d {
        let p = Self {
            w: 0.0,
            x: v.x,
            y: v.y,
            z: v.z,
        };
        let r = self.mul(p).mul(self.inverse());
        Translation3d::new(r.x, r.y, r.z)
    }

    pub fn is_finite(&self) -> bool {
        self.w.is_finite() && self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// A planar heading (radians, counter-clockwise from +X).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotation2d {
    pub radians: f64,
}

impl Rotation2d {
    pub fn new(radians: f64) -> Self {
        Self { radians }
    }

    pub fn from_degrees(degrees: f64) -> Self {
        Self::new(degrees.to_radians())
    }

    pub fn degrees(&self) -> f64 {
        self.radians.to_degrees()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Poses and transforms
// ────────────────────────────────────────────────────────────────────────────

/// Placement of a frame in its parent (usually the field).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose3d {
    pub translation: Translation3d,
    pub rotation: Rotation3d,
}

impl Pose3d {
    pub fn new(translation: Translation3d, rotation: Rotation3d) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Lift a planar pose onto the floor (`z = 0`, yaw only).
    pub fn from_pose2d(pose: &Pose2d) -> Self {
        Self::new(
            Translation3d::new(pose.translation.x, pose.translation.y, 0.0),
            Rotation3d::from_yaw(pose.rotation.radians),
        )
    }

    /// Apply `transform` expressed in this pose's own frame.
    pub fn transform_by(&self, transform: &Transform3d) -> Pose3d {
        Pose3d::new(
            self.translation
                .add(self.rotation.rotate(transform.translation)),
            self.rotation.mul(transform.rotation),
        )
    }

    /// The transform that takes `origin` to `self`, expressed in `origin`'s
    /// frame: `origin.transform_by(&self.relative_to(origin)) == self`.
    pub fn relative_to(&self, origin: &Pose3d) -> Transform3d {
        let inv = origin.rotation.inverse();
        Transform3d::new(
            inv.rotate(self.translation.sub(origin.translation)),
            inv.mul(self.rotation),
        )
    }

    /// Planar projection: keeps x, y and yaw.
    pub fn to_pose2d(&self) -> Pose2d {
        Pose2d::new(
            self.translation.to_translation2d(),
            Rotation2d::new(self.rotation.yaw()),
        )
    }

    pub fn is_finite(&self) -> bool {
        self.translation.is_finite() && self.rotation.is_finite()
    }
}

/// Rigid-body transform from one frame to another: rotate by `rotation`,
/// then translate by `translation` (both expressed in the source frame).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform3d {
    pub translation: Translation3d,
    pub rotation: Rotation3d,
}

impl Transform3d {
    pub fn new(translation: Translation3d, rotation: Rotation3d) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn identity() -> Self {
        Self::default()
    }

    /// If `self` = T_A_B, returns T_B_A.
    pub fn inverse(&self) -> Transform3d {
        let inv = self.rotation.inverse();
        Transform3d::new(inv.rotate(self.translation).scale(-1.0), inv)
    }

    /// If `self` = T_A_B and `other` = T_B_C, the result is T_A_C.
    pub fn compose(&self, other: &Transform3d) -> Transform3d {
        Transform3d::new(
            self.translation.add(self.rotation.rotate(other.translation)),
            self.rotation.mul(other.rotation),
        )
    }

    /// Treat the transform as a pose of the target frame in the source frame.
    pub fn as_pose(&self) -> Pose3d {
        Pose3d::new(self.translation, self.rotation)
    }

    pub fn is_finite(&self) -> bool {
        self.translation.is_finite() && self.rotation.is_finite()
    }
}

/// A planar robot pose on the field.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose2d {
    pub translation: Translation2d,
    pub rotation: Rotation2d,
}

impl Pose2d {
    pub fn new(translation: Translation2d, rotation: Rotation2d) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn from_xy_heading(x: f64, y: f64, heading_rad: f64) -> Self {
        Self::new(Translation2d::new(x, y), Rotation2d::new(heading_rad))
    }
}
