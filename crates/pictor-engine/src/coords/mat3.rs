use super::{Vec2, Viewport};

/// Column-major 3×3 affine matrix.
///
/// `cols[c][r]` is column `c`, row `r`. Matrices multiply column vectors on
/// the right, so in a product `a * b` the transform `b` applies first.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Mat3 {
    pub cols: [[f32; 3]; 3],
}

impl Mat3 {
    pub const IDENTITY: Mat3 = Mat3 {
        cols: [
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ],
    };

    /// Maps pixel-centered device coordinates to NDC.
    ///
    /// Diagonal is `(2/width, 2/height, 1)`, zero elsewhere, so the corners
    /// `(±width/2, ±height/2)` land exactly on `(±1, ±1)`.
    pub fn projection(viewport: Viewport) -> Mat3 {
        Mat3 {
            cols: [
                [2.0 / viewport.width, 0.0, 0.0],
                [0.0, 2.0 / viewport.height, 0.0],
                [0.0, 0.0, 1.0],
            ],
        }
    }

    /// Composes scale, then rotation, then translation.
    ///
    /// The operand order is a fixed convention: rotation and scale do not
    /// commute, so column 0 is `(sx·cosθ, sx·sinθ, 0)`, column 1 is
    /// `(-sy·sinθ, sy·cosθ, 0)`, column 2 is `(px, py, 1)`.
    pub fn model(position: Vec2, scale: Vec2, rotation: f32) -> Mat3 {
        let (sin, cos) = rotation.sin_cos();
        Mat3 {
            cols: [
                [scale.x * cos, scale.x * sin, 0.0],
                [-scale.y * sin, scale.y * cos, 0.0],
                [position.x, position.y, 1.0],
            ],
        }
    }

    pub fn mul(self, rhs: Mat3) -> Mat3 {
        let mut out = [[0.0f32; 3]; 3];
        for c in 0..3 {
            for r in 0..3 {
                out[c][r] = self.cols[0][r] * rhs.cols[c][0]
                    + self.cols[1][r] * rhs.cols[c][1]
                    + self.cols[2][r] * rhs.cols[c][2];
            }
        }
        Mat3 { cols: out }
    }

    /// Applies the affine transform to a point (implicit w = 1).
    pub fn transform_point(self, p: Vec2) -> Vec2 {
        Vec2::new(
            self.cols[0][0] * p.x + self.cols[1][0] * p.y + self.cols[2][0],
            self.cols[0][1] * p.x + self.cols[1][1] * p.y + self.cols[2][1],
        )
    }

    /// Packs the matrix for a WGSL `mat3x3<f32>` uniform.
    ///
    /// WGSL uniform columns have a 16-byte stride, so each 3-component
    /// column is padded with one float (48 bytes total).
    pub fn to_uniform(self) -> [f32; 12] {
        let c = self.cols;
        [
            c[0][0], c[0][1], c[0][2], 0.0,
            c[1][0], c[1][1], c[1][2], 0.0,
            c[2][0], c[2][1], c[2][2], 0.0,
        ]
    }
}

impl Default for Mat3 {
    fn default() -> Self {
        Mat3::IDENTITY
    }
}
