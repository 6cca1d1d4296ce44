use std::fmt::{Display, Formatter};

use binrw::binrw;
use serde::Serialize;

/// Affine intensity normalization parameters of one normalization group.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct XForm {
    pub version: i32,
    pub x_offset: f32,
    pub y_offset: f32,
    pub x_scale: f32,
    pub y_scale: f32,
    pub shear: f32,
    /// Rotation angle, in radians.
    #[brw(pad_after = 24)]
    pub theta: f32,
}

impl XForm {
    /// The transform that leaves intensities unchanged.
    pub const IDENTITY: XForm = XForm {
        version: 1,
        x_offset: 0.0,
        y_offset: 0.0,
        x_scale: 1.0,
        y_scale: 1.0,
        shear: 0.0,
        theta: 0.0,
    };

    /// Normalizes a raw intensity pair: translate by the offsets, rotate by
    /// `-theta`, shear along X, then scale.
    ///
    /// # Examples
    /// ```
    /// use simtools::gtc::xform::XForm;
    ///
    /// let xform = XForm {
    ///     x_offset: 100.0,
    ///     y_offset: 50.0,
    ///     x_scale: 2.0,
    ///     y_scale: 4.0,
    ///     ..XForm::IDENTITY
    /// };
    /// assert_eq!(xform.normalize(300, 450), (100.0, 100.0));
    /// ```
    #[must_use]
    pub fn normalize(&self, x_raw: u16, y_raw: u16) -> (f64, f64) {
        let x = f64::from(x_raw) - f64::from(self.x_offset);
        let y = f64::from(y_raw) - f64::from(self.y_offset);

        let theta = f64::from(self.theta);
        let (sin_theta, cos_theta) = theta.sin_cos();
        let x_rotated = cos_theta * x + sin_theta * y;
        let y_rotated = -sin_theta * x + cos_theta * y;

        let x_sheared = x_rotated - f64::from(self.shear) * y_rotated;

        (
            x_sheared / f64::from(self.x_scale),
            y_rotated / f64::from(self.y_scale),
        )
    }
}

impl Display for XForm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Version: {}", self.version)?;
        writeln!(f, "XOffset: {}", self.x_offset)?;
        writeln!(f, "YOffset: {}", self.y_offset)?;
        writeln!(f, "XScale: {}", self.x_scale)?;
        writeln!(f, "YScale: {}", self.y_scale)?;
        writeln!(f, "Shear: {}", self.shear)?;
        write!(f, "Theta: {}", self.theta)
    }
}
