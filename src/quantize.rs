//! Fixed point quantization
//!
//! Signed conversions map [-1, 1] onto the full range of the integer type by
//! first rescaling to [0, 1] and then interpolating between the type's min
//! and max. The result is truncated toward zero, so 0.0 lands on 0 and both
//! ends of the range are reachable. Unsigned conversions map [0, 1] directly.
//! Inputs outside the domain clamp to the nearest end.
#![allow(clippy::cast_possible_truncation)]

use nalgebra_glm as glm;

/// Maps a float in [-1, 1] to an `i16` in [-32768, 32767]
#[must_use]
pub fn float_to_i16(x: f32) -> i16 {
    let t = (x + 1.0) * 0.5;
    let range = f32::from(i16::MAX) - f32::from(i16::MIN);
    let val = t.mul_add(range, f32::from(i16::MIN));
    val.clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}

/// Maps a float in [0, 1] to a `u16` in [0, 65535]
#[must_use]
pub fn float_to_u16(x: f32) -> u16 {
    let val = x * f32::from(u16::MAX);
    val.clamp(0.0, f32::from(u16::MAX)) as u16
}

/// Maps a float in [-1, 1] to an `i8` in [-128, 127]
#[must_use]
pub fn float_to_i8(x: f32) -> i8 {
    let t = (x + 1.0) * 0.5;
    let range = f32::from(i8::MAX) - f32::from(i8::MIN);
    let val = t.mul_add(range, f32::from(i8::MIN));
    val.clamp(f32::from(i8::MIN), f32::from(i8::MAX)) as i8
}

/// Maps a float in [0, 1] to a `u8` in [0, 255]
#[must_use]
pub fn float_to_u8(x: f32) -> u8 {
    let val = x * f32::from(u8::MAX);
    val.clamp(0.0, f32::from(u8::MAX)) as u8
}

/// Inverse of `float_to_i16`
#[must_use]
pub fn i16_to_float(q: i16) -> f32 {
    let t = (f32::from(q) - f32::from(i16::MIN))
        / (f32::from(i16::MAX) - f32::from(i16::MIN));
    t.mul_add(2.0, -1.0)
}

/// Inverse of `float_to_u16`
#[must_use]
pub fn u16_to_float(q: u16) -> f32 {
    f32::from(q) / f32::from(u16::MAX)
}

/// Inverse of `float_to_i8`
#[must_use]
pub fn i8_to_float(q: i8) -> f32 {
    let t = (f32::from(q) - f32::from(i8::MIN))
        / (f32::from(i8::MAX) - f32::from(i8::MIN));
    t.mul_add(2.0, -1.0)
}

/// Inverse of `float_to_u8`
#[must_use]
pub fn u8_to_float(q: u8) -> f32 {
    f32::from(q) / f32::from(u8::MAX)
}

/// Removes an offset and scale, moving `x` into [-1, 1] if it lies within
/// the range the offset and scale were computed from
#[must_use]
pub fn inv_ofs_scale(x: f32, ofs: f32, scale: f32) -> f32 {
    (x - ofs) / scale
}

/// Centre and half extent of a set of positions. Quantized positions are
/// stored relative to this box, which is computed once from the rest pose.
/// Vertices moved outside the box by skinning will clip if they are ever
/// quantized against it again.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuantGrid {
    pub ofs: glm::Vec3,
    pub scale: glm::Vec3,
}

impl Default for QuantGrid {
    fn default() -> Self {
        Self {
            ofs: glm::vec3(0.0, 0.0, 0.0),
            scale: glm::vec3(1.0, 1.0, 1.0),
        }
    }
}

impl QuantGrid {
    /// Computes the bounding box grid for `positions`. An axis with no extent
    /// gets a scale of 1 so every value on it quantizes to 0.
    #[must_use]
    pub fn from_positions(positions: &[glm::Vec3]) -> Self {
        let Some(first) = positions.first() else {
            return Self::default();
        };
        let mut min = *first;
        let mut max = *first;
        for p in positions {
            min = glm::min2(&min, p);
            max = glm::max2(&max, p);
        }
        let half = (max - min) * 0.5;
        let ofs = half + min;
        let scale = half.map(|s| if s > 0.0 { s } else { 1.0 });
        Self { ofs, scale }
    }

    /// Moves a position into the [-1, 1] cube of this grid
    #[must_use]
    pub fn normalize(&self, p: &glm::Vec3) -> glm::Vec3 {
        glm::vec3(
            inv_ofs_scale(p.x, self.ofs.x, self.scale.x),
            inv_ofs_scale(p.y, self.ofs.y, self.scale.y),
            inv_ofs_scale(p.z, self.ofs.z, self.scale.z),
        )
    }

    /// Maps a normalized position back to model space
    #[must_use]
    pub fn denormalize(&self, n: &glm::Vec3) -> glm::Vec3 {
        n.component_mul(&self.scale) + self.ofs
    }
}
