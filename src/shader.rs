//! WGSL used by the preview window.

use bytemuck::{Pod, Zeroable};

/// Fullscreen-triangle blit of the frame texture.
pub const BLIT_SHADER: &str = include_str!("blit.wgsl");

/// Uniform block of [`BLIT_SHADER`].
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable, PartialEq)]
pub struct BlitUniforms {
    /// Fraction of the window covered by the frame on each axis.
    pub scale: [f32; 2],
    pub _pad: [f32; 2],
}

impl BlitUniforms {
    /// Scale that fits a `frame` sized image inside `window` without
    /// distorting it.
    pub fn letterbox(frame: (u32, u32), window: (u32, u32)) -> Self {
        let frame_aspect = frame.0.max(1) as f32 / frame.1.max(1) as f32;
        let window_aspect = window.0.max(1) as f32 / window.1.max(1) as f32;
        let scale = if window_aspect > frame_aspect {
            [frame_aspect / window_aspect, 1.0]
        } else {
            [1.0, window_aspect / frame_aspect]
        };
        Self { scale, _pad: [0.0; 2] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letterbox() {
        assert_eq!(BlitUniforms::letterbox((1920, 1080), (1920, 1080)).scale, [1.0, 1.0]);
        let wide = BlitUniforms::letterbox((100, 100), (200, 100));
        assert_eq!(wide.scale, [0.5, 1.0]);
        let tall = BlitUniforms::letterbox((100, 100), (100, 400));
        assert_eq!(tall.scale, [1.0, 0.25]);
    }

    #[test]
    fn test_uniforms_are_16_bytes() {
        assert_eq!(std::mem::size_of::<BlitUniforms>(), 16);
    }
}
