//! Raw RGBA video frames and the synthetic ball renderer

use std::sync::Arc;

use crate::constants::BYTES_PER_PIXEL;
use crate::types::{BallConfig, FrameError, Position};

/// Ball colour (opaque red)
pub const BALL_RGBA: [u8; 4] = [255, 0, 0, 255];

/// Background colour (opaque white)
pub const BACKGROUND_RGBA: [u8; 4] = [255, 255, 255, 255];

/// A tightly packed, row-major RGBA8 raster.
///
/// The pixel buffer is shared, so cloning a frame to hand it to several
/// consumers does not copy pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    width: u32,
    height: u32,
    data: Arc<[u8]>,
}

impl VideoFrame {
    /// Wrap an RGBA buffer, checking it covers `width * height` pixels
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
        let expected = frame_len(width, height);
        if data.len() < expected {
            return Err(FrameError::BufferTooShort { expected, actual: data.len() });
        }
        Ok(Self { width, height, data: data.into() })
    }

    /// A frame filled with one colour
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data: Vec<u8> = rgba
            .iter()
            .copied()
            .cycle()
            .take(frame_len(width, height))
            .collect();
        Self { width, height, data: data.into() }
    }

    /// Frame width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The RGBA bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// RGBA value of one pixel, `None` outside the frame
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = self.data.get(i..i + BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Byte length of a `width x height` RGBA frame
pub fn frame_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

/// Paint a filled ball of `config.ball_radius()` centred on `position` over
/// a white background
pub fn render_ball_frame(config: &BallConfig, position: &Position) -> VideoFrame {
    let (width, height) = (config.width(), config.height());
    let radius = f64::from(config.ball_radius());
    let mut data = Vec::with_capacity(frame_len(width, height));

    for y in 0..height {
        let dy = f64::from(y) - position.y;
        for x in 0..width {
            let dx = f64::from(x) - position.x;
            let inside = (dx * dx + dy * dy).sqrt() < radius;
            data.extend_from_slice(if inside { &BALL_RGBA } else { &BACKGROUND_RGBA });
        }
    }

    VideoFrame { width, height, data: data.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_buffer_is_rejected() {
        let err = VideoFrame::new(2, 2, vec![0; 15]).unwrap_err();
        assert_eq!(err, FrameError::BufferTooShort { expected: 16, actual: 15 });
    }

    #[test]
    fn rendered_ball_sits_at_position() {
        let config = BallConfig::new(30.0, 64, 48, 5).unwrap();
        let frame = render_ball_frame(&config, &Position::new(20.0, 30.0, 0));
        assert_eq!(frame.data().len(), frame_len(64, 48));
        assert_eq!(frame.pixel(20, 30), Some(BALL_RGBA));
        assert_eq!(frame.pixel(24, 30), Some(BALL_RGBA));
        assert_eq!(frame.pixel(25, 30), Some(BACKGROUND_RGBA));
        assert_eq!(frame.pixel(0, 0), Some(BACKGROUND_RGBA));
        assert_eq!(frame.pixel(64, 0), None);
    }
}
