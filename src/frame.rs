use crate::utils::bbox::BoundingBox;
use crate::Errors;
use std::time::Duration;

/// Bytes per pixel of the BGR24 layout frames are carried in.
pub const BYTES_PER_PIXEL: usize = 3;

/// Decoded image buffer with a monotonic timestamp.
///
/// The timestamp is relative to the start of the stream and drives both rate governance and
/// recognition cooldowns, which keeps the whole pipeline deterministic under replay.
///
#[derive(Clone, Debug)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
    timestamp: Duration,
}

impl Frame {
    /// Validates the buffer against the declared dimensions.
    ///
    pub fn new(width: u32, height: u32, data: Vec<u8>, timestamp: Duration) -> Result<Self, Errors> {
        if width == 0 || height == 0 {
            return Err(Errors::DecodeError(format!(
                "zero dimensions {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(Errors::DecodeError(format!(
                "buffer holds {} bytes, {}x{} needs {}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            timestamp,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn exceeds(&self, max_width: u32, max_height: u32) -> bool {
        self.width > max_width || self.height > max_height
    }

    /// Crops the frame to `bbox` clamped to the frame. Returns `None` when nothing remains.
    ///
    pub fn crop(&self, bbox: &BoundingBox) -> Option<Frame> {
        let clamped = bbox.clamp(self.width as f32, self.height as f32)?;
        let x1 = clamped.left as usize;
        let y1 = clamped.top as usize;
        let x2 = (clamped.right.ceil() as usize).min(self.width as usize);
        let y2 = (clamped.bottom.ceil() as usize).min(self.height as usize);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        let width = x2 - x1;
        let height = y2 - y1;
        let mut data = Vec::with_capacity(width * height * BYTES_PER_PIXEL);
        let stride = self.width as usize * BYTES_PER_PIXEL;
        for row in y1..y2 {
            let offset = row * stride + x1 * BYTES_PER_PIXEL;
            data.extend_from_slice(&self.data[offset..offset + width * BYTES_PER_PIXEL]);
        }

        Some(Frame {
            width: width as u32,
            height: height as u32,
            data,
            timestamp: self.timestamp,
        })
    }

    /// Downscales by nearest-neighbor subsampling so both dimensions fit the given maximums.
    /// Aspect ratio is preserved.
    ///
    pub fn downscale(&self, max_width: u32, max_height: u32) -> Frame {
        if !self.exceeds(max_width, max_height) {
            return self.clone();
        }

        let scale = (max_width as f64 / self.width as f64)
            .min(max_height as f64 / self.height as f64);
        let width = ((self.width as f64 * scale) as u32).max(1);
        let height = ((self.height as f64 * scale) as u32).max(1);

        let mut data = Vec::with_capacity(width as usize * height as usize * BYTES_PER_PIXEL);
        let stride = self.width as usize * BYTES_PER_PIXEL;
        for y in 0..height {
            let src_y = (y as f64 / scale) as usize;
            for x in 0..width {
                let src_x = (x as f64 / scale) as usize;
                let offset = src_y * stride + src_x * BYTES_PER_PIXEL;
                data.extend_from_slice(&self.data[offset..offset + BYTES_PER_PIXEL]);
            }
        }

        Frame {
            width,
            height,
            data,
            timestamp: self.timestamp,
        }
    }
}

/// Source of decoded frames consumed by the pipeline worker.
///
pub trait FrameSource {
    /// The next decoded frame, or `None` on end of stream.
    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>>;
}
