/// Channel layout of a [`VideoFrame`]'s byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Rgb8,
    Rgba8,
}

impl PixelLayout {
    fn stride(self) -> usize {
        match self {
            PixelLayout::Rgb8 => 3,
            PixelLayout::Rgba8 => 4,
        }
    }
}

/// A raw frame as delivered by a capture device. Alpha is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    width: usize,
    height: usize,
    layout: PixelLayout,
    data: Vec<u8>,
}

impl VideoFrame {
    pub fn rgb(width: usize, height: usize, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            layout: PixelLayout::Rgb8,
            data,
        }
    }

    pub fn rgba(width: usize, height: usize, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            layout: PixelLayout::Rgba8,
            data,
        }
    }

    /// A frame filled with one color.
    pub fn solid(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let data = rgb.iter().copied().cycle().take(width * height * 3).collect();
        Self::rgb(width, height, data)
    }

    /// Builds a frame by evaluating `pixel(x, y)` everywhere.
    pub fn from_fn(
        width: usize,
        height: usize,
        mut pixel: impl FnMut(usize, usize) -> [u8; 3],
    ) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&pixel(x, y));
            }
        }
        Self::rgb(width, height, data)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Pixel at `(x, y)`. Bytes missing from a short buffer read as black.
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let offset = (y * self.width + x) * self.layout.stride();
        match self.data.get(offset..offset + 3) {
            Some(px) => [px[0], px[1], px[2]],
            None => [0, 0, 0],
        }
    }

    /// Box-filters the frame into a `size`×`size` buffer, stretching to fit.
    /// An empty frame comes out black.
    pub fn downscale(&self, size: usize) -> Vec<[u8; 3]> {
        let mut out = vec![[0u8; 3]; size * size];
        if self.width == 0 || self.height == 0 || size == 0 {
            return out;
        }

        for ty in 0..size {
            let (y0, y1) = span(ty, size, self.height);
            for tx in 0..size {
                let (x0, x1) = span(tx, size, self.width);
                let mut acc = [0u32; 3];
                for y in y0..y1 {
                    for x in x0..x1 {
                        let px = self.pixel(x, y);
                        acc[0] += u32::from(px[0]);
                        acc[1] += u32::from(px[1]);
                        acc[2] += u32::from(px[2]);
                    }
                }
                let n = ((y1 - y0) * (x1 - x0)) as u32;
                out[ty * size + tx] = acc.map(|c| ((c + n / 2) / n) as u8);
            }
        }
        out
    }
}

/// Source rows (or columns) covered by target cell `i`; never empty.
fn span(i: usize, target: usize, source: usize) -> (usize, usize) {
    let start = i * source / target;
    let end = ((i + 1) * source / target).max(start + 1).min(source);
    (start.min(source - 1), end)
}

/// Supplies the current frame on demand. `None` means no frame is available
/// yet; the extractor then publishes nothing for that tick.
pub trait FrameSource {
    fn current_frame(&mut self) -> Option<VideoFrame>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downscale_averages_blocks() {
        let frame = VideoFrame::from_fn(4, 4, |x, _| if x < 2 { [200, 0, 0] } else { [0, 0, 100] });
        let small = frame.downscale(2);
        assert_eq!(small, vec![[200, 0, 0], [0, 0, 100], [200, 0, 0], [0, 0, 100]]);
    }

    #[test]
    fn upscale_repeats_pixels() {
        let frame = VideoFrame::solid(1, 1, [10, 20, 30]);
        assert!(frame.downscale(32).iter().all(|px| *px == [10, 20, 30]));
    }

    #[test]
    fn rgba_ignores_alpha() {
        let frame = VideoFrame::rgba(1, 1, vec![1, 2, 3, 255]);
        assert_eq!(frame.pixel(0, 0), [1, 2, 3]);
    }

    #[test]
    fn short_buffers_read_black() {
        let frame = VideoFrame::rgb(2, 2, vec![255, 255, 255]);
        assert_eq!(frame.pixel(1, 1), [0, 0, 0]);
        assert_eq!(VideoFrame::rgb(0, 0, Vec::new()).downscale(3), vec![[0; 3]; 9]);
    }
}
