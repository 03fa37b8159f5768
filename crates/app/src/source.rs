use ambient_painter_core::{FrameSource, VideoFrame};

/// Procedural stand-in for a camera: a hue gradient that rotates slowly with
/// a bright disc drifting across it.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    width: usize,
    height: usize,
    fps: f64,
    frame: u64,
}

impl SyntheticCamera {
    pub fn new(width: usize, height: usize, fps: f64) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            fps: fps.max(1.0),
            frame: 0,
        }
    }

    fn render(&self, t: f64) -> VideoFrame {
        let base_hue = (t * 6.0) % 360.0;
        let (w, h) = (self.width as f64, self.height as f64);
        let cx = w * (0.5 + 0.35 * (t * 0.21).sin());
        let cy = h * (0.5 + 0.3 * (t * 0.13).cos());
        let radius = w.min(h) * 0.18;

        VideoFrame::from_fn(self.width, self.height, |x, y| {
            let (fx, fy) = (x as f64, y as f64);
            let hue = base_hue + 40.0 * fx / w;
            let value = 0.35 + 0.4 * fy / h;
            let d = ((fx - cx).powi(2) + (fy - cy).powi(2)).sqrt();
            if d < radius {
                hsv_to_rgb(hue + 180.0, 0.3, 1.0)
            } else {
                hsv_to_rgb(hue, 0.75, value)
            }
        })
    }
}

impl FrameSource for SyntheticCamera {
    fn current_frame(&mut self) -> Option<VideoFrame> {
        let t = self.frame as f64 / self.fps;
        self.frame += 1;
        Some(self.render(t))
    }
}

fn hsv_to_rgb(hue: f64, sat: f64, val: f64) -> [u8; 3] {
    let h = hue.rem_euclid(360.0) / 60.0;
    let c = val * sat;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = val - c;
    [r, g, b].map(|channel| ((channel + m) * 255.0).round().clamp(0.0, 255.0) as u8)
}
