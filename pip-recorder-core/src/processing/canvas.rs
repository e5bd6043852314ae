use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::media::{Resolution, VideoFrame, VideoTrackSettings};
use crate::traits::media_track::{MediaTrack, VideoTrack};

const BPP: usize = VideoFrame::BYTES_PER_PIXEL;

/// Opaque black, the colour of a fresh surface.
pub const BLACK: [u8; 4] = [0, 0, 0, 255];

/// Destination rectangle in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Software RGBA8 drawing surface.
#[derive(Clone)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(resolution: Resolution) -> Self {
        let mut canvas = Self {
            width: 0,
            height: 0,
            pixels: Vec::new(),
        };
        canvas.resize(resolution);
        canvas
    }

    /// Resize the surface. Existing content is discarded.
    pub fn resize(&mut self, resolution: Resolution) {
        self.width = resolution.width;
        self.height = resolution.height;
        self.pixels = vec![0; resolution.pixel_count() * BPP];
        self.clear(BLACK);
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn clear(&mut self, rgba: [u8; 4]) {
        for px in self.pixels.chunks_exact_mut(BPP) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Draw `frame` scaled into `dest` (nearest neighbour), clipped to the
    /// surface. Returns `false` when nothing was drawn.
    pub fn draw_frame(&mut self, frame: &VideoFrame, dest: Rect) -> bool {
        if frame.resolution().is_degenerate() || dest.is_empty() {
            return false;
        }

        let x0 = dest.x.round().max(0.0).min(self.width as f64) as usize;
        let x1 = dest.right().round().max(0.0).min(self.width as f64) as usize;
        let y0 = dest.y.round().max(0.0).min(self.height as f64) as usize;
        let y1 = dest.bottom().round().max(0.0).min(self.height as f64) as usize;
        if x0 >= x1 || y0 >= y1 {
            return false;
        }

        let src_w = frame.width() as usize;
        let src_h = frame.height() as usize;
        let x_scale = src_w as f64 / dest.width;
        let y_scale = src_h as f64 / dest.height;

        // Source byte offset within a row, per destination column.
        let columns: Vec<usize> = (x0..x1)
            .map(|dx| {
                let sx = ((dx as f64 + 0.5 - dest.x) * x_scale).floor().max(0.0) as usize;
                sx.min(src_w - 1) * BPP
            })
            .collect();

        let src = frame.data();
        let stride = self.width as usize * BPP;
        for dy in y0..y1 {
            let sy = ((dy as f64 + 0.5 - dest.y) * y_scale).floor().max(0.0) as usize;
            let src_row = sy.min(src_h - 1) * src_w * BPP;
            let dst_row = dy * stride;
            for (i, &col) in columns.iter().enumerate() {
                let dst = dst_row + (x0 + i) * BPP;
                let s = src_row + col;
                if let (Some(out), Some(px)) = (self.pixels.get_mut(dst..dst + BPP), src.get(s..s + BPP)) {
                    out.copy_from_slice(px);
                }
            }
        }
        true
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * BPP;
        let px = self.pixels.get(offset..offset + BPP)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Copy of the current surface contents.
    pub fn snapshot(&self) -> VideoFrame {
        VideoFrame::from_raw(self.width, self.height, self.pixels.clone())
    }
}

/// Live video track capturing a shared canvas at a fixed frame rate.
pub struct CanvasTrack {
    id: String,
    canvas: Arc<Mutex<Canvas>>,
    frame_rate: u32,
    live: AtomicBool,
}

impl CanvasTrack {
    pub fn capture(canvas: Arc<Mutex<Canvas>>, frame_rate: u32) -> Arc<Self> {
        Arc::new(Self {
            id: format!("canvas-{}", uuid::Uuid::new_v4()),
            canvas,
            frame_rate,
            live: AtomicBool::new(true),
        })
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }
}

impl MediaTrack for CanvasTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

impl VideoTrack for CanvasTrack {
    fn settings(&self) -> VideoTrackSettings {
        let mut settings = VideoTrackSettings::with_resolution(self.canvas.lock().resolution());
        settings.frame_rate = Some(self.frame_rate as f64);
        settings
    }

    fn current_frame(&self) -> Option<Arc<VideoFrame>> {
        if !self.is_live() {
            return None;
        }
        Some(Arc::new(self.canvas.lock().snapshot()))
    }
}
