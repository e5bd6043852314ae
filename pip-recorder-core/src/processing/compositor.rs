use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::error::CaptureError;
use crate::models::media::Resolution;
use crate::processing::canvas::{Canvas, CanvasTrack, Rect};
use crate::traits::media_track::VideoTrack;

/// Inset width as a fraction of the surface width (`W / 5`).
pub const INSET_WIDTH_DIVISOR: f64 = 5.0;

/// Gap between the inset and the bottom-right corner of the surface.
pub const INSET_MARGIN_PX: f64 = 20.0;

/// Surface size for a background source: its native size, or 1920×1080 when
/// it reports none.
pub fn surface_resolution(background: Option<Resolution>) -> Resolution {
    match background {
        Some(res) if !res.is_degenerate() => res,
        _ => Resolution::FALLBACK,
    }
}

/// Picture-in-picture rectangle for an inset source on a surface.
///
/// Width is `W / 5`, height keeps the inset's aspect ratio, anchored
/// `INSET_MARGIN_PX` from the bottom-right corner.
pub fn inset_rect(surface: Resolution, inset: Resolution) -> Result<Rect, CaptureError> {
    let inverse_aspect = match inset.inverse_aspect() {
        Some(ratio) if inset.height > 0 => ratio,
        _ => {
            return Err(CaptureError::GeometryDegenerate {
                width: inset.width,
                height: inset.height,
            })
        }
    };
    let width = surface.width as f64 / INSET_WIDTH_DIVISOR;
    let height = inverse_aspect * width;
    Ok(Rect::new(
        surface.width as f64 - width - INSET_MARGIN_PX,
        surface.height as f64 - height - INSET_MARGIN_PX,
        width,
        height,
    ))
}

/// What a single render tick managed to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickOutcome {
    pub background_drawn: bool,
    pub inset_drawn: bool,
}

/// Composes the display (background) and camera (inset) into one surface.
///
/// Read-only with respect to its sources; the surface is shared with the
/// `CanvasTrack` the encoder consumes.
pub struct Compositor {
    surface: Resolution,
    canvas: Arc<Mutex<Canvas>>,
    background: Arc<dyn VideoTrack>,
    inset: Option<Arc<dyn VideoTrack>>,
}

impl Compositor {
    pub fn new(background: Arc<dyn VideoTrack>, inset: Option<Arc<dyn VideoTrack>>) -> Self {
        let surface = surface_resolution(background.settings().resolution());
        log::info!("Composition surface {}", surface);
        Self {
            surface,
            canvas: Arc::new(Mutex::new(Canvas::new(surface))),
            background,
            inset,
        }
    }

    pub fn surface(&self) -> Resolution {
        self.surface
    }

    pub fn has_inset(&self) -> bool {
        self.inset.is_some()
    }

    pub fn canvas(&self) -> Arc<Mutex<Canvas>> {
        Arc::clone(&self.canvas)
    }

    /// Live track of the composed surface at `frame_rate`.
    pub fn capture_stream(&self, frame_rate: u32) -> Arc<CanvasTrack> {
        CanvasTrack::capture(Arc::clone(&self.canvas), frame_rate)
    }

    /// Draw one composed frame. A layer without a ready frame, or with a
    /// degenerate geometry, is skipped for this tick only.
    pub fn render_tick(&self) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        let full = Rect::new(0.0, 0.0, self.surface.width as f64, self.surface.height as f64);
        let mut canvas = self.canvas.lock();

        match self.background.current_frame() {
            Some(frame) => outcome.background_drawn = canvas.draw_frame(&frame, full),
            None => log::trace!("Background frame not ready, skipping"),
        }

        if let Some(inset) = &self.inset {
            match inset.current_frame() {
                Some(frame) => match inset_rect(self.surface, frame.resolution()) {
                    Ok(rect) => outcome.inset_drawn = canvas.draw_frame(&frame, rect),
                    Err(e) => log::debug!("Skipping inset draw: {}", e),
                },
                None => log::trace!("Inset frame not ready, skipping"),
            }
        }

        outcome
    }
}
