//! Overlay compositor.
//!
//! Owns the pair of full-screen surfaces that make up the overlay: an
//! indicator surface the bars are drawn on and an invisible interceptor
//! surface that turns switch presses into [`SurfaceInput`]. The pair is
//! created and destroyed together; having it is what "overlay visible"
//! means.

pub mod backend;
pub mod paint;

pub use backend::{
    ActivationSink, HeadlessBackend, HeadlessHandle, SurfaceBackend, SurfaceError, SurfaceId,
    SurfaceInput, SurfaceRole, SurfaceSpec, SwitchInput,
};
pub use paint::{Color, DrawCommand, Frame, Paint, PaintStyle, Palette, Rect};

use crate::engine::ScanEngine;
use crate::models::Extent;

#[derive(Debug, Clone, Copy)]
struct SurfacePair {
    indicator: SurfaceId,
    interceptor: SurfaceId,
    extent: Extent,
}

/// Result of [`OverlayCompositor::show`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShowOutcome {
    /// Surfaces were created over a display of this size.
    Created(Extent),
    /// The overlay was already up.
    AlreadyShown,
}

pub struct OverlayCompositor {
    backend: Box<dyn SurfaceBackend>,
    surfaces: Option<SurfacePair>,
    palette: Palette,
}

impl OverlayCompositor {
    pub fn new(backend: Box<dyn SurfaceBackend>) -> Self {
        Self {
            backend,
            surfaces: None,
            palette: Palette::default(),
        }
    }

    pub fn is_shown(&self) -> bool {
        self.surfaces.is_some()
    }

    /// Record that the display under the surfaces changed size.
    ///
    /// Returns false while hidden or when the size is unchanged.
    pub fn resize(&mut self, extent: Extent) -> bool {
        match self.surfaces.as_mut() {
            Some(pair) if pair.extent != extent => {
                pair.extent = extent;
                true
            }
            _ => false,
        }
    }

    /// Change the indicator colour. Takes effect on the next repaint.
    pub fn set_color(&mut self, color: Color) {
        self.palette = Palette::new(color);
    }

    /// Create both surfaces if they are not up yet.
    ///
    /// If the interceptor cannot be created the indicator is destroyed again,
    /// so the overlay is either fully up or fully down.
    pub fn show(&mut self, sink: ActivationSink) -> Result<ShowOutcome, SurfaceError> {
        if self.surfaces.is_some() {
            return Ok(ShowOutcome::AlreadyShown);
        }

        let extent = self.backend.display_extent()?;
        let indicator = self.backend.create_surface(SurfaceSpec::indicator(), None)?;

        let interceptor = match self
            .backend
            .create_surface(SurfaceSpec::interceptor(), Some(sink))
        {
            Ok(id) => id,
            Err(e) => {
                if let Err(cleanup) = self.backend.destroy_surface(indicator) {
                    tracing::warn!("Failed to destroy indicator after partial show: {}", cleanup);
                }
                return Err(e);
            }
        };

        tracing::debug!(
            "Overlay surfaces created: indicator={:?}, interceptor={:?}, extent={}x{}",
            indicator,
            interceptor,
            extent.width,
            extent.height
        );

        self.surfaces = Some(SurfacePair {
            indicator,
            interceptor,
            extent,
        });
        Ok(ShowOutcome::Created(extent))
    }

    /// Destroy both surfaces. Returns false if there was nothing to destroy.
    pub fn hide(&mut self) -> bool {
        let Some(pair) = self.surfaces.take() else {
            return false;
        };

        for id in [pair.interceptor, pair.indicator] {
            if let Err(e) = self.backend.destroy_surface(id) {
                tracing::warn!("Failed to destroy overlay surface {:?}: {}", id, e);
            }
        }
        tracing::debug!("Overlay surfaces destroyed");
        true
    }

    /// Draw the engine's current state on the indicator surface.
    ///
    /// Does nothing while the overlay is hidden.
    pub fn repaint(&mut self, engine: &ScanEngine) -> Result<(), SurfaceError> {
        let Some(pair) = self.surfaces else {
            return Ok(());
        };
        let frame = paint::render(engine, &self.palette);
        self.backend.present(pair.indicator, &frame)
    }
}

#[cfg(test)]
mod tests {
    use super::backend::MockSurfaceBackend;
    use super::*;
    use crate::models::Configuration;
    use mockall::Sequence;
    use mockall::predicate::eq;

    fn sink() -> ActivationSink {
        ActivationSink::new(|_| {})
    }

    #[test]
    fn test_show_hide_idempotent() {
        let backend = HeadlessBackend::new(Extent::new(320, 240));
        let handle = backend.handle();
        let mut compositor = OverlayCompositor::new(Box::new(backend));

        assert_eq!(
            compositor.show(sink()),
            Ok(ShowOutcome::Created(Extent::new(320, 240)))
        );
        assert_eq!(compositor.show(sink()), Ok(ShowOutcome::AlreadyShown));
        assert_eq!(handle.live_surfaces(), 2);
        assert_eq!(handle.created(), 2);

        assert!(compositor.hide());
        assert!(!compositor.hide());
        assert_eq!(handle.live_surfaces(), 0);
        assert_eq!(handle.destroyed(), 2);
    }

    #[test]
    fn test_resize_only_while_shown() {
        let mut compositor =
            OverlayCompositor::new(Box::new(HeadlessBackend::new(Extent::new(320, 240))));

        assert!(!compositor.resize(Extent::new(240, 320)));

        compositor.show(sink()).unwrap();
        assert!(!compositor.resize(Extent::new(320, 240)));
        assert!(compositor.resize(Extent::new(240, 320)));
        assert!(!compositor.resize(Extent::new(240, 320)));
    }

    #[test]
    fn test_partial_show_is_rolled_back() {
        let mut backend = MockSurfaceBackend::new();
        let mut seq = Sequence::new();

        backend
            .expect_display_extent()
            .returning(|| Ok(Extent::new(100, 100)));
        backend
            .expect_create_surface()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(SurfaceId(1)));
        backend
            .expect_create_surface()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(SurfaceError::PermissionDenied));
        backend
            .expect_destroy_surface()
            .with(eq(SurfaceId(1)))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let mut compositor = OverlayCompositor::new(Box::new(backend));

        assert_eq!(compositor.show(sink()), Err(SurfaceError::PermissionDenied));
        assert!(!compositor.is_shown());
    }

    #[test]
    fn test_display_failure_creates_nothing() {
        let mut backend = MockSurfaceBackend::new();
        backend
            .expect_display_extent()
            .returning(|| Err(SurfaceError::DisplayUnavailable));
        backend.expect_create_surface().never();

        let mut compositor = OverlayCompositor::new(Box::new(backend));
        assert_eq!(compositor.show(sink()), Err(SurfaceError::DisplayUnavailable));
    }

    #[test]
    fn test_repaint_presents_on_indicator_only() {
        let backend = HeadlessBackend::new(Extent::new(100, 100));
        let handle = backend.handle();
        let mut compositor = OverlayCompositor::new(Box::new(backend));
        let engine = ScanEngine::new(&Configuration::default(), None, Extent::new(100, 100));

        compositor.repaint(&engine).unwrap();
        assert_eq!(handle.presented(), 0);

        compositor.show(sink()).unwrap();
        compositor.repaint(&engine).unwrap();
        assert_eq!(handle.presented(), 1);
        assert_eq!(handle.last_frame().map(|f| f.len()), Some(2));
    }

    #[test]
    fn test_set_color_applies_to_next_repaint() {
        let backend = HeadlessBackend::new(Extent::new(100, 100));
        let handle = backend.handle();
        let mut compositor = OverlayCompositor::new(Box::new(backend));
        let engine = ScanEngine::new(&Configuration::default(), None, Extent::new(100, 100));
        let green = Color::rgb(0, 0xff, 0);

        compositor.show(sink()).unwrap();
        compositor.set_color(green);
        compositor.repaint(&engine).unwrap();

        let frame = handle.last_frame().unwrap();
        match frame.commands[0] {
            DrawCommand::Rect { paint, .. } => assert_eq!(paint.color, green),
            other => panic!("Expected rect, got: {:?}", other),
        }
    }
}
