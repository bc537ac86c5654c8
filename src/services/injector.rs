use crate::models::Point;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InjectionError {
    #[error("Not allowed to inject input events")]
    PermissionDenied,

    #[error("Input injection is not available: {0}")]
    Unavailable(String),

    #[error("Tap at ({x}, {y}) failed: {reason}")]
    Failed { x: i32, y: i32, reason: String },
}

/// Synthesizes a tap (press then release) at a screen point.
///
/// Implementations may block; [`ClickInjector`] always calls them from a
/// blocking worker thread.
#[cfg_attr(test, mockall::automock)]
pub trait TapInjector: Send + Sync {
    fn tap(&self, x: i32, y: i32) -> Result<(), InjectionError>;
}

/// Injector that only logs. Used when no input backend is compiled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingInjector;

impl TapInjector for LoggingInjector {
    fn tap(&self, x: i32, y: i32) -> Result<(), InjectionError> {
        tracing::info!("Tap at ({}, {})", x, y);
        Ok(())
    }
}

/// Pointer injection through enigo.
#[cfg(feature = "enigo")]
#[derive(Debug, Default, Clone, Copy)]
pub struct EnigoInjector;

#[cfg(feature = "enigo")]
impl TapInjector for EnigoInjector {
    fn tap(&self, x: i32, y: i32) -> Result<(), InjectionError> {
        use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};

        // A fresh connection per tap; taps are rare and Enigo is not Send everywhere.
        let mut enigo = Enigo::new(&Settings::default())
            .map_err(|e| InjectionError::Unavailable(e.to_string()))?;
        let failed = |e: enigo::InputError| InjectionError::Failed {
            x,
            y,
            reason: e.to_string(),
        };

        enigo.move_mouse(x, y, Coordinate::Abs).map_err(failed)?;
        enigo.button(Button::Left, Direction::Press).map_err(failed)?;
        enigo.button(Button::Left, Direction::Release).map_err(failed)?;
        Ok(())
    }
}

/// Runs taps off the host task.
#[derive(Clone)]
pub struct ClickInjector {
    injector: Arc<dyn TapInjector>,
    runtime: Handle,
}

impl ClickInjector {
    pub fn new(injector: Arc<dyn TapInjector>, runtime: Handle) -> Self {
        Self { injector, runtime }
    }

    /// Tap at `point` on a blocking worker and hand the result to `on_complete`.
    ///
    /// Returns immediately. `on_complete` runs on a runtime task once the
    /// worker finishes; a panicking injector is reported as
    /// [`InjectionError::Failed`].
    pub fn inject<F>(&self, point: Point, on_complete: F)
    where
        F: FnOnce(Result<(), InjectionError>) + Send + 'static,
    {
        let injector = Arc::clone(&self.injector);
        tracing::debug!("Injecting tap at ({}, {})", point.x, point.y);

        let worker = self.runtime.spawn_blocking(move || injector.tap(point.x, point.y));
        self.runtime.spawn(async move {
            let result = match worker.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!("Tap worker at ({}, {}) died: {}", point.x, point.y, e);
                    Err(InjectionError::Failed {
                        x: point.x,
                        y: point.y,
                        reason: e.to_string(),
                    })
                }
            };
            on_complete(result);
        });
    }
}
