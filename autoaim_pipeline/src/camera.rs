//! Camera worker: grab, stamp, publish.
//!
//! The SDK paces the loop, so there is no throttling here. A failed grab
//! is logged and retried; the loop only exits on the stop flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use autoaim_common::types::CameraFrame;
use autoaim_common::PipelineResult;
use autoaim_shared::SharedLatest;
use tracing::{info, warn};

/// Camera SDK contract.
///
/// `grab` blocks at the device's frame pace and fills `width`, `height`,
/// and `raw_data`. Implementations must bound the block (poll + timeout
/// inside the driver) so the worker can observe the stop flag.
pub trait CameraDriver: Send {
    /// Grab the next frame into `frame`.
    fn grab(&mut self, frame: &mut CameraFrame) -> PipelineResult<()>;
}

/// Device-paced producer for the `camera` slot.
pub struct CameraWorker<D: CameraDriver> {
    driver: D,
    shared: Arc<SharedLatest>,
    stop: Arc<AtomicBool>,
}

impl<D: CameraDriver> CameraWorker<D> {
    /// Create a worker around an opened camera driver.
    pub fn new(driver: D, shared: Arc<SharedLatest>, stop: Arc<AtomicBool>) -> Self {
        Self {
            driver,
            shared,
            stop,
        }
    }

    /// Run until the stop flag is set.
    pub fn run(&mut self) {
        while !self.stop.load(Ordering::Relaxed) {
            let mut frame = CameraFrame {
                timestamp: Instant::now(),
                width: 0,
                height: 0,
                raw_data: Vec::new(),
            };
            if let Err(e) = self.driver.grab(&mut frame) {
                warn!(error = %e, "frame grab failed, retrying");
                continue;
            }
            // Stamp on grab return, not inside the driver.
            frame.timestamp = Instant::now();
            self.shared.camera.publish(frame);
        }
        info!(
            final_version = self.shared.camera.version(),
            "camera worker stopped"
        );
    }
}
