//! Stand-in for camera/microphone capture. Tracks the toggles and logs them;
//! no devices are opened.

use async_trait::async_trait;
use tracing::{debug, info};

use livecall_core::application::ports::{CaptureHandle, MediaCapture};
use livecall_core::domain::call::CallId;

#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedCapture;

#[async_trait]
impl MediaCapture for SimulatedCapture {
    async fn acquire(&self, call: CallId) -> anyhow::Result<Box<dyn CaptureHandle>> {
        info!(%call, "Capture acquired");
        Ok(Box::new(SimulatedHandle {
            call,
            audio: true,
            video: true,
            released: false,
        }))
    }
}

struct SimulatedHandle {
    call: CallId,
    audio: bool,
    video: bool,
    released: bool,
}

impl SimulatedHandle {
    fn close(&mut self) {
        if !self.released {
            self.released = true;
            info!(call = %self.call, "Capture released");
        }
    }
}

impl CaptureHandle for SimulatedHandle {
    fn set_audio_enabled(&mut self, enabled: bool) {
        self.audio = enabled;
        debug!(call = %self.call, audio = self.audio, video = self.video, "Capture toggled");
    }

    fn set_video_enabled(&mut self, enabled: bool) {
        self.video = enabled;
        debug!(call = %self.call, audio = self.audio, video = self.video, "Capture toggled");
    }

    fn release(mut self: Box<Self>) {
        self.close();
    }
}

impl Drop for SimulatedHandle {
    fn drop(&mut self) {
        self.close();
    }
}
