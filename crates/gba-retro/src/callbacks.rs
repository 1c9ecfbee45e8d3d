//! Host capability slots
//!
//! A host grants the session capabilities by installing closures. Every slot
//! is optional; an empty slot degrades to a safe default instead of failing.
//! Video and audio fall back to discard sinks, input reads as released, and
//! environment queries report unsupported.

use crate::input::{DeviceClass, InputDescriptor, JoypadButton};
use crate::log::HostLogLevel;
use crate::machine::FrameRef;

/// Pixel layouts a host can be asked to accept.
///
/// The session always offers [`PixelFormat::Xrgb8888`] and renders in that
/// format whether or not the host accepts the offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Xrgb1555,
    Rgb565,
    Xrgb8888,
}

/// Negotiation requests the session sends through the environment slot.
#[derive(Debug, Clone, Copy)]
pub enum EnvironmentQuery<'a> {
    /// Ask the host to accept a pixel layout for all future frames.
    SetPixelFormat(PixelFormat),
    /// Publish the controller layout so the host can label its bindings.
    SetInputDescriptors(&'a [InputDescriptor]),
}

type EnvironmentFn = dyn FnMut(EnvironmentQuery<'_>) -> bool;
type VideoRefreshFn = dyn FnMut(FrameRef<'_>);
type AudioSampleFn = dyn FnMut(i16, i16);
type InputPollFn = dyn FnMut();
type InputStateFn = dyn FnMut(u32, DeviceClass, u32, JoypadButton) -> bool;
type LogFn = dyn FnMut(HostLogLevel, &str);

/// The set of capabilities a host has granted.
///
/// Slots are write-only from the host's side. Installing a capability twice
/// replaces the earlier closure.
#[derive(Default)]
pub struct Callbacks {
    environment: Option<Box<EnvironmentFn>>,
    video_refresh: Option<Box<VideoRefreshFn>>,
    audio_sample: Option<Box<AudioSampleFn>>,
    input_poll: Option<Box<InputPollFn>>,
    input_state: Option<Box<InputStateFn>>,
    log: Option<Box<LogFn>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the environment capability. The closure returns whether the
    /// host supports the query it was handed.
    pub fn set_environment(&mut self, f: impl FnMut(EnvironmentQuery<'_>) -> bool + 'static) {
        self.environment = Some(Box::new(f));
    }

    /// Install the video sink. It receives exactly one frame per driven
    /// frame.
    pub fn set_video_refresh(&mut self, f: impl FnMut(FrameRef<'_>) + 'static) {
        self.video_refresh = Some(Box::new(f));
    }

    /// Install the audio sink. It receives one stereo pair per generated
    /// sample, interleaved left then right.
    pub fn set_audio_sample(&mut self, f: impl FnMut(i16, i16) + 'static) {
        self.audio_sample = Some(Box::new(f));
    }

    /// Install the input poll hook, called once at the top of every frame
    /// before any button is read.
    pub fn set_input_poll(&mut self, f: impl FnMut() + 'static) {
        self.input_poll = Some(Box::new(f));
    }

    /// Install the input query. It answers whether one button on one device
    /// is currently held.
    pub fn set_input_state(
        &mut self,
        f: impl FnMut(u32, DeviceClass, u32, JoypadButton) -> bool + 'static,
    ) {
        self.input_state = Some(Box::new(f));
    }

    /// Install the log sink. Messages arrive already leveled and truncated.
    pub fn set_log(&mut self, f: impl FnMut(HostLogLevel, &str) + 'static) {
        self.log = Some(Box::new(f));
    }

    /// Send a query to the host. `None` means no environment capability is
    /// installed, `Some(supported)` is the host's answer.
    pub(crate) fn environment(&mut self, query: EnvironmentQuery<'_>) -> Option<bool> {
        self.environment.as_mut().map(|f| f(query))
    }

    pub(crate) fn video_refresh(&mut self, frame: FrameRef<'_>) {
        if let Some(f) = self.video_refresh.as_mut() {
            f(frame);
        }
    }

    pub(crate) fn audio_sample(&mut self, left: i16, right: i16) {
        if let Some(f) = self.audio_sample.as_mut() {
            f(left, right);
        }
    }

    pub(crate) fn input_poll(&mut self) {
        if let Some(f) = self.input_poll.as_mut() {
            f();
        }
    }

    /// Unbound input reads as released.
    pub(crate) fn input_state(
        &mut self,
        port: u32,
        device: DeviceClass,
        index: u32,
        button: JoypadButton,
    ) -> bool {
        self.input_state
            .as_mut()
            .map_or(false, |f| f(port, device, index, button))
    }

    /// Whether a log sink is installed. Callers check this before paying for
    /// message formatting.
    pub(crate) fn wants_log(&self) -> bool {
        self.log.is_some()
    }

    pub(crate) fn log_line(&mut self, level: HostLogLevel, message: &str) {
        if let Some(f) = self.log.as_mut() {
            f(level, message);
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("environment", &self.environment.is_some())
            .field("video_refresh", &self.video_refresh.is_some())
            .field("audio_sample", &self.audio_sample.is_some())
            .field("input_poll", &self.input_poll.is_some())
            .field("input_state", &self.input_state.is_some())
            .field("log", &self.log.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_empty_slots_degrade_to_defaults() {
        let mut callbacks = Callbacks::new();
        assert_eq!(
            callbacks.environment(EnvironmentQuery::SetPixelFormat(PixelFormat::Xrgb8888)),
            None
        );
        assert!(!callbacks.input_state(0, DeviceClass::Joypad, 0, JoypadButton::A));
        assert!(!callbacks.wants_log());
        // Discard sinks must not panic.
        callbacks.audio_sample(0, 0);
        callbacks.input_poll();
        callbacks.log_line(HostLogLevel::Info, "dropped");
    }

    #[test]
    fn test_environment_answer_passes_through() {
        let mut callbacks = Callbacks::new();
        callbacks.set_environment(|query| matches!(query, EnvironmentQuery::SetPixelFormat(_)));
        assert_eq!(
            callbacks.environment(EnvironmentQuery::SetPixelFormat(PixelFormat::Xrgb8888)),
            Some(true)
        );
        assert_eq!(
            callbacks.environment(EnvironmentQuery::SetInputDescriptors(&[])),
            Some(false)
        );
    }

    #[test]
    fn test_installing_twice_replaces_the_slot() {
        let hits = Rc::new(Cell::new(0u32));
        let mut callbacks = Callbacks::new();
        let first = hits.clone();
        callbacks.set_input_poll(move || first.set(first.get() + 1));
        let second = hits.clone();
        callbacks.set_input_poll(move || second.set(second.get() + 100));
        callbacks.input_poll();
        assert_eq!(hits.get(), 100);
    }

    #[test]
    fn test_audio_pairs_reach_the_sink() {
        let last = Rc::new(Cell::new((0i16, 0i16)));
        let pairs = Rc::new(Cell::new(0u32));
        let mut callbacks = Callbacks::new();
        let sink_last = last.clone();
        let sink_pairs = pairs.clone();
        callbacks.set_audio_sample(move |left, right| {
            sink_last.set((left, right));
            sink_pairs.set(sink_pairs.get() + 1);
        });
        callbacks.audio_sample(-100, 100);
        callbacks.audio_sample(7, -7);
        assert_eq!(pairs.get(), 2);
        assert_eq!(last.get(), (7, -7));
    }
}
