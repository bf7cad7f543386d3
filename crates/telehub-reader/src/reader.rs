use std::sync::Arc;

use telehub_frame::{CodecFacts, DecodedFrame, FrameDecoder, FrameValidator, RawFrame};

use crate::settings::{Settings, SettingsMap, SettingsReport};

/// Contract shared by every transport reader.
///
/// A reader is driven by exactly one polling loop (see
/// [`spawn_reader`](crate::spawn_reader)) and is never touched from two
/// threads at once; settings updates reach it through the loop.
pub trait Reader: Send {
    fn name(&self) -> &str;

    /// Take whatever raw frames the transport has ready. Never blocks for
    /// longer than a device handshake requires.
    fn poll_raw(&mut self) -> Vec<RawFrame>;

    /// Run one raw frame through validation and decoding.
    fn decode(&mut self, raw: &RawFrame) -> Option<DecodedFrame>;

    /// Validate and commit a candidate settings map.
    fn apply_settings(&mut self, candidate: &SettingsMap) -> SettingsReport;

    /// Currently committed generic settings.
    fn settings(&self) -> &Settings;

    /// Work due on a timer, run once per loop iteration after the sleep.
    fn periodic_action(&mut self) {}

    /// Poll and decode in one step.
    fn read(&mut self) -> Vec<DecodedFrame> {
        self.poll_raw()
            .iter()
            .filter_map(|raw| self.decode(raw))
            .collect()
    }
}

impl<R: Reader + ?Sized> Reader for Box<R> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn poll_raw(&mut self) -> Vec<RawFrame> {
        (**self).poll_raw()
    }

    fn decode(&mut self, raw: &RawFrame) -> Option<DecodedFrame> {
        (**self).decode(raw)
    }

    fn apply_settings(&mut self, candidate: &SettingsMap) -> SettingsReport {
        (**self).apply_settings(candidate)
    }

    fn settings(&self) -> &Settings {
        (**self).settings()
    }

    fn periodic_action(&mut self) {
        (**self).periodic_action()
    }

    fn read(&mut self) -> Vec<DecodedFrame> {
        (**self).read()
    }
}

/// State every reader variant carries: identity, decoder and generic settings.
pub struct ReaderCore {
    decoder: FrameDecoder,
    settings: Settings,
    defaults: Settings,
}

impl ReaderCore {
    pub fn new(name: impl Into<String>, codec: Arc<dyn CodecFacts>, defaults: Settings) -> Self {
        Self {
            decoder: FrameDecoder::new(name, codec),
            settings: defaults.clone(),
            defaults,
        }
    }

    pub fn name(&self) -> &str {
        self.decoder.reader()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn defaults(&self) -> &Settings {
        &self.defaults
    }

    pub fn decode(&mut self, raw: &RawFrame, validator: &dyn FrameValidator) -> Option<DecodedFrame> {
        let settings = self.settings.decode_settings();
        self.decoder.decode(raw, &settings, validator)
    }

    /// Apply the generic keys and report the outcome into `report`.
    pub fn apply_generic(&mut self, candidate: &SettingsMap, report: &mut SettingsReport) {
        let name = self.decoder.reader().to_string();
        self.settings
            .apply(&name, &self.defaults, candidate, report);
    }

    pub fn frames_seen(&self) -> u64 {
        self.decoder.frames_seen()
    }
}
