//! Media element handles and role registry
//!
//! The playback driver owns media elements (one per audible track). The
//! pipeline tracks them by logical role (`Current` is the element driving
//! normal playback, `Outgoing` is the one being crossfaded away) and the
//! crossfade engine transfers ownership between roles atomically instead
//! of mutating element identity in place.
//!
//! A retired element is wrapped in `RetiredElement`, which intercepts
//! transport calls: the driver can keep its handle, but `pause` and
//! `set_source` become logged no-ops so nothing can race the teardown.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::graph::node::SampleSource;
use crate::types::{ElementId, Seconds};

/// Loudness metadata attached to a source by the playback driver
#[derive(Debug, Clone, Copy, Default)]
pub struct GainMetadata {
    /// Per-track normalization gain in dB, if measured
    pub track_gain_db: Option<f32>,
    /// Per-album normalization gain in dB, if measured
    pub album_gain_db: Option<f32>,
}

/// Progress queries the crossfade engine needs from a player
pub trait PlaybackProgress {
    /// Playback position in seconds
    fn position(&self) -> Seconds;
    /// Track duration in seconds, if known
    fn duration(&self) -> Option<Seconds>;
}

struct SourceState {
    url: Option<String>,
    samples: Option<Box<dyn SampleSource>>,
    duration: Option<Seconds>,
    gain: GainMetadata,
}

/// One media element: transport state plus the sample feed the graph pulls
pub struct MediaElementHandle {
    id: ElementId,
    sample_rate: u32,
    playing: Arc<AtomicBool>,
    /// Frames consumed by the render thread
    cursor: Arc<AtomicU64>,
    /// Element-level volume (0..1), only meaningful on the no-graph
    /// fallback path where there is no gain node to ramp
    volume: AtomicU32,
    removed: AtomicBool,
    source: Mutex<SourceState>,
}

impl MediaElementHandle {
    pub fn new(sample_rate: u32) -> Arc<Self> {
        Arc::new(Self {
            id: ElementId::next(),
            sample_rate,
            playing: Arc::new(AtomicBool::new(false)),
            cursor: Arc::new(AtomicU64::new(0)),
            volume: AtomicU32::new(1.0_f32.to_bits()),
            removed: AtomicBool::new(false),
            source: Mutex::new(SourceState {
                url: None,
                samples: None,
                duration: None,
                gain: GainMetadata::default(),
            }),
        })
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Begin playback
    pub fn play(&self) {
        self.playing.store(true, Ordering::Relaxed);
    }

    /// Stop playback
    pub fn pause(&self) {
        self.playing.store(false, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        !self.playing.load(Ordering::Relaxed)
    }

    /// Attach a source: url for identity, samples for the graph, metadata
    /// for normalization
    pub fn set_source(
        &self,
        url: impl Into<String>,
        samples: Box<dyn SampleSource>,
        duration: Option<Seconds>,
        gain: GainMetadata,
    ) {
        let mut state = self.source.lock().unwrap();
        state.url = Some(url.into());
        state.samples = Some(samples);
        state.duration = duration;
        state.gain = gain;
        self.cursor.store(0, Ordering::Relaxed);
    }

    pub fn has_source(&self) -> bool {
        self.source.lock().unwrap().url.is_some()
    }

    pub fn source_url(&self) -> Option<String> {
        self.source.lock().unwrap().url.clone()
    }

    pub fn gain_metadata(&self) -> GainMetadata {
        self.source.lock().unwrap().gain
    }

    /// Take the sample feed for graph wiring (leaves url/metadata behind)
    pub(crate) fn take_samples(&self) -> Option<Box<dyn SampleSource>> {
        self.source.lock().unwrap().samples.take()
    }

    pub(crate) fn playing_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.playing)
    }

    pub(crate) fn cursor(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.cursor)
    }

    /// Element-level volume for the no-graph fallback path
    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    /// Whether the element has been torn down after a crossfade
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Relaxed)
    }

    fn mark_removed(&self) {
        self.removed.store(true, Ordering::Relaxed);
        self.playing.store(false, Ordering::Relaxed);
    }
}

impl PlaybackProgress for MediaElementHandle {
    fn position(&self) -> Seconds {
        self.cursor.load(Ordering::Relaxed) as Seconds / self.sample_rate as Seconds
    }

    fn duration(&self) -> Option<Seconds> {
        self.source.lock().unwrap().duration
    }
}

/// Wrapper around an element that has been handed off for crossfade-out
///
/// Transport calls are neutralized; read-only queries still delegate.
#[derive(Clone)]
pub struct RetiredElement {
    inner: Arc<MediaElementHandle>,
}

impl RetiredElement {
    fn new(inner: Arc<MediaElementHandle>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> ElementId {
        self.inner.id()
    }

    /// Ignored: the element keeps playing until its fade-out completes
    pub fn pause(&self) {
        log::debug!("ignoring pause on retired element {}", self.inner.id());
    }

    /// Ignored: a retired element never changes tracks
    pub fn set_source(&self, _url: impl Into<String>) {
        log::debug!(
            "ignoring source change on retired element {}",
            self.inner.id()
        );
    }

    pub fn is_paused(&self) -> bool {
        self.inner.is_paused()
    }

    pub fn source_url(&self) -> Option<String> {
        self.inner.source_url()
    }

    pub fn is_removed(&self) -> bool {
        self.inner.is_removed()
    }

    /// The wrapped handle, for cleanup paths that legitimately need it
    pub fn handle(&self) -> &Arc<MediaElementHandle> {
        &self.inner
    }
}

impl PlaybackProgress for RetiredElement {
    fn position(&self) -> Seconds {
        self.inner.position()
    }

    fn duration(&self) -> Option<Seconds> {
        self.inner.duration()
    }
}

#[derive(Default)]
struct Slots {
    current: Option<Arc<MediaElementHandle>>,
    outgoing: Option<RetiredElement>,
}

/// Role registry mapping {Current, Outgoing} to element handles
///
/// The handoff from Current to Outgoing happens under one lock, so the
/// driver can never observe an element in both roles.
#[derive(Default)]
pub struct ElementRegistry {
    slots: Mutex<Slots>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly created element as Current
    ///
    /// Returns the element it displaced, if any.
    pub fn install_current(
        &self,
        element: Arc<MediaElementHandle>,
    ) -> Option<Arc<MediaElementHandle>> {
        let mut slots = self.slots.lock().unwrap();
        slots.current.replace(element)
    }

    /// The element driving normal playback, if any
    pub fn current(&self) -> Option<Arc<MediaElementHandle>> {
        self.slots.lock().unwrap().current.clone()
    }

    /// The element currently fading out, if any
    pub fn outgoing(&self) -> Option<RetiredElement> {
        self.slots.lock().unwrap().outgoing.clone()
    }

    /// Atomically move Current to Outgoing, wrapping it as retired
    ///
    /// A previous outgoing element still occupying the slot is disposed of
    /// immediately (its fade already served its purpose).
    pub fn retire_current(&self) -> Option<RetiredElement> {
        let mut slots = self.slots.lock().unwrap();
        let current = slots.current.take()?;
        if let Some(displaced) = slots.outgoing.take() {
            log::debug!(
                "disposing displaced outgoing element {}",
                displaced.id()
            );
            displaced.inner.mark_removed();
        }
        let retired = RetiredElement::new(current);
        slots.outgoing = Some(retired.clone());
        Some(retired)
    }

    /// Remove the outgoing element if it is still the one with `id`
    ///
    /// Marks the element removed so driver-held handles observe teardown.
    pub fn remove_outgoing(&self, id: ElementId) -> Option<RetiredElement> {
        let mut slots = self.slots.lock().unwrap();
        if slots.outgoing.as_ref().map(|e| e.id()) == Some(id) {
            let removed = slots.outgoing.take();
            if let Some(element) = &removed {
                element.inner.mark_removed();
            }
            removed
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::SilenceSource;

    fn element_with_source() -> Arc<MediaElementHandle> {
        let elem = MediaElementHandle::new(48_000);
        elem.set_source(
            "track://one",
            Box::new(SilenceSource),
            Some(180.0),
            GainMetadata::default(),
        );
        elem
    }

    #[test]
    fn test_transport_and_source() {
        let elem = element_with_source();
        assert!(elem.is_paused());
        elem.play();
        assert!(!elem.is_paused());
        assert!(elem.has_source());
        assert_eq!(elem.duration(), Some(180.0));
    }

    #[test]
    fn test_retire_moves_role_and_neutralizes_transport() {
        let registry = ElementRegistry::new();
        let elem = element_with_source();
        elem.play();
        registry.install_current(Arc::clone(&elem));

        let retired = registry.retire_current().expect("current must retire");
        assert!(registry.current().is_none());
        assert_eq!(registry.outgoing().map(|e| e.id()), Some(elem.id()));

        // Neutralized transport: pause and source changes are ignored
        retired.pause();
        assert!(!elem.is_paused());
        retired.set_source("track://other");
        assert_eq!(elem.source_url().as_deref(), Some("track://one"));
    }

    #[test]
    fn test_retire_disposes_displaced_outgoing() {
        let registry = ElementRegistry::new();
        let first = element_with_source();
        registry.install_current(Arc::clone(&first));
        registry.retire_current();

        let second = element_with_source();
        registry.install_current(Arc::clone(&second));
        registry.retire_current();

        assert!(first.is_removed());
        assert_eq!(registry.outgoing().map(|e| e.id()), Some(second.id()));
    }

    #[test]
    fn test_remove_outgoing_checks_identity() {
        let registry = ElementRegistry::new();
        let elem = element_with_source();
        registry.install_current(Arc::clone(&elem));
        let retired = registry.retire_current().unwrap();

        let other = ElementId::next();
        assert!(registry.remove_outgoing(other).is_none());
        assert!(registry.remove_outgoing(retired.id()).is_some());
        assert!(elem.is_removed());
        assert!(registry.outgoing().is_none());
    }
}
