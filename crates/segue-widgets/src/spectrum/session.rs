//! Spectrum session lifecycle
//!
//! One session per mounted spectrum view. Starting a session taps the
//! mixer; every display frame the host calls `tick`, which refreshes the
//! bar state. When the surface is hidden the loop keeps ticking (so it
//! resumes instantly) but skips all drawing work.
//!
//! Stopping the session disconnects the tap and ends the frame loop.
//! Skipping either leaks a permanent tap on the shared mixer or leaves a
//! zombie render loop behind.

use segue_core::analyzer::{AnalyserOptions, AnalyserTap};
use segue_core::error::GraphResult;
use segue_core::graph::AudioGraphManager;

use super::state::{SpectrumState, Viewport};

/// A running spectrum visualizer session
pub struct SpectrumSession {
    analyser: AnalyserTap,
    state: SpectrumState,
    visible: bool,
    running: bool,
    frames_ticked: u64,
    frames_drawn: u64,
}

impl SpectrumSession {
    /// Tap the mixer and start the frame loop
    pub fn start(
        options: AnalyserOptions,
        graph: &AudioGraphManager,
        viewport: Viewport,
    ) -> GraphResult<Self> {
        let sample_rate = graph
            .sample_rate()
            .unwrap_or(segue_core::types::DEFAULT_SAMPLE_RATE);
        let mut analyser = AnalyserTap::new(options, sample_rate);
        analyser.connect(graph)?;

        Ok(Self {
            analyser,
            state: SpectrumState::new(viewport),
            visible: true,
            running: true,
            frames_ticked: 0,
            frames_drawn: 0,
        })
    }

    /// One animation frame; returns whether drawing work happened
    ///
    /// Hidden surfaces skip the snapshot and bar rebuild but the loop
    /// stays scheduled; stopping it entirely would add a visible stall
    /// when the surface comes back.
    pub fn tick(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.frames_ticked += 1;
        if !self.visible {
            return false;
        }
        self.state.update(&mut self.analyser);
        self.frames_drawn += 1;
        true
    }

    /// Track page/window visibility
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether the frame loop is still scheduled
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Frames the loop has ticked through, drawn or not
    pub fn frames_ticked(&self) -> u64 {
        self.frames_ticked
    }

    /// Frames that actually produced a bar rebuild
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Surface resize (window size or monitor scale change)
    pub fn resize(&mut self, logical_width: f32, logical_height: f32, scale_factor: f32) {
        self.state.resize(logical_width, logical_height, scale_factor);
    }

    /// Bar state for the canvas
    pub fn state(&self) -> &SpectrumState {
        &self.state
    }

    /// Disconnect the tap and end the frame loop
    pub fn stop(&mut self, graph: &AudioGraphManager) {
        self.analyser.disconnect(graph);
        self.running = false;
    }
}

impl Drop for SpectrumSession {
    fn drop(&mut self) {
        if self.analyser.is_connected() {
            log::warn!("spectrum session dropped without stop(): mixer tap leaked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segue_core::graph::OutputBackend;
    use std::sync::Arc;

    fn graph() -> Arc<AudioGraphManager> {
        let graph = Arc::new(AudioGraphManager::new());
        graph
            .initialize_with(OutputBackend::Offline, Box::new(|| {}))
            .unwrap();
        graph
    }

    fn session(graph: &AudioGraphManager) -> SpectrumSession {
        SpectrumSession::start(
            AnalyserOptions {
                fft_size: 1024,
                ..AnalyserOptions::default()
            },
            graph,
            Viewport::new(800.0, 400.0),
        )
        .unwrap()
    }

    #[test]
    fn test_visible_ticks_draw() {
        let graph = graph();
        let mut session = session(&graph);
        assert!(session.tick());
        assert_eq!(session.frames_ticked(), 1);
        assert_eq!(session.frames_drawn(), 1);
        assert!(!session.state().bars().is_empty());
        session.stop(&graph);
    }

    #[test]
    fn test_hidden_ticks_keep_loop_alive_without_drawing() {
        let graph = graph();
        let mut session = session(&graph);
        session.set_visible(false);

        for _ in 0..5 {
            assert!(!session.tick(), "hidden frames must not draw");
        }
        assert!(session.is_running(), "the loop stays scheduled while hidden");
        assert_eq!(session.frames_ticked(), 5);
        assert_eq!(session.frames_drawn(), 0);

        // Visibility returns: drawing resumes on the next frame
        session.set_visible(true);
        assert!(session.tick());
        assert_eq!(session.frames_drawn(), 1);
        session.stop(&graph);
    }

    #[test]
    fn test_stop_disconnects_and_ends_loop() {
        let graph = graph();
        let mut session = session(&graph);
        session.stop(&graph);
        assert!(!session.is_running());
        assert!(!session.tick());
    }

    #[test]
    fn test_start_fails_without_graph() {
        let graph = AudioGraphManager::new();
        let result = SpectrumSession::start(
            AnalyserOptions::default(),
            &graph,
            Viewport::new(800.0, 400.0),
        );
        assert!(result.is_err());
    }
}
