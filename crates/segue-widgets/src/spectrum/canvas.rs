//! Canvas Program for spectrum bar rendering
//!
//! Implements the iced canvas `Program` trait for the bar spectrum. Pure
//! rendering: the bars are computed by `SpectrumState::update` on the
//! session's frame tick, this program only paints the latest frame plus
//! the amplitude/frequency gridlines.

use iced::widget::canvas::{self, Frame, Geometry, Path, Program, Stroke};
use iced::{mouse, Color, Point, Rectangle, Theme};

use super::state::{
    decibels_to_y, frequency_to_x, SpectrumState, AMPLITUDE_GRID_DECIBELS, FREQUENCY_GRID_HZ,
};

const LABEL_COLOR: Color = Color {
    r: 1.0,
    g: 1.0,
    b: 1.0,
    a: 0.7,
};

const GRID_COLOR: Color = Color {
    r: 1.0,
    g: 1.0,
    b: 1.0,
    a: 0.3,
};

/// Canvas program painting the current spectrum frame
pub struct SpectrumCanvas<'a> {
    pub state: &'a SpectrumState,
}

impl<Message> Program<Message> for SpectrumCanvas<'_> {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &iced::Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        let width = bounds.width;
        let height = bounds.height;

        // Background
        frame.fill_rectangle(
            Point::ORIGIN,
            bounds.size(),
            Color::from_rgb(0.05, 0.05, 0.07),
        );

        // Bars grow upward from the bottom edge
        for bar in self.state.bars() {
            frame.fill_rectangle(
                Point::new(bar.x, height - bar.height),
                iced::Size::new(bar.width, bar.height),
                bar.color,
            );
        }

        // Amplitude gridlines with dB labels along the left edge
        let min_db = self.state.min_decibels();
        let max_db = self.state.max_decibels();
        for &db in &AMPLITUDE_GRID_DECIBELS {
            let y = decibels_to_y(db, min_db, max_db, height);
            frame.stroke(
                &Path::line(Point::new(0.0, y), Point::new(15.0, y)),
                Stroke::default().with_color(GRID_COLOR).with_width(1.0),
            );
            frame.fill_text(canvas::Text {
                content: format!("{db:.0} dB"),
                position: Point::new(22.0, y - 6.0),
                color: LABEL_COLOR,
                size: 12.0.into(),
                ..canvas::Text::default()
            });
        }

        // Frequency gridlines with Hz labels along the top edge
        let nyquist = self.state.nyquist();
        for &freq in &FREQUENCY_GRID_HZ {
            if freq > nyquist {
                continue;
            }
            let x = frequency_to_x(freq, nyquist, width);
            frame.stroke(
                &Path::line(Point::new(x, 0.0), Point::new(x, 15.0)),
                Stroke::default().with_color(GRID_COLOR).with_width(1.0),
            );
            let label = if freq >= 1_000.0 {
                format!("{}k Hz", freq / 1_000.0)
            } else {
                format!("{freq:.0} Hz")
            };
            frame.fill_text(canvas::Text {
                content: label,
                position: Point::new(x - 12.0, 17.0),
                color: LABEL_COLOR,
                size: 12.0.into(),
                ..canvas::Text::default()
            });
        }

        vec![frame.into_geometry()]
    }
}
