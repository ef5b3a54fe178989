//! Spectrum view function
//!
//! Plain function taking state and returning an `Element`, following the
//! iced 0.14 pattern used across this crate.

use iced::widget::Canvas;
use iced::{Element, Length};

use super::canvas::SpectrumCanvas;
use super::state::SpectrumState;

/// Create a spectrum element filling its container
///
/// The view has no interactions; lifecycle is handled by the owning
/// `SpectrumSession` (mount = start, unmount = stop).
pub fn spectrum_view<Message: 'static>(state: &SpectrumState) -> Element<'_, Message> {
    Canvas::new(SpectrumCanvas { state })
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}
