//! Shared UI widgets for the Segue player
//!
//! Following idiomatic iced patterns:
//!
//! - **State structs**: Pure data (`SpectrumState`, `Viewport`)
//! - **View functions**: Take state, return `Element<Message>`
//! - **Canvas Programs**: Handle the custom rendering
//!
//! The spectrum view renders a bar spectrum of the shared mixer output,
//! driven once per display frame by `SpectrumSession::tick`.

pub mod spectrum;

// Re-export commonly used items
pub use spectrum::{
    spectrum_view, RenderedBar, SpectrumCanvas, SpectrumSession, SpectrumState, Viewport,
};
