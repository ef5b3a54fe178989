//! Shared output graph
//!
//! Control-side state (manager, buses, node handles) lives here; the
//! render half is driven over a lock-free command queue by whichever
//! backend owns the output (CPAL stream or offline pump).

pub mod bus;
pub mod context;
pub mod manager;
pub mod node;
pub mod render;

pub use bus::{NodeBus, MAX_IN_FLIGHT};
pub use context::{ContextHandle, OfflineRenderer, OutputBackend, OutputContext, OutputHandle};
pub use manager::{AudioGraphManager, UnbindCallback, MAKEUP_GAIN_DB};
pub use node::{DelayHandle, SampleSource, SilenceSource, SineSource, TrackGainNode};
pub use render::TapId;
