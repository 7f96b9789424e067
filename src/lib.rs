//! Workspace facade crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates. Host applications can depend on `picturetales-workspace`
//! and enable the documented features without wiring each crate individually:
//!
//! - `desktop-shims` (default): pulls in `core-narration` together with the
//!   reqwest-backed narration service adapter from `bridge-desktop`.
//!
//! Hosts that provide their own bridge implementations (for example a
//! WebAssembly build wiring the Web Audio API) should depend on the member
//! crates directly instead.

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;
#[cfg(feature = "desktop-shims")]
pub use core_narration;
