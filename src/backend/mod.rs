/// Backend implementations
///
/// This module contains the display-server trait and its implementations:
/// the built-in wire codec, an optional `x11rb` transport, and an in-memory
/// mock used by tests.

mod r#trait;
pub use r#trait::*;

pub mod mock;
pub mod wire;

#[cfg(all(feature = "backend-x11rb", target_family = "unix"))]
pub mod x11rb;

/// Get available backend names (features enabled + platform compatible)
#[allow(unused_mut)] // mut needed when features are enabled
pub fn available_backends() -> Vec<&'static str> {
    let mut backends = vec!["wire"];

    // x11rb backend is available on Unix systems when feature is enabled
    #[cfg(all(feature = "backend-x11rb", target_family = "unix"))]
    backends.push("x11rb");

    backends
}
