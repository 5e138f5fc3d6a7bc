//! Chart pattern detectors
//!
//! Each detector is one stage of the default cascade, listed here in priority order.
//!
//! # Stages
//!
//! - **Trend**: single-direction up/down moves
//! - **Rectangle**: flat range with flat boundaries
//! - **Wedge / Triangle**: converging boundaries, see [`converging`]
//! - **Cup with handle**
//! - **Head and shoulders**: top and bottom
//! - **Round**: parabolic top and bottom

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
    ($($detector:ty),* $(,)?) => {
        $(impl $detector {
            pub fn with_defaults() -> Self { Self::default() }
        })*
    };
}

pub mod converging;
pub mod cup_handle;
pub mod head_shoulders;
pub mod rectangle;
pub mod round;
pub mod trend;

// Re-export all detectors for convenience
pub use converging::*;
pub use cup_handle::*;
pub use head_shoulders::*;
pub use rectangle::*;
pub use round::*;
pub use trend::*;

impl_with_defaults!(
    TrendDetector,
    RectangleDetector,
    WedgeDetector,
    TriangleDetector,
    CupHandleDetector,
    HeadShouldersDetector,
    RoundDetector,
);
