//! Deterministic glyph bitmap analysis and pen-route optimization.

pub mod analyzer;
pub mod route;

pub use analyzer::{bounds, foreground_pixels, leftmost_set_bit, rightmost_set_bit, GlyphBounds};
pub use route::{RouteCostModel, RouteOptimizer, RoutePoint};
