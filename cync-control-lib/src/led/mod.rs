// Color values and the fixed palette the ambient modes draw from.
pub mod color;
pub mod palette;

// Per-device color choice with the no-repeat / no-collision policy.
pub mod assign;

// Multi-step brightness and color ramps, one task per device.
pub mod transition;
