pub mod g7xx;
pub mod h264;
pub mod opus;
pub mod vp8;
