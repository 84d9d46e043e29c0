pub mod resize;
pub mod sample;
