pub mod engine;
pub mod shape;
