pub mod common;
pub mod material;
