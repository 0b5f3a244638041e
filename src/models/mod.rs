pub mod review;
pub mod entity;
pub mod catalog;
pub mod ranking;

pub use review::*;
pub use entity::*;
pub use catalog::*;
pub use ranking::*;
