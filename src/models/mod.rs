pub mod config;
pub mod item;
pub mod position;

pub use config::*;
pub use item::*;
pub use position::*;
