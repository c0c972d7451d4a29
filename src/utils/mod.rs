pub mod grid;
pub mod time;
