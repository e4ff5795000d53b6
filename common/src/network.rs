pub mod mode;
pub mod range;
