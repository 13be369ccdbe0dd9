pub mod achievement;
pub mod batch;
pub mod eco;
