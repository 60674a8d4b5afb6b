pub mod frame;
pub mod key;
pub mod timestamp;
