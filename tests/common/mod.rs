// Not every test binary exercises every helper.
#![allow(dead_code)]

pub mod mock_executor;

pub use mock_executor::*;
