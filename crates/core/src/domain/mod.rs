pub mod batch;
pub mod market;
pub mod order;
