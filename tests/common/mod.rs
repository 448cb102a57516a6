#[cfg(test)]
#[allow(dead_code)]
pub mod test_data;
pub use test_data::*;
