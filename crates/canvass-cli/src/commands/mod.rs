pub mod interview;
pub mod synthesize;
