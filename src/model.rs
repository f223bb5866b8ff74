pub mod fs;
pub mod oss;
