pub mod fletcher;
pub mod table;

pub use fletcher::{do_fletcher4, Checksummer, Fletcher4, BLOCK_SIZE, CHECKSUM_SIZE};
