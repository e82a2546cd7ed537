pub mod init;
pub mod proxy;
pub mod search;
