pub mod hardware;
pub mod hash;
