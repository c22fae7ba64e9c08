pub mod parse;
pub mod proxy;
