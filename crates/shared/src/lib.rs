pub mod boundary;
pub mod domain;
pub mod error;
pub mod protocol;
