#![deny(rust_2018_idioms)]

#[macro_use]
extern crate anyhow;

#[macro_use]
extern crate log;

#[cfg(test)]
pub mod test_utils;

pub mod error;
pub mod hash;
pub mod helper;
pub mod obj;
pub mod odb;
pub mod refs;
pub mod remote;
pub mod repo;
pub mod session;
pub mod signature;
pub mod transfer;
