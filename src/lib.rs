#![crate_name = "tadsc"]

#[macro_use]
extern crate lazy_static;

pub mod tads_compiler;
