//! File primitives shared by the stores. Every store operation is a whole-file
//! read-modify-write, so these helpers only deal with complete contents.

pub mod operations;
