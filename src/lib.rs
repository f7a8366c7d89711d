//! Keeps track of writing projects. A project has a goal and a due date, squirrel counts the
//! tracked files every time it's asked to and keeps a per-day history of the counts next to the
//! project.

pub mod cli;
pub mod counting;
pub mod fs;
pub mod store;
pub mod tracker;
pub mod utils;
