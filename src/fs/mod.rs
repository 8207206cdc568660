pub mod expansion;
pub mod operations;
pub mod paths;
pub mod tree;
pub mod watcher;
