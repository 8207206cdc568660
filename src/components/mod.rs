pub mod dialog;
pub mod editor;
pub mod palette;
pub mod status_bar;
pub mod tabs;
pub mod tree;
