//! Catppuccin Mocha colors shared by the widgets.

use ratatui::style::Color;

pub const TEXT: Color = Color::Rgb(205, 214, 244);
pub const BASE: Color = Color::Rgb(30, 30, 46);
pub const SURFACE0: Color = Color::Rgb(49, 50, 68);
pub const SURFACE1: Color = Color::Rgb(69, 71, 90);
pub const SURFACE2: Color = Color::Rgb(88, 91, 112);
pub const OVERLAY0: Color = Color::Rgb(108, 112, 134);
pub const BLUE: Color = Color::Rgb(137, 180, 250);
pub const RED: Color = Color::Rgb(243, 139, 168);
pub const YELLOW: Color = Color::Rgb(249, 226, 175);
pub const GREEN: Color = Color::Rgb(166, 227, 161);
pub const MAUVE: Color = Color::Rgb(203, 166, 247);
pub const PEACH: Color = Color::Rgb(250, 179, 135);
