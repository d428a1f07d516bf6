//! Display primitives shared by command output: tables and colors.

pub mod colors;
pub mod table;

pub use colors::{colorize_display, colorize_state, flag};
pub use table::{list_table, render_list};
