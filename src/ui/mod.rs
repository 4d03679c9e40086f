// ui/mod.rs

mod auth_menu;
mod component;
mod dashboard;
pub mod fields;
mod master_roster;
mod sheet_editor;
mod sheet_view;
pub mod status;
pub mod widgets;

pub use auth_menu::AuthMenu;
pub use component::{Component, ComponentEnum};
pub use dashboard::Dashboard;
pub use master_roster::MasterRoster;
pub use sheet_editor::SheetEditor;
pub use sheet_view::SheetView;

use ratatui::{
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, BorderType, Borders},
};
use tui_textarea::TextArea;

pub const MIN_WIDTH: u16 = 80;
pub const MIN_HEIGHT: u16 = 24;

pub fn center_rect(area: Rect, horizontal: Constraint, vertical: Constraint) -> Rect {
    let [area] = Layout::horizontal([horizontal])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::vertical([vertical]).flex(Flex::Center).areas(area);
    area
}

pub fn new_textarea(placeholder: impl Into<String>) -> TextArea<'static> {
    let mut textarea = TextArea::default();
    textarea.set_placeholder_text(placeholder);
    textarea.set_cursor_line_style(Style::default());
    textarea.set_placeholder_style(Style::default().fg(Color::DarkGray));
    textarea
}

pub fn new_textarea_with_text(text: &str, placeholder: impl Into<String>) -> TextArea<'static> {
    let mut textarea = TextArea::new(vec![text.to_string()]);
    textarea.set_placeholder_text(placeholder);
    textarea.set_cursor_line_style(Style::default());
    textarea.set_placeholder_style(Style::default().fg(Color::DarkGray));
    textarea.move_cursor(tui_textarea::CursorMove::End);
    textarea
}

pub fn rounded_block(title: &str, focused: bool) -> Block<'static> {
    let color = if focused { Color::Yellow } else { Color::DarkGray };
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(color))
        .title(format!(" {} ", title))
}

/// Joined text of a single-line input.
pub fn textarea_text(textarea: &TextArea<'_>) -> String {
    textarea.lines().join(" ")
}
