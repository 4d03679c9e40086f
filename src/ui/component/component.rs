use enum_dispatch::enum_dispatch;
use ratatui::{buffer::Buffer, crossterm::event::KeyEvent, layout::Rect};
use std::fmt::Debug;
use std::time::Instant;

use crate::ui::{AuthMenu, Dashboard, MasterRoster, SheetEditor, SheetView};
use crate::{app::Action, character::CharacterSheet, context::Context};

#[enum_dispatch]
pub trait Component: Debug {
    fn on_key(&mut self, key: KeyEvent, context: &Context) -> Option<Action>;

    fn render(&mut self, area: Rect, buffer: &mut Buffer, context: &Context);

    // Called on every tick; pending edits are flushed from here.
    fn on_tick(&mut self, _now: Instant) -> Option<Action> {
        None
    }

    fn on_paste(&mut self, _text: &str, _context: &Context) -> Option<Action> {
        None
    }

    // The canonical sheet changed underneath the component.
    fn on_sheet(&mut self, _sheet: &CharacterSheet) {}
}

#[enum_dispatch(Component)]
#[derive(Debug)]
pub enum ComponentEnum {
    AuthMenu,
    Dashboard,
    SheetEditor,
    SheetView,
    MasterRoster,
}
