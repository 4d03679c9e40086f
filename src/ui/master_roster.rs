// ui/master_roster.rs

use crate::{
    app::{Action, Screen},
    context::Context,
    record::{RosterEntry, filter_roster},
};
use ratatui::{
    crossterm::event::{KeyCode, KeyEvent, KeyModifiers},
    layout::{Constraint, Layout},
    prelude::{Alignment, Buffer, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::*,
};
use tui_textarea::TextArea;

use super::{Component, new_textarea, rounded_block, textarea_text};

#[derive(Debug)]
pub struct MasterRoster {
    state: ListState,
    filter: TextArea<'static>,
    filtering: bool,
}

impl Default for MasterRoster {
    fn default() -> Self {
        Self::new()
    }
}

fn entry_line(entry: &RosterEntry) -> Line<'static> {
    let sheet = &entry.sheet;
    let health = sheet.health_summary();
    let mut spans = vec![
        Span::styled(
            format!("{:<24}", sheet.display_name()),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(" Liv {:<3}", sheet.level())),
        Span::raw(format!(" PF {:>3}/{:<3}", health.current, health.max)),
        Span::styled(
            format!(" {:<20}", sheet.crew),
            Style::default().fg(Color::Cyan),
        ),
    ];
    if let Some(email) = &entry.owner_email {
        spans.push(Span::styled(email.clone(), Style::default().fg(Color::DarkGray)));
    }
    Line::from(spans)
}

impl MasterRoster {
    pub fn new() -> Self {
        let mut state = ListState::default();
        state.select(Some(0));
        Self {
            state,
            filter: new_textarea("nome o ciurma"),
            filtering: false,
        }
    }

    pub fn query(&self) -> String {
        textarea_text(&self.filter)
    }

    fn visible<'a>(&self, context: &Context<'a>) -> Vec<&'a RosterEntry> {
        filter_roster(context.roster, &self.query())
    }

    fn step(&mut self, forward: bool, len: usize) {
        if len == 0 {
            self.state.select(None);
            return;
        }
        let current = self.state.selected().unwrap_or(0).min(len - 1);
        let next = match (forward, current) {
            (true, i) if i + 1 < len => i + 1,
            (true, _) => 0,
            (false, 0) => len - 1,
            (false, i) => i - 1,
        };
        self.state.select(Some(next));
    }

    fn open(&self, context: &Context, screen: Screen) -> Option<Action> {
        let visible = self.visible(context);
        let index = self.state.selected()?;
        let owner_id = visible.get(index)?.sheet.user_id.clone()?;
        Some(Action::OpenSheet { owner_id, screen })
    }
}

impl Component for MasterRoster {
    fn on_key(&mut self, key: KeyEvent, context: &Context) -> Option<Action> {
        if self.filtering {
            match key.code {
                KeyCode::Esc | KeyCode::Enter => self.filtering = false,
                _ => {
                    self.filter.input(key);
                    self.state.select(Some(0));
                }
            }
            return None;
        }
        let len = self.visible(context).len();
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('/') => {
                self.filtering = true;
                None
            }
            KeyCode::Char('j') | KeyCode::Down => {
                self.step(true, len);
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.step(false, len);
                None
            }
            KeyCode::Char('e') if ctrl => self.open(context, Screen::Edit),
            KeyCode::Enter => self.open(context, Screen::View),
            KeyCode::Char('r') if !context.busy => Some(Action::RefreshRoster),
            KeyCode::Esc | KeyCode::Char('q') => Some(Action::Navigate(Screen::Dashboard)),
            _ => None,
        }
    }

    fn on_paste(&mut self, text: &str, _context: &Context) -> Option<Action> {
        if self.filtering {
            self.filter.insert_str(text.trim());
        }
        None
    }

    fn render(&mut self, area: Rect, buffer: &mut Buffer, context: &Context) {
        let [filter_area, list_area, help] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .areas(area);

        self.filter
            .set_block(rounded_block("Filtro (/)", self.filtering));
        self.filter.render(filter_area, buffer);

        let visible = self.visible(context);
        if visible.is_empty() {
            let text = if context.busy {
                "Caricamento delle schede..."
            } else if context.roster.is_empty() {
                "Nessuna scheda registrata"
            } else {
                "Nessuna scheda corrisponde al filtro"
            };
            Paragraph::new(text)
                .alignment(Alignment::Center)
                .block(rounded_block("Ciurma", !self.filtering))
                .render(list_area, buffer);
        } else {
            if self.state.selected().is_none_or(|i| i >= visible.len()) {
                self.state.select(Some(0));
            }
            let title = format!("Ciurma · {} di {}", visible.len(), context.roster.len());
            let list = List::new(visible.into_iter().map(entry_line).map(ListItem::new))
                .block(rounded_block(&title, !self.filtering))
                .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
                .highlight_symbol("> ");
            StatefulWidget::render(list, list_area, buffer, &mut self.state);
        }

        Paragraph::new("/ filtra · Invio apri · Ctrl+e modifica · r aggiorna · Esc indietro")
            .style(Style::default().fg(Color::Gray))
            .alignment(Alignment::Center)
            .render(help, buffer);
    }
}
