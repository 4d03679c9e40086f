// ui/dashboard.rs

use crate::{
    app::{Action, Screen},
    context::Context,
    session::Identity,
};
use ratatui::{
    crossterm::event::{KeyCode, KeyEvent},
    layout::{Constraint, Layout},
    prelude::{Alignment, Buffer, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::*,
};

use super::{Component, center_rect, rounded_block, widgets::StatefulList};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Sheet,
    View,
    Master,
    SignOut,
    Quit,
}

impl MenuItem {
    pub fn for_identity(identity: Option<&Identity>) -> Vec<MenuItem> {
        let mut items = vec![MenuItem::Sheet, MenuItem::View];
        if identity.is_some_and(Identity::is_master) {
            items.push(MenuItem::Master);
        }
        items.extend([MenuItem::SignOut, MenuItem::Quit]);
        items
    }

    fn label(self, has_sheet: bool) -> &'static str {
        match self {
            MenuItem::Sheet if has_sheet => "Modifica scheda",
            MenuItem::Sheet => "Crea scheda",
            MenuItem::View => "Visualizza scheda",
            MenuItem::Master => "Schede della ciurma (Master)",
            MenuItem::SignOut => "Esci dall'account",
            MenuItem::Quit => "Chiudi",
        }
    }
}

#[derive(Debug)]
pub struct Dashboard {
    menu: StatefulList<MenuItem>,
}

impl Dashboard {
    pub fn new(identity: Option<&Identity>) -> Self {
        Self {
            menu: StatefulList::with_items(MenuItem::for_identity(identity)),
        }
    }

    fn activate(&self, item: MenuItem, context: &Context) -> Option<Action> {
        match item {
            MenuItem::Sheet if context.owns_sheet() => Some(Action::Navigate(Screen::Edit)),
            MenuItem::Sheet => Some(Action::CreateSheet),
            MenuItem::View if context.owns_sheet() => Some(Action::Navigate(Screen::View)),
            MenuItem::View => None,
            MenuItem::Master => Some(Action::Navigate(Screen::Master)),
            MenuItem::SignOut => Some(Action::SignOut),
            MenuItem::Quit => Some(Action::Quit),
        }
    }

    fn summary_lines(context: &Context) -> Vec<Line<'static>> {
        let Some(sheet) = context.sheet.filter(|_| context.owns_sheet()) else {
            let text = if context.busy {
                "Caricamento della scheda..."
            } else {
                "Nessuna scheda: creane una per iniziare il viaggio."
            };
            return vec![Line::from(text.italic())];
        };
        let health = sheet.health_summary();
        let label = Style::default().fg(Color::DarkGray);
        let mut lines = vec![
            Line::from(Span::styled(
                sheet.display_name().to_string(),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )),
            Line::from(vec![
                Span::styled("Livello: ", label),
                Span::raw(sheet.level().to_string()),
                Span::styled("  Ciurma: ", label),
                Span::raw(sheet.crew.clone()),
            ]),
            Line::from(vec![
                Span::styled("PF: ", label),
                Span::raw(format!("{}/{}", health.current, health.max)),
                Span::styled("  Ferite: ", label),
                Span::raw(health.wound_tier.label()),
            ]),
        ];
        if health.penalty.is_active() {
            lines.push(Line::from(Span::styled(
                format!("Malus temporaneo: AGI {} · RES {}", health.penalty.agi, health.penalty.res),
                Style::default().fg(Color::Red),
            )));
        }
        lines
    }
}

impl Component for Dashboard {
    fn on_key(&mut self, key: KeyEvent, context: &Context) -> Option<Action> {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.menu.next();
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.menu.previous();
                None
            }
            KeyCode::Enter => self
                .menu
                .selected()
                .copied()
                .and_then(|item| self.activate(item, context)),
            KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
            _ => None,
        }
    }

    fn render(&mut self, area: Rect, buffer: &mut Buffer, context: &Context) {
        let centered = center_rect(area, Constraint::Percentage(70), Constraint::Length(20));
        let [header, summary, menu, help] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(7),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .areas(centered);

        Paragraph::new(format!("Log Pose v{}", env!("CARGO_PKG_VERSION")))
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .render(header, buffer);

        Paragraph::new(Self::summary_lines(context))
            .block(rounded_block("La tua scheda", false))
            .wrap(Wrap { trim: true })
            .render(summary, buffer);

        let has_sheet = context.owns_sheet();
        let items: Vec<ListItem> = self
            .menu
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let style = match item {
                    MenuItem::View if !has_sheet => Style::default().fg(Color::DarkGray),
                    _ => Style::default(),
                };
                ListItem::new(format!("{}. {}", i + 1, item.label(has_sheet))).style(style)
            })
            .collect();
        let list = List::new(items)
            .block(rounded_block("Menu", true))
            .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .highlight_symbol("> ");
        StatefulWidget::render(list, menu, buffer, &mut self.menu.state);

        Paragraph::new("j/k muovi · Invio seleziona · q esci")
            .style(Style::default().fg(Color::Gray))
            .alignment(Alignment::Center)
            .render(help, buffer);
    }
}
