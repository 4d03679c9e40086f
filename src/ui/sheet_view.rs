// ui/sheet_view.rs

use crate::{
    app::{Action, Screen},
    context::Context,
    export::SheetDocument,
};
use ratatui::{
    crossterm::event::{KeyCode, KeyEvent},
    layout::{Constraint, Layout},
    prelude::{Alignment, Buffer, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::*,
};

use super::{Component, rounded_block};

#[derive(Debug, Default)]
pub struct SheetView {
    scroll: u16,
    height: u16,
}

pub fn document_lines(document: &SheetDocument, owner: Option<&str>) -> Vec<Line<'static>> {
    let mut lines = Vec::with_capacity(document.line_count() + 2);
    if let Some(owner) = owner {
        lines.push(Line::from(vec![
            Span::styled("Giocatore: ", Style::default().fg(Color::DarkGray)),
            Span::raw(owner.to_string()),
        ]));
    }
    if let Some(url) = &document.image_url {
        lines.push(Line::from(vec![
            Span::styled("Immagine: ", Style::default().fg(Color::DarkGray)),
            Span::styled(url.clone(), Style::default().fg(Color::Blue)),
        ]));
    }
    for section in &document.sections {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            section.title.clone(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )));
        lines.extend(section.lines.iter().map(|line| Line::from(format!("  {}", line))));
    }
    lines
}

impl SheetView {
    pub fn new() -> Self {
        Self::default()
    }

    fn scroll_by(&mut self, delta: i32, total: usize) {
        let max = total.saturating_sub(self.height as usize) as i32;
        self.scroll = (self.scroll as i32 + delta).clamp(0, max.max(0)) as u16;
    }

    fn total_lines(context: &Context) -> usize {
        context
            .sheet
            .map(|sheet| SheetDocument::from_sheet(sheet).line_count() + 2)
            .unwrap_or_default()
    }
}

impl Component for SheetView {
    fn on_key(&mut self, key: KeyEvent, context: &Context) -> Option<Action> {
        let total = Self::total_lines(context);
        let page = self.height.max(1) as i32;
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.scroll_by(1, total),
            KeyCode::Char('k') | KeyCode::Up => self.scroll_by(-1, total),
            KeyCode::PageDown | KeyCode::Char(' ') => self.scroll_by(page, total),
            KeyCode::PageUp => self.scroll_by(-page, total),
            KeyCode::Char('g') | KeyCode::Home => self.scroll = 0,
            KeyCode::Char('G') | KeyCode::End => self.scroll_by(total as i32, total),
            KeyCode::Char('e') if context.can_edit_sheet() => {
                return Some(Action::Navigate(Screen::Edit));
            }
            KeyCode::Char('p') if context.sheet.is_some() => return Some(Action::ExportPdf),
            KeyCode::Esc | KeyCode::Char('q') => return Some(Action::Back),
            _ => {}
        }
        None
    }

    fn render(&mut self, area: Rect, buffer: &mut Buffer, context: &Context) {
        let [body, help] = Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).areas(area);
        self.height = body.height.saturating_sub(2);

        let Some(sheet) = context.sheet else {
            Paragraph::new("Nessuna scheda caricata")
                .alignment(Alignment::Center)
                .render(body, buffer);
            return;
        };
        let document = SheetDocument::from_sheet(sheet);
        let owner = (!context.owns_sheet())
            .then(|| {
                context
                    .roster
                    .iter()
                    .find(|entry| entry.sheet.user_id == sheet.user_id)
                    .and_then(|entry| entry.owner_email.as_deref())
            })
            .flatten();
        Paragraph::new(document_lines(&document, owner))
            .block(rounded_block(&document.title, true))
            .wrap(Wrap { trim: false })
            .scroll((self.scroll, 0))
            .render(body, buffer);

        let hint = if context.can_edit_sheet() {
            "j/k scorri · e modifica · p esporta PDF · Esc indietro"
        } else {
            "j/k scorri · p esporta PDF · Esc indietro"
        };
        Paragraph::new(hint)
            .style(Style::default().fg(Color::Gray))
            .alignment(Alignment::Center)
            .render(help, buffer);
    }
}
