// ui/sheet_editor.rs

use crate::{
    app::{Action, Screen},
    character::{CharacterSheet, HealthSummary},
    context::Context,
    pending::EditBuffer,
};
use ratatui::{
    crossterm::event::{KeyCode, KeyEvent, KeyModifiers},
    layout::{Constraint, Layout},
    prelude::{Alignment, Buffer, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::*,
};
use std::time::{Duration, Instant};
use tui_textarea::TextArea;

use super::{
    Component, fields::Field, new_textarea, new_textarea_with_text, rounded_block,
    textarea_text, widgets::StatefulList,
};

#[derive(Debug)]
struct Editing {
    field: Field,
    textarea: TextArea<'static>,
    error: Option<String>,
}

impl Editing {
    fn text(&self) -> String {
        if self.field.commits_on_blur() {
            self.textarea.lines().join("\n")
        } else {
            textarea_text(&self.textarea)
        }
    }
}

#[derive(Debug)]
pub struct SheetEditor {
    buffer: EditBuffer<CharacterSheet>,
    fields: StatefulList<Field>,
    editing: Option<Editing>,
    avatar_prompt: Option<TextArea<'static>>,
}

impl SheetEditor {
    pub fn new(sheet: CharacterSheet, debounce: Duration) -> Self {
        Self {
            buffer: EditBuffer::new(sheet, debounce),
            fields: StatefulList::with_items(Field::all()),
            editing: None,
            avatar_prompt: None,
        }
    }

    pub fn sheet(&self) -> &CharacterSheet {
        self.buffer.value()
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    fn begin_edit(&mut self) {
        let Some(&field) = self.fields.selected() else {
            return;
        };
        let current = field.read(self.buffer.value());
        let mut textarea = if field.commits_on_blur() {
            new_textarea("una voce per riga, Esc per importare")
        } else {
            new_textarea_with_text(&current, field.label())
        };
        textarea.set_block(rounded_block(&field.label(), true));
        self.buffer.focus();
        self.editing = Some(Editing {
            field,
            textarea,
            error: None,
        });
    }

    // Writes the textarea back into the local copy.
    fn write_back(&mut self, now: Instant) {
        let Some(editing) = self.editing.as_mut() else {
            return;
        };
        let text = editing.text();
        let field = editing.field;
        let mut outcome = Ok(());
        self.buffer.edit(now, |sheet| outcome = field.write(sheet, &text));
        editing.error = outcome.err();
    }

    fn end_edit(&mut self) -> Option<Action> {
        let editing = self.editing.as_ref()?;
        if editing.field.commits_on_blur() {
            self.write_back(Instant::now());
        }
        if let Some(Editing {
            error: Some(error),
            field,
            ..
        }) = self.editing.take()
        {
            log::debug!("Leaving {:?} with an invalid value: {}", field, error);
        }
        self.buffer.blur().map(Action::UpdateSheet)
    }

    fn on_edit_key(&mut self, key: KeyEvent) -> Option<Action> {
        let multiline = self
            .editing
            .as_ref()
            .is_some_and(|editing| editing.field.commits_on_blur());
        match key.code {
            KeyCode::Esc | KeyCode::Tab => self.end_edit(),
            KeyCode::Enter if !multiline => self.end_edit(),
            _ => {
                let editing = self.editing.as_mut()?;
                editing.textarea.input(key);
                if !multiline {
                    self.write_back(Instant::now());
                }
                None
            }
        }
    }

    fn on_avatar_key(&mut self, key: KeyEvent) -> Option<Action> {
        let prompt = self.avatar_prompt.as_mut()?;
        match key.code {
            KeyCode::Esc => {
                self.avatar_prompt = None;
                None
            }
            KeyCode::Enter => {
                let source = textarea_text(prompt).trim().to_string();
                self.avatar_prompt = None;
                (!source.is_empty()).then_some(Action::UploadAvatar(source))
            }
            _ => {
                prompt.input(key);
                None
            }
        }
    }

    // Moves the selection to the first field of the next or previous section.
    fn jump_section(&mut self, forward: bool) {
        let Some(i) = self.fields.state.selected() else {
            return;
        };
        let items = &self.fields.items;
        let section = items[i].section();
        let target = if forward {
            items.iter().skip(i).position(|f| f.section() != section).map(|p| p + i)
        } else {
            let start = items[..i].iter().rposition(|f| f.section() != section);
            start.map(|end| {
                let prev = items[end].section();
                items[..=end]
                    .iter()
                    .rposition(|f| f.section() != prev)
                    .map_or(0, |p| p + 1)
            })
        };
        if let Some(target) = target {
            self.fields.state.select(Some(target));
        }
    }

    fn health_lines(summary: &HealthSummary) -> Vec<Line<'static>> {
        let label = Style::default().fg(Color::DarkGray);
        let mut lines = vec![
            Line::from(vec![
                Span::styled("PF: ", label),
                Span::styled(
                    format!("{}/{}", summary.current, summary.max),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled("  Danni: ", label),
                Span::raw(summary.total_damage.to_string()),
            ]),
            Line::from(vec![
                Span::styled("Ferite: ", label),
                Span::raw(summary.wound_tier.label()),
            ]),
        ];
        if summary.penalty.is_active() {
            lines.push(Line::from(Span::styled(
                format!(
                    "Malus temporaneo AGI {} · RES {}",
                    summary.penalty.agi, summary.penalty.res
                ),
                Style::default().fg(Color::Red),
            )));
        }
        lines
    }

    fn render_health(&self, area: Rect, buffer: &mut Buffer) {
        let summary = self.buffer.value().health_summary();
        let [table_area, footer] =
            Layout::vertical([Constraint::Length(9), Constraint::Min(3)]).areas(area);

        let header = Row::new(["Livello", "Base", "Bonus", "Danni", "Tot"])
            .style(Style::default().fg(Color::Cyan));
        let rows = summary.rows.iter().map(|row| {
            let style = if row.tier == summary.wound_tier && summary.total_damage > 0 {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };
            Row::new([
                row.tier.label(),
                row.base_shown.to_string(),
                row.bonus.to_string(),
                row.damage.to_string(),
                row.total.to_string(),
            ])
            .style(style)
        });
        Widget::render(
            Table::new(
                rows,
                [
                    Constraint::Min(16),
                    Constraint::Length(5),
                    Constraint::Length(6),
                    Constraint::Length(6),
                    Constraint::Length(4),
                ],
            )
            .header(header)
            .block(rounded_block("Livelli di Salute", false)),
            table_area,
            buffer,
        );

        Paragraph::new(Self::health_lines(&summary))
            .wrap(Wrap { trim: true })
            .block(rounded_block("Stato", false))
            .render(footer, buffer);
    }
}

impl Component for SheetEditor {
    fn on_key(&mut self, key: KeyEvent, context: &Context) -> Option<Action> {
        if self.editing.is_some() {
            return self.on_edit_key(key);
        }
        if self.avatar_prompt.is_some() {
            return self.on_avatar_key(key);
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('s') if ctrl => Some(Action::SaveSheet),
            KeyCode::Char('j') | KeyCode::Down => {
                self.fields.next();
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.fields.previous();
                None
            }
            KeyCode::PageDown | KeyCode::Char('J') => {
                self.jump_section(true);
                None
            }
            KeyCode::PageUp | KeyCode::Char('K') => {
                self.jump_section(false);
                None
            }
            KeyCode::Enter | KeyCode::Char('i') if context.can_edit_sheet() => {
                self.begin_edit();
                None
            }
            KeyCode::Char('u') if context.can_edit_sheet() => {
                let mut prompt = new_textarea("percorso del file o data URL base64");
                prompt.set_block(rounded_block("Carica immagine", true));
                self.avatar_prompt = Some(prompt);
                None
            }
            KeyCode::Char('v') => Some(Action::Navigate(Screen::View)),
            KeyCode::Esc | KeyCode::Char('q') => Some(Action::Back),
            _ => None,
        }
    }

    fn on_tick(&mut self, now: Instant) -> Option<Action> {
        self.buffer.poll_flush(now).map(Action::UpdateSheet)
    }

    fn on_paste(&mut self, text: &str, _context: &Context) -> Option<Action> {
        if let Some(prompt) = self.avatar_prompt.as_mut() {
            prompt.insert_str(text.trim());
            return None;
        }
        let editing = self.editing.as_mut()?;
        if editing.field.commits_on_blur() {
            editing.textarea.insert_str(text);
        } else {
            editing.textarea.insert_str(text.replace(['\r', '\n'], " "));
            self.write_back(Instant::now());
        }
        None
    }

    fn on_sheet(&mut self, sheet: &CharacterSheet) {
        if !self.buffer.sync_from(sheet) {
            log::debug!("Kept local edits over a canonical refresh");
        }
    }

    fn render(&mut self, area: Rect, buffer: &mut Buffer, context: &Context) {
        let [body, bottom] =
            Layout::vertical([Constraint::Min(10), Constraint::Length(3)]).areas(area);
        let [list_area, health_area] =
            Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)])
                .areas(body);

        let sheet = self.buffer.value();
        let section = self
            .fields
            .selected()
            .map(|field| field.section())
            .unwrap_or_default();
        let title = format!("{} · {}", sheet.display_name(), section);
        let items: Vec<ListItem> = self
            .fields
            .items
            .iter()
            .map(|field| {
                let value = field.read(sheet);
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{:<28}", field.label()), Style::default().fg(Color::Gray)),
                    Span::raw(value),
                ]))
            })
            .collect();
        let read_only = !context.can_edit_sheet();
        let list = List::new(items)
            .block(rounded_block(
                &if read_only { format!("{} (sola lettura)", title) } else { title },
                self.editing.is_none(),
            ))
            .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .highlight_symbol("> ");
        StatefulWidget::render(list, list_area, buffer, &mut self.fields.state);

        self.render_health(health_area, buffer);

        if let Some(editing) = self.editing.as_mut() {
            if let Some(error) = &editing.error {
                editing
                    .textarea
                    .set_block(rounded_block(&format!("{} · {}", editing.field.label(), error), true)
                        .border_style(Style::default().fg(Color::Red)));
            } else {
                editing
                    .textarea
                    .set_block(rounded_block(&editing.field.label(), true));
            }
            editing.textarea.render(bottom, buffer);
        } else if let Some(prompt) = self.avatar_prompt.as_ref() {
            prompt.render(bottom, buffer);
        } else {
            let help = if context.unsaved || self.buffer.is_dirty() {
                "j/k campo · J/K sezione · Invio modifica · u immagine · Ctrl+s salva · v anteprima · Esc salva ed esci".bold()
            } else {
                "j/k campo · J/K sezione · Invio modifica · u immagine · Ctrl+s salva · v anteprima · Esc indietro".into()
            };
            Paragraph::new(help)
                .style(Style::default().fg(Color::Gray))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .block(Block::default().borders(Borders::TOP))
                .render(bottom, buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Identity, Profile, Role, Session};
    use crate::settings::Settings;

    const DEBOUNCE: Duration = Duration::from_millis(300);

    fn identity() -> Identity {
        Identity::new(
            Session {
                access_token: "t".to_string(),
                refresh_token: "r".to_string(),
                user_id: "u1".to_string(),
                email: None,
                expires_at: None,
            },
            Some(Profile {
                id: "u1".to_string(),
                email: None,
                role: Role::Player,
                created_at: None,
            }),
        )
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn select(editor: &mut SheetEditor, field: Field) {
        let index = editor.fields.items.iter().position(|f| *f == field).unwrap();
        editor.fields.state.select(Some(index));
    }

    fn with_context<R>(sheet: &CharacterSheet, f: impl FnOnce(&Context) -> R) -> R {
        let settings = Settings::default();
        let identity = identity();
        let context = Context {
            settings: &settings,
            identity: Some(&identity),
            sheet: Some(sheet),
            roster: &[],
            busy: false,
            unsaved: false,
        };
        f(&context)
    }

    #[test]
    fn typing_flushes_after_the_debounce_or_on_leave() {
        let sheet = CharacterSheet::new_for("u1");
        let mut editor = SheetEditor::new(sheet.clone(), DEBOUNCE);
        select(&mut editor, Field::Name);
        with_context(&sheet, |context| {
            assert!(editor.on_key(key(KeyCode::Enter), context).is_none());
            for c in "Rufy".chars() {
                assert!(editor.on_key(key(KeyCode::Char(c)), context).is_none());
            }
        });
        assert_eq!(editor.sheet().name, "Rufy");
        assert!(editor.on_tick(Instant::now()).is_none());
        let flushed = editor.on_tick(Instant::now() + Duration::from_secs(1));
        assert!(matches!(flushed, Some(Action::UpdateSheet(ref s)) if s.name == "Rufy"));

        with_context(&sheet, |context| {
            editor.on_key(key(KeyCode::Char('!')), context);
            let left = editor.on_key(key(KeyCode::Esc), context);
            assert!(matches!(left, Some(Action::UpdateSheet(ref s)) if s.name == "Rufy!"));
        });
        assert!(!editor.is_editing());
    }

    #[test]
    fn damage_edits_update_the_health_panel_live() {
        let sheet = CharacterSheet::new_for("u1");
        let mut editor = SheetEditor::new(sheet.clone(), DEBOUNCE);
        select(&mut editor, Field::TotalDamage);
        with_context(&sheet, |context| {
            editor.on_key(key(KeyCode::Enter), context);
            editor.on_key(key(KeyCode::Backspace), context);
            editor.on_key(key(KeyCode::Char('1')), context);
            editor.on_key(key(KeyCode::Char('3')), context);
        });
        let summary = editor.sheet().health_summary();
        assert_eq!(summary.total_damage, 13);
        assert_eq!(summary.current, 2);
        assert!(summary.penalty.is_active());
    }

    #[test]
    fn canonical_refresh_waits_while_editing() {
        let sheet = CharacterSheet::new_for("u1");
        let mut editor = SheetEditor::new(sheet.clone(), DEBOUNCE);
        select(&mut editor, Field::Crew);
        with_context(&sheet, |context| {
            editor.on_key(key(KeyCode::Enter), context);
            editor.on_key(key(KeyCode::Char('M')), context);
        });
        let mut remote = sheet.clone();
        remote.crew = "Marina".to_string();
        editor.on_sheet(&remote);
        assert_eq!(editor.sheet().crew, "M");

        with_context(&sheet, |context| editor.on_key(key(KeyCode::Esc), context));
        editor.on_sheet(&remote);
        assert_eq!(editor.sheet().crew, "Marina");
    }

    #[test]
    fn ability_import_commits_when_leaving() {
        let sheet = CharacterSheet::new_for("u1");
        let mut editor = SheetEditor::new(sheet.clone(), DEBOUNCE);
        select(&mut editor, Field::AbilityImport);
        with_context(&sheet, |context| {
            editor.on_key(key(KeyCode::Enter), context);
            editor.on_paste("Mentire\nIntimidire", context);
            assert!(editor.sheet().abilities.is_empty());
            editor.on_key(key(KeyCode::Esc), context)
        });
        assert!(!editor.sheet().abilities.is_empty());
    }

    #[test]
    fn foreign_sheets_stay_read_only_for_players() {
        let mut sheet = CharacterSheet::new_for("someone-else");
        sheet.name = "Buggy".to_string();
        let mut editor = SheetEditor::new(sheet.clone(), DEBOUNCE);
        with_context(&sheet, |context| {
            assert!(editor.on_key(key(KeyCode::Enter), context).is_none());
        });
        assert!(!editor.is_editing());
    }

    #[test]
    fn section_jumps_land_on_section_starts() {
        let mut editor = SheetEditor::new(CharacterSheet::new_for("u1"), DEBOUNCE);
        editor.jump_section(true);
        let first = *editor.fields.selected().unwrap();
        assert_eq!(first.section(), "Caratteristiche");
        editor.jump_section(true);
        editor.jump_section(false);
        assert_eq!(*editor.fields.selected().unwrap(), first);
        editor.jump_section(false);
        assert_eq!(editor.fields.state.selected(), Some(0));
    }
}
