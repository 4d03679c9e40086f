// ui/auth_menu.rs

use crate::{
    app::Action,
    context::Context,
    session::Role,
    ui::status::Notice,
};
use ratatui::{
    crossterm::event::{KeyCode, KeyEvent, KeyModifiers},
    layout::{Constraint, Layout},
    prelude::{Alignment, Buffer, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::*,
};
use tui_textarea::TextArea;

use super::{Component, center_rect, new_textarea, rounded_block, textarea_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    SignIn,
    SignUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Email,
    Password,
}

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn validate_credentials(email: &str, password: &str) -> Result<(), &'static str> {
    let email = email.trim();
    match email.split_once('@') {
        Some((user, domain)) if !user.is_empty() && domain.contains('.') => {}
        _ => return Err("Email non valida"),
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err("La password deve avere almeno 6 caratteri");
    }
    Ok(())
}

#[derive(Debug)]
pub struct AuthMenu {
    mode: AuthMode,
    focus: Focus,
    role: Role,
    email: TextArea<'static>,
    password: TextArea<'static>,
}

impl Default for AuthMenu {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthMenu {
    pub fn new() -> Self {
        let mut password = new_textarea("password");
        password.set_mask_char('•');
        Self {
            mode: AuthMode::SignIn,
            focus: Focus::Email,
            role: Role::Player,
            email: new_textarea("email"),
            password,
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    fn focused(&mut self) -> &mut TextArea<'static> {
        match self.focus {
            Focus::Email => &mut self.email,
            Focus::Password => &mut self.password,
        }
    }

    fn submit(&mut self) -> Option<Action> {
        let email = textarea_text(&self.email).trim().to_string();
        let password = textarea_text(&self.password);
        if let Err(message) = validate_credentials(&email, &password) {
            return Some(Action::Notify(Notice::error(message)));
        }
        Some(match self.mode {
            AuthMode::SignIn => Action::SignIn { email, password },
            AuthMode::SignUp => Action::SignUp {
                email,
                password,
                role: self.role,
            },
        })
    }
}

impl Component for AuthMenu {
    fn on_key(&mut self, key: KeyEvent, context: &Context) -> Option<Action> {
        if !context.settings.is_configured() {
            return matches!(key.code, KeyCode::Esc | KeyCode::Char('q')).then_some(Action::Quit);
        }
        if context.busy {
            return None;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => Some(Action::Quit),
            KeyCode::Char('n') if ctrl => {
                self.mode = match self.mode {
                    AuthMode::SignIn => AuthMode::SignUp,
                    AuthMode::SignUp => AuthMode::SignIn,
                };
                None
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Down | KeyCode::Up => {
                self.focus = match self.focus {
                    Focus::Email => Focus::Password,
                    Focus::Password => Focus::Email,
                };
                None
            }
            KeyCode::Left | KeyCode::Right
                if self.mode == AuthMode::SignUp && self.focus == Focus::Password =>
            {
                self.role = match self.role {
                    Role::Player => Role::Master,
                    Role::Master => Role::Player,
                };
                None
            }
            KeyCode::Enter => match self.focus {
                Focus::Email => {
                    self.focus = Focus::Password;
                    None
                }
                Focus::Password => self.submit(),
            },
            _ => {
                self.focused().input(key);
                None
            }
        }
    }

    fn on_paste(&mut self, text: &str, _context: &Context) -> Option<Action> {
        let line = text.lines().next().unwrap_or_default().trim().to_string();
        self.focused().insert_str(line);
        None
    }

    fn render(&mut self, area: Rect, buffer: &mut Buffer, context: &Context) {
        let centered = center_rect(area, Constraint::Length(60), Constraint::Length(16));
        let [title_area, email_area, password_area, role_area, help_area] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Min(2),
        ])
        .areas(centered);

        let title = match self.mode {
            AuthMode::SignIn => " Log Pose · Accedi ",
            AuthMode::SignUp => " Log Pose · Registrati ",
        };
        Paragraph::new(title.bold())
            .style(Style::default().fg(Color::Cyan))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::BOTTOM))
            .render(title_area, buffer);

        if !context.settings.is_configured() {
            Paragraph::new(
                "Backend non configurato.\nImposta SUPABASE_URL e SUPABASE_ANON_KEY, poi riavvia.\n\nEsc per uscire",
            )
            .style(Style::default().fg(Color::Red))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(email_area.union(help_area), buffer);
            return;
        }

        self.email
            .set_block(rounded_block("Email", self.focus == Focus::Email));
        self.password
            .set_block(rounded_block("Password", self.focus == Focus::Password));
        let hide_cursor = |textarea: &mut TextArea<'static>, focused: bool| {
            let style = if focused {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            textarea.set_cursor_style(style);
        };
        hide_cursor(&mut self.email, self.focus == Focus::Email);
        hide_cursor(&mut self.password, self.focus == Focus::Password);
        self.email.render(email_area, buffer);
        self.password.render(password_area, buffer);

        if self.mode == AuthMode::SignUp {
            let role_span = |role: Role| {
                let style = if role == self.role {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                Span::styled(format!(" {} ", role.label()), style)
            };
            Paragraph::new(Line::from(vec![
                Span::raw("Ruolo: "),
                role_span(Role::Player),
                Span::raw("/"),
                role_span(Role::Master),
                Span::styled("  (←/→)", Style::default().fg(Color::DarkGray)),
            ]))
            .alignment(Alignment::Center)
            .render(role_area, buffer);
        }

        let help = match self.mode {
            AuthMode::SignIn => "Tab cambia campo · Invio accedi · Ctrl+n registrati · Esc esci",
            AuthMode::SignUp => "Tab cambia campo · Invio registrati · Ctrl+n accedi · Esc esci",
        };
        Paragraph::new(help)
            .style(Style::default().fg(Color::Gray))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(help_area, buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_need_an_address_and_a_long_enough_password() {
        assert!(validate_credentials("nami@example.com", "mandarino").is_ok());
        assert_eq!(validate_credentials("nami", "mandarino"), Err("Email non valida"));
        assert_eq!(validate_credentials("@example.com", "mandarino"), Err("Email non valida"));
        assert!(validate_credentials("nami@example.com", "corta").is_err());
    }

    #[test]
    fn ctrl_n_toggles_sign_up() {
        let settings = crate::settings::Settings {
            backend_url: Some("https://example.supabase.co".to_string()),
            anon_key: Some("anon".to_string()),
            ..Default::default()
        };
        let context = Context {
            settings: &settings,
            identity: None,
            sheet: None,
            roster: &[],
            busy: false,
            unsaved: false,
        };
        let mut menu = AuthMenu::new();
        menu.on_key(
            KeyEvent::new(KeyCode::Char('n'), KeyModifiers::CONTROL),
            &context,
        );
        assert_eq!(menu.mode(), AuthMode::SignUp);
    }

    #[test]
    fn invalid_submit_only_notifies() {
        let mut menu = AuthMenu::new();
        menu.email.insert_str("zoro");
        assert!(matches!(menu.submit(), Some(Action::Notify(_))));
        menu.email.insert_str("@example.com");
        menu.password.insert_str("santoryu");
        assert!(matches!(menu.submit(), Some(Action::SignIn { .. })));
    }
}
