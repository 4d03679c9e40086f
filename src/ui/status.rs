// ui/status.rs

use crate::context::Context;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Notice {
            kind: NoticeKind::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Notice {
            kind: NoticeKind::Error,
            text: text.into(),
        }
    }

    fn style(&self) -> Style {
        match self.kind {
            NoticeKind::Info => Style::default().fg(Color::Gray),
            NoticeKind::Error => Style::default().fg(Color::Red),
        }
    }
}

pub fn identity_label(context: &Context) -> String {
    match context.identity {
        Some(identity) => format!(
            "{} [{}]",
            identity.email().unwrap_or(identity.user_id()),
            identity.role().label()
        ),
        None => "non connesso".to_string(),
    }
}

pub fn render_status(buffer: &mut Buffer, area: Rect, notice: Option<&Notice>, context: &Context) {
    let [left, right] =
        Layout::horizontal([Constraint::Min(10), Constraint::Length(40)]).areas(area);

    let mut spans = Vec::new();
    if context.busy {
        spans.push(Span::styled(
            "⏳ ",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
    }
    if let Some(notice) = notice {
        spans.push(Span::styled(notice.text.clone(), notice.style()));
    }
    Paragraph::new(Line::from(spans)).render(left, buffer);

    let mut right_spans = Vec::new();
    if context.unsaved {
        right_spans.push(Span::styled("● modifiche ", Style::default().fg(Color::Yellow)));
    }
    right_spans.push(Span::styled(
        identity_label(context),
        Style::default().fg(Color::DarkGray),
    ));
    Paragraph::new(Line::from(right_spans))
        .right_aligned()
        .render(right, buffer);
}
