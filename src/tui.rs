use std::{
    ops::{Deref, DerefMut},
    time::Duration,
};

use color_eyre::eyre::Result;

use futures::{FutureExt, StreamExt};
use ratatui::{
    DefaultTerminal,
    crossterm::event::{Event as CrosstermEvent, KeyEvent, KeyEventKind, MouseEvent},
};
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::ui::{MIN_HEIGHT, MIN_WIDTH};

#[derive(Clone, Debug)]
pub enum TuiEvent {
    Init,
    Error,
    Tick,
    Render,
    FocusGained,
    FocusLost,
    Paste(String),
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
}

pub struct Tui {
    pub terminal: DefaultTerminal,
    pub task: JoinHandle<()>,
    pub cancellation_token: CancellationToken,
    pub event_rx: UnboundedReceiver<TuiEvent>,
    pub event_tx: UnboundedSender<TuiEvent>,
    pub frame_rate: f64,
    pub tick_rate: f64,
    restored: bool,
}

fn forward(tx: &UnboundedSender<TuiEvent>, event: TuiEvent) -> bool {
    match tx.send(event) {
        Ok(()) => true,
        Err(e) => {
            log::debug!("Event loop gone, dropping {:?}", e.0);
            false
        }
    }
}

impl Tui {
    pub fn new() -> Result<Self> {
        let tick_rate = 4.0;
        let frame_rate = 60.0;
        let terminal = ratatui::init();
        crossterm::execute!(std::io::stdout(), crossterm::event::EnableBracketedPaste)?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancellation_token = CancellationToken::new();
        let task = tokio::spawn(async {});
        Ok(Self {
            terminal,
            task,
            cancellation_token,
            event_rx,
            event_tx,
            frame_rate,
            tick_rate,
            restored: false,
        })
    }

    pub fn tick_rate(mut self, tick_rate: f64) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    pub fn frame_rate(mut self, frame_rate: f64) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn start(&mut self) {
        let tick_delay = Duration::from_secs_f64(1.0 / self.tick_rate);
        let render_delay = Duration::from_secs_f64(1.0 / self.frame_rate);
        self.cancel();
        self.cancellation_token = CancellationToken::new();
        let cancellation_token = self.cancellation_token.clone();
        let event_tx = self.event_tx.clone();
        self.task = tokio::spawn(async move {
            let mut reader = crossterm::event::EventStream::new();
            let mut tick_interval = tokio::time::interval(tick_delay);
            let mut render_interval = tokio::time::interval(render_delay);
            if !forward(&event_tx, TuiEvent::Init) {
                return;
            }
            loop {
                let tick_delay = tick_interval.tick();
                let render_delay = render_interval.tick();
                let crossterm_event = reader.next().fuse();
                let event = tokio::select! {
                  _ = cancellation_token.cancelled() => break,
                  maybe_event = crossterm_event => match maybe_event {
                      Some(Ok(CrosstermEvent::Key(key))) if key.kind == KeyEventKind::Press => {
                          TuiEvent::Key(key)
                      }
                      Some(Ok(CrosstermEvent::Key(_))) => continue,
                      Some(Ok(CrosstermEvent::Mouse(mouse))) => TuiEvent::Mouse(mouse),
                      Some(Ok(CrosstermEvent::Resize(x, y))) => TuiEvent::Resize(x, y),
                      Some(Ok(CrosstermEvent::FocusLost)) => TuiEvent::FocusLost,
                      Some(Ok(CrosstermEvent::FocusGained)) => TuiEvent::FocusGained,
                      Some(Ok(CrosstermEvent::Paste(s))) => TuiEvent::Paste(s),
                      Some(Err(_)) => TuiEvent::Error,
                      None => continue,
                  },
                  _ = tick_delay => TuiEvent::Tick,
                  _ = render_delay => TuiEvent::Render,
                };
                if !forward(&event_tx, event) {
                    break;
                }
            }
        });
    }

    pub fn stop(&self) -> Result<()> {
        self.cancel();
        let mut counter = 0;
        while !self.task.is_finished() {
            std::thread::sleep(Duration::from_millis(1));
            counter += 1;
            if counter > 50 {
                self.task.abort();
            }
            if counter > 100 {
                log::error!("Failed to abort task in 100 milliseconds for unknown reason");
                break;
            }
        }
        Ok(())
    }

    pub fn enter(&mut self) -> Result<()> {
        self.ensure_minimum_terminal_size()?;
        self.start();
        Ok(())
    }

    pub fn exit(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }
        log::info!("Log Pose exit: {}", chrono::Local::now());
        self.stop()?;
        crossterm::execute!(std::io::stdout(), crossterm::event::DisableBracketedPaste)?;
        ratatui::restore();
        self.restored = true;
        Ok(())
    }

    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    pub async fn next(&mut self) -> Option<TuiEvent> {
        self.event_rx.recv().await
    }

    pub fn ensure_minimum_terminal_size(&self) -> Result<()> {
        let size = self.terminal.size()?;
        if size.width < MIN_WIDTH || size.height < MIN_HEIGHT {
            log::warn!(
                "Terminal is {}x{}, layout expects at least {}x{}",
                size.width,
                size.height,
                MIN_WIDTH,
                MIN_HEIGHT
            );
            self.event_tx.send(TuiEvent::Resize(MIN_WIDTH, MIN_HEIGHT))?;
        }
        Ok(())
    }
}

impl Deref for Tui {
    type Target = DefaultTerminal;

    fn deref(&self) -> &Self::Target {
        &self.terminal
    }
}

impl DerefMut for Tui {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.terminal
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        if let Err(e) = self.exit() {
            log::error!("Failed to restore terminal: {}", e);
        }
    }
}
