use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use tokio::sync::mpsc;

use editor_shell::error::{AppError, Result};
use editor_shell::fs::watcher::ChangeEvent;
use editor_shell::workspace::FollowupResult;

/// Application events.
#[derive(Debug)]
pub enum Event {
    /// A key press event.
    Key(KeyEvent),
    /// A periodic tick for rendering and housekeeping.
    Tick,
    /// Terminal resize event.
    Resize(u16, u16),
    /// Change reported by the watch session.
    FsChange(ChangeEvent),
    /// A followup spawned off the UI loop finished.
    FollowupDone(FollowupResult),
}

/// Async event handler that polls crossterm events and forwards them via a channel.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
    /// Create a new EventHandler with the given tick rate.
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();

        tokio::spawn(async move {
            loop {
                if event::poll(tick_rate).unwrap_or(false) {
                    let forwarded = match event::read() {
                        Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                            event_tx.send(Event::Key(key))
                        }
                        Ok(CrosstermEvent::Resize(w, h)) => event_tx.send(Event::Resize(w, h)),
                        _ => Ok(()),
                    };
                    if forwarded.is_err() {
                        break;
                    }
                } else if event_tx.send(Event::Tick).is_err() {
                    break;
                }
            }
        });

        Self { rx, tx }
    }

    /// Sender for tasks that report back into the UI loop.
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Forward change events from a watch subscription until either side closes.
    pub fn forward_changes(&self, mut changes: mpsc::UnboundedReceiver<ChangeEvent>) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            while let Some(change) = changes.recv().await {
                if tx.send(Event::FsChange(change)).is_err() {
                    break;
                }
            }
        });
    }

    /// Receive the next event (blocks until available).
    pub async fn next(&mut self) -> Result<Event> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| AppError::Terminal("Event channel closed".into()))
    }
}
