use log::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const MAX_LOG_LENGTH: usize = 500;

/// Receives every framed line for human readable history.
pub trait LineSink {
    fn append_line(&mut self, line: &str);

    /// Forget the displayed history.
    fn clear(&mut self) {}
}

/// Display sink shared between the read loop and the frame loop.
pub type SharedSink = Arc<Mutex<dyn LineSink + Send>>;

impl LineSink for SharedSink {
    fn append_line(&mut self, line: &str) {
        match self.lock() {
            Ok(mut sink) => sink.append_line(line),
            Err(_) => error!("Display sink lock poisoned, dropping line {:?}", line),
        }
    }

    fn clear(&mut self) {
        match self.lock() {
            Ok(mut sink) => sink.clear(),
            Err(_) => error!("Display sink lock poisoned, not clearing"),
        }
    }
}

/// Bounded line history with an autoscrolling view.
#[derive(Debug, Clone)]
pub struct Scrollback {
    lines: VecDeque<String>,
    capacity: usize,
    autoscroll: bool,
    /// Lines between the bottom of the view and the newest line.
    scroll_offset: usize,
}

impl Default for Scrollback {
    fn default() -> Self {
        Self::new(MAX_LOG_LENGTH, true)
    }
}

impl Scrollback {
    pub fn new(capacity: usize, autoscroll: bool) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            autoscroll,
            scroll_offset: 0,
        }
    }

    pub fn push(&mut self, line: &str) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_owned());
        if self.autoscroll {
            self.scroll_offset = 0;
        } else {
            // keep the view pinned to the same lines
            self.scroll_offset = (self.scroll_offset + 1).min(self.max_offset());
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.scroll_offset = 0;
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn latest(&self) -> Option<&str> {
        self.lines.back().map(String::as_str)
    }

    pub fn autoscroll(&self) -> bool {
        self.autoscroll
    }

    pub fn set_autoscroll(&mut self, autoscroll: bool) {
        self.autoscroll = autoscroll;
        if autoscroll {
            self.scroll_offset = 0;
        }
    }

    /// Scroll towards older lines. Turns autoscroll off.
    pub fn scroll_up(&mut self, rows: usize) {
        self.autoscroll = false;
        self.scroll_offset = (self.scroll_offset + rows).min(self.max_offset());
    }

    /// Scroll towards newer lines.
    pub fn scroll_down(&mut self, rows: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(rows);
    }

    /// The `rows` lines currently in view, oldest first.
    pub fn visible(&self, rows: usize) -> impl Iterator<Item = &str> {
        let end = self.lines.len() - self.scroll_offset;
        let start = end.saturating_sub(rows);
        self.lines.range(start..end).map(String::as_str)
    }

    fn max_offset(&self) -> usize {
        self.lines.len().saturating_sub(1)
    }
}

impl LineSink for Scrollback {
    fn append_line(&mut self, line: &str) {
        self.push(line);
    }

    fn clear(&mut self) {
        Scrollback::clear(self);
    }
}
