//! Playback events and the listener surface.
//!
//! The sequencer reports lifecycle transitions two ways, mirroring each
//! other: registered [`SequencerListener`]s are notified synchronously as
//! transitions happen, and the same events accumulate in a drainable
//! [`EventQueue`] for embedders that prefer polling after each tick.

use serde::{Deserialize, Serialize};
use static_assertions::assert_impl_all;
use std::collections::VecDeque;

/// Event emitted when a playback changes state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// Playback has started.
    Started {
        /// The element the composition targets.
        target: String,
    },
    /// Playback was cancelled before completion.
    Cancelled { target: String },
    /// Playback was paused.
    Paused { target: String },
    /// Playback resumed from pause.
    Resumed { target: String },
    /// Playback completed all sections and repeats.
    Ended { target: String },
    /// Playback finished one whole pass and is repeating.
    Repeated {
        target: String,
        /// The pass that just completed (0-indexed).
        pass: u32,
    },
    /// The cursor moved to a new section.
    SectionChanged {
        target: String,
        /// Index of the section that just became active.
        section: usize,
    },
}

assert_impl_all!(PlaybackEvent: Send, Sync);

impl PlaybackEvent {
    /// Get the target element for this event.
    pub fn target(&self) -> &str {
        match self {
            Self::Started { target }
            | Self::Cancelled { target }
            | Self::Paused { target }
            | Self::Resumed { target }
            | Self::Ended { target }
            | Self::Repeated { target, .. }
            | Self::SectionChanged { target, .. } => target,
        }
    }

    /// Check if this event ends the playback (normally or not).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended { .. } | Self::Cancelled { .. })
    }
}

/// Observer notified by the sequencer as transitions happen.
///
/// All methods default to no-ops; implement the ones of interest. Listeners
/// are invoked in registration order.
pub trait SequencerListener {
    fn on_start(&mut self, _target: &str) {}
    fn on_cancel(&mut self, _target: &str) {}
    fn on_pause(&mut self, _target: &str) {}
    fn on_resume(&mut self, _target: &str) {}
    fn on_end(&mut self, _target: &str) {}
    fn on_repeat(&mut self, _target: &str, _pass: u32) {}
    fn on_section_changed(&mut self, _target: &str, _section: usize) {}

    /// Route an event to the matching typed method.
    fn notify(&mut self, event: &PlaybackEvent) {
        match event {
            PlaybackEvent::Started { target } => self.on_start(target),
            PlaybackEvent::Cancelled { target } => self.on_cancel(target),
            PlaybackEvent::Paused { target } => self.on_pause(target),
            PlaybackEvent::Resumed { target } => self.on_resume(target),
            PlaybackEvent::Ended { target } => self.on_end(target),
            PlaybackEvent::Repeated { target, pass } => self.on_repeat(target, *pass),
            PlaybackEvent::SectionChanged { target, section } => {
                self.on_section_changed(target, *section)
            }
        }
    }
}

/// Queue collecting playback events during ticks.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<PlaybackEvent>,
}

impl EventQueue {
    /// Create a new empty event queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an event onto the queue.
    pub fn push(&mut self, event: PlaybackEvent) {
        self.events.push_back(event);
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get the number of pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Pop the next event from the queue.
    pub fn pop(&mut self) -> Option<PlaybackEvent> {
        self.events.pop_front()
    }

    /// Drain all events from the queue, returning an iterator.
    pub fn drain(&mut self) -> impl Iterator<Item = PlaybackEvent> + '_ {
        self.events.drain(..)
    }

    /// Peek at the next event without removing it.
    pub fn peek(&self) -> Option<&PlaybackEvent> {
        self.events.front()
    }

    /// Clear all pending events.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accessors() {
        let event = PlaybackEvent::SectionChanged {
            target: "panel".to_string(),
            section: 2,
        };
        assert_eq!(event.target(), "panel");
        assert!(!event.is_terminal());

        assert!(PlaybackEvent::Ended {
            target: "panel".to_string()
        }
        .is_terminal());
        assert!(PlaybackEvent::Cancelled {
            target: "panel".to_string()
        }
        .is_terminal());
    }

    #[test]
    fn test_queue_operations() {
        let mut queue = EventQueue::new();
        assert!(queue.is_empty());

        queue.push(PlaybackEvent::Started {
            target: "a".to_string(),
        });
        queue.push(PlaybackEvent::Ended {
            target: "a".to_string(),
        });
        assert_eq!(queue.len(), 2);

        let first = queue.pop().unwrap();
        assert!(matches!(first, PlaybackEvent::Started { .. }));
        assert_eq!(queue.peek().map(|e| e.is_terminal()), Some(true));

        let rest: Vec<_> = queue.drain().collect();
        assert_eq!(rest.len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_listener_dispatch() {
        #[derive(Default)]
        struct Recorder {
            calls: Vec<String>,
        }

        impl SequencerListener for Recorder {
            fn on_start(&mut self, target: &str) {
                self.calls.push(format!("start:{target}"));
            }
            fn on_section_changed(&mut self, target: &str, section: usize) {
                self.calls.push(format!("section:{target}:{section}"));
            }
            fn on_end(&mut self, target: &str) {
                self.calls.push(format!("end:{target}"));
            }
        }

        let mut recorder = Recorder::default();
        for event in [
            PlaybackEvent::Started {
                target: "x".to_string(),
            },
            PlaybackEvent::SectionChanged {
                target: "x".to_string(),
                section: 0,
            },
            PlaybackEvent::Ended {
                target: "x".to_string(),
            },
        ] {
            recorder.notify(&event);
        }

        assert_eq!(recorder.calls, ["start:x", "section:x:0", "end:x"]);
    }

    #[test]
    fn test_event_serialization() {
        let event = PlaybackEvent::Repeated {
            target: "card".to_string(),
            pass: 1,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("repeated"));
        assert!(json.contains("card"));

        let parsed: PlaybackEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, parsed);
    }
}
