use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use keydrill::runtime::{logical_key, AppEvent, ChannelEventSource, FixedTicker, Runner};
use keydrill::ui::ViewState;
use keydrill::{HistoryStore, MemoryHistory, SessionEngine};

fn key(code: KeyCode) -> AppEvent {
    AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

// Drives the engine from a channel the way the TUI loop does, without a TTY.
#[test]
fn headless_typing_flow_completes() {
    let mut engine = SessionEngine::new(MemoryHistory::new(), ViewState::default());
    engine.load("hi\tyo\n");

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        ChannelEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    for code in [
        KeyCode::Char('h'),
        KeyCode::Char('u'),
        KeyCode::Char('i'),
        KeyCode::Tab,
        KeyCode::Char('y'),
        KeyCode::Char('o'),
        KeyCode::Enter,
    ] {
        tx.send(key(code)).unwrap();
    }

    for _ in 0..100u32 {
        match runner.step() {
            AppEvent::Tick | AppEvent::Resize => {}
            AppEvent::Key(k) => {
                if let Some(k) = logical_key(&k) {
                    engine.handle_keystroke(k);
                }
                if engine.is_finished() {
                    break;
                }
            }
        }
    }

    assert!(engine.is_finished());
    let view = engine.observer();
    assert!(view.is_complete());
    let record = view.completed.as_ref().unwrap();
    assert_eq!(record.errors(), 1);
    assert_eq!(record.error_map().get(&'i'), Some(&1));
    assert_eq!(view.render.as_ref().unwrap().cursor, 6);
    assert_eq!(engine.history().list(5).len(), 1);
}

#[test]
fn command_keys_never_reach_the_engine() {
    let mut engine = SessionEngine::new(MemoryHistory::new(), ViewState::default());
    engine.load("ab");

    for event in [
        KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE),
        KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE),
        KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL),
    ] {
        if let Some(k) = logical_key(&event) {
            engine.handle_keystroke(k);
        }
    }

    assert_eq!(engine.keystrokes(), 0);
    assert!(engine.observer().stats.is_none());
}
