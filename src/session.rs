use crate::clock::{diff_ms, Clock, SystemClock};
use crate::history::HistoryStore;
use crate::metrics::{self, LATENCY_CEILING_MS};
use crate::record::{confusion_key, ConfusionMap, ErrorMap, SessionRecord};
use std::time::Instant;
use tracing::debug;

/// A single logical key. The two named control keys map to their literal
/// characters so they can be compared against the target text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Tab,
}

impl Key {
    pub fn as_char(self) -> char {
        match self {
            Key::Char(c) => c,
            Key::Enter => '\n',
            Key::Tab => '\t',
        }
    }
}

impl From<char> for Key {
    fn from(c: char) -> Self {
        match c {
            '\n' => Key::Enter,
            '\t' => Key::Tab,
            c => Key::Char(c),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CharStatus {
    Correct,
    Current,
    Pending,
}

/// Per-character display status plus the cursor it was derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderState {
    pub statuses: Vec<CharStatus>,
    pub cursor: usize,
    pub length: usize,
}

impl RenderState {
    pub fn new(cursor: usize, length: usize) -> Self {
        let statuses = (0..length)
            .map(|idx| match idx.cmp(&cursor) {
                std::cmp::Ordering::Less => CharStatus::Correct,
                std::cmp::Ordering::Equal => CharStatus::Current,
                std::cmp::Ordering::Greater => CharStatus::Pending,
            })
            .collect();

        Self {
            statuses,
            cursor,
            length,
        }
    }
}

/// Live metrics pushed after every keystroke
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub wpm: u32,
    pub accuracy: f64,
    pub errors: u32,
    pub elapsed_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyObservation {
    pub key: char,
    pub correct: bool,
    pub expected: char,
}

/// Receives the engine's signals synchronously, in the order
/// key -> render -> stats -> complete.
pub trait SessionObserver {
    fn on_render(&mut self, _state: &RenderState) {}
    fn on_stats(&mut self, _stats: &Stats) {}
    fn on_key(&mut self, _key: &KeyObservation) {}
    fn on_complete(&mut self, _record: &SessionRecord) {}
}

impl SessionObserver for () {}

impl<O: SessionObserver + ?Sized> SessionObserver for &mut O {
    fn on_render(&mut self, state: &RenderState) {
        (**self).on_render(state)
    }

    fn on_stats(&mut self, stats: &Stats) {
        (**self).on_stats(stats)
    }

    fn on_key(&mut self, key: &KeyObservation) {
        (**self).on_key(key)
    }

    fn on_complete(&mut self, record: &SessionRecord) {
        (**self).on_complete(record)
    }
}

/// Owned copy of every signal, useful for logging and tests
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Render(RenderState),
    Stats(Stats),
    Key(KeyObservation),
    Complete(SessionRecord),
}

impl SessionObserver for Vec<SessionEvent> {
    fn on_render(&mut self, state: &RenderState) {
        self.push(SessionEvent::Render(state.clone()));
    }

    fn on_stats(&mut self, stats: &Stats) {
        self.push(SessionEvent::Stats(*stats));
    }

    fn on_key(&mut self, key: &KeyObservation) {
        self.push(SessionEvent::Key(*key));
    }

    fn on_complete(&mut self, record: &SessionRecord) {
        self.push(SessionEvent::Complete(record.clone()));
    }
}

/// The active practice session.
///
/// Wrong keys never move the cursor: the expected character has to be typed
/// again before the session can continue. There is no backspace.
#[derive(Debug)]
pub struct SessionEngine<H, O = (), C = SystemClock> {
    history: H,
    observer: O,
    clock: C,
    text: Vec<char>,
    loaded: bool,
    cursor: usize,
    errors: u32,
    error_map: ErrorMap,
    confusion_map: ConfusionMap,
    started_at: Option<Instant>,
    last_correct_at: Option<Instant>,
    latency_samples: Vec<u64>,
    finalized: bool,
    last_id: Option<i64>,
}

impl<H: HistoryStore, O: SessionObserver> SessionEngine<H, O, SystemClock> {
    pub fn new(history: H, observer: O) -> Self {
        Self::with_clock(history, observer, SystemClock)
    }
}

impl<H: HistoryStore, O: SessionObserver, C: Clock> SessionEngine<H, O, C> {
    pub fn with_clock(history: H, observer: O, clock: C) -> Self {
        Self {
            history,
            observer,
            clock,
            text: Vec::new(),
            loaded: false,
            cursor: 0,
            errors: 0,
            error_map: ErrorMap::new(),
            confusion_map: ConfusionMap::new(),
            started_at: None,
            last_correct_at: None,
            latency_samples: Vec::new(),
            finalized: false,
            last_id: None,
        }
    }

    /// Replace the target text and start over. Whatever was in progress is
    /// dropped without being written to history.
    pub fn load(&mut self, text: &str) {
        if self.loaded && !self.is_finished() && self.cursor + self.errors as usize > 0 {
            debug!(
                cursor = self.cursor,
                length = self.text.len(),
                "abandoning unfinished session"
            );
        }

        self.text = text.chars().collect();
        self.loaded = true;
        self.cursor = 0;
        self.errors = 0;
        self.error_map.clear();
        self.confusion_map.clear();
        self.last_correct_at = None;
        self.latency_samples.clear();
        self.finalized = false;
        self.started_at = Some(self.clock.now());

        debug!(length = self.text.len(), "loaded practice text");
        let state = self.render_state();
        self.observer.on_render(&state);
    }

    pub fn handle_keystroke(&mut self, key: Key) {
        debug_assert!(self.loaded, "keystroke before any text was loaded");
        if !self.loaded || self.is_finished() {
            return;
        }

        let typed = key.as_char();
        let expected = self.text[self.cursor];
        let correct = typed == expected;

        if correct {
            self.cursor += 1;
            let now = self.clock.now();
            if let Some(prev) = self.last_correct_at {
                let interval = diff_ms(prev, now);
                if interval > 0 && interval < LATENCY_CEILING_MS {
                    self.latency_samples.push(interval);
                }
            }
            self.last_correct_at = Some(now);
        } else {
            self.errors += 1;
            *self.error_map.entry(expected).or_insert(0) += 1;
            *self
                .confusion_map
                .entry(confusion_key(expected, typed))
                .or_insert(0) += 1;
        }

        self.observer.on_key(&KeyObservation {
            key: typed,
            correct,
            expected,
        });
        let state = self.render_state();
        self.observer.on_render(&state);
        let stats = self.stats();
        self.observer.on_stats(&stats);

        if self.cursor == self.text.len() {
            self.finalize();
        }
    }

    fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;

        let record = self.build_record();
        self.last_id = Some(record.id());
        debug!(
            id = record.id(),
            wpm = record.wpm(),
            accuracy = record.accuracy(),
            errors = record.errors(),
            "session complete"
        );
        self.history.append(record.clone());
        self.observer.on_complete(&record);
    }

    fn build_record(&self) -> SessionRecord {
        let completed_at = self.clock.wall_now();
        // ids never repeat or go backwards, even within one millisecond
        let wall_ms = completed_at.timestamp_millis();
        let id = match self.last_id {
            Some(last) => wall_ms.max(last + 1),
            None => wall_ms,
        };
        SessionRecord::builder(id, completed_at)
            .length(self.text.len())
            .errors(self.errors)
            .accuracy(self.accuracy())
            .wpm(self.wpm())
            .error_map(self.error_map.clone())
            .latency(metrics::latency_summary(&self.latency_samples))
            .confusion_map(self.confusion_map.clone())
            .build()
    }

    pub fn accuracy(&self) -> f64 {
        metrics::accuracy(self.cursor, self.errors)
    }

    pub fn wpm(&self) -> u32 {
        match (self.started_at, self.last_correct_at) {
            (Some(start), Some(last)) => metrics::wpm(self.cursor, diff_ms(start, last)),
            _ => 0,
        }
    }

    pub fn elapsed_seconds(&self) -> u64 {
        metrics::elapsed_seconds(
            self.started_at
                .map(|start| diff_ms(start, self.clock.now())),
        )
    }

    pub fn stats(&self) -> Stats {
        Stats {
            wpm: self.wpm(),
            accuracy: self.accuracy(),
            errors: self.errors,
            elapsed_seconds: self.elapsed_seconds(),
        }
    }

    pub fn render_state(&self) -> RenderState {
        RenderState::new(self.cursor, self.text.len())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_finished(&self) -> bool {
        self.loaded && self.cursor >= self.text.len()
    }

    pub fn text(&self) -> &[char] {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn errors(&self) -> u32 {
        self.errors
    }

    /// Total keystrokes since the last load
    pub fn keystrokes(&self) -> usize {
        self.cursor + self.errors as usize
    }

    pub fn error_map(&self) -> &ErrorMap {
        &self.error_map
    }

    pub fn confusion_map(&self) -> &ConfusionMap {
        &self.confusion_map
    }

    pub fn latency_samples(&self) -> &[u64] {
        &self.latency_samples
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut H {
        &mut self.history
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::history::MemoryHistory;
    use assert_matches::assert_matches;
    use std::rc::Rc;

    type TestEngine = SessionEngine<MemoryHistory, Vec<SessionEvent>, Rc<ManualClock>>;

    fn engine() -> (TestEngine, Rc<ManualClock>) {
        let clock = Rc::new(ManualClock::new());
        let engine = SessionEngine::with_clock(MemoryHistory::new(), Vec::new(), clock.clone());
        (engine, clock)
    }

    fn type_str(engine: &mut TestEngine, s: &str) {
        for c in s.chars() {
            engine.handle_keystroke(Key::from(c));
        }
    }

    #[test]
    fn key_maps_control_keys_to_literals() {
        assert_eq!(Key::Enter.as_char(), '\n');
        assert_eq!(Key::Tab.as_char(), '\t');
        assert_eq!(Key::from('a'), Key::Char('a'));
        assert_eq!(Key::from('\n'), Key::Enter);
    }

    #[test]
    fn render_state_marks_statuses() {
        let state = RenderState::new(1, 3);
        assert_eq!(
            state.statuses,
            vec![CharStatus::Correct, CharStatus::Current, CharStatus::Pending]
        );
        assert_eq!(CharStatus::Current.to_string(), "current");
    }

    #[test]
    fn load_renders_first_char_as_current() {
        let (mut engine, _clock) = engine();
        engine.load("abc");

        assert_eq!(engine.observer().len(), 1);
        assert_matches!(&engine.observer()[0], SessionEvent::Render(state) => {
            assert_eq!(state.cursor, 0);
            assert_eq!(state.length, 3);
            assert_eq!(
                state.statuses,
                vec![CharStatus::Current, CharStatus::Pending, CharStatus::Pending]
            );
        });
    }

    #[test]
    fn correct_key_advances_cursor() {
        let (mut engine, _clock) = engine();
        engine.load("ab");
        engine.handle_keystroke(Key::Char('a'));

        assert_eq!(engine.cursor(), 1);
        assert_eq!(engine.errors(), 0);
        assert!(!engine.is_finished());
    }

    #[test]
    fn wrong_key_holds_cursor_and_counts() {
        let (mut engine, _clock) = engine();
        engine.load("ab");
        engine.handle_keystroke(Key::Char('q'));
        engine.handle_keystroke(Key::Char('q'));

        assert_eq!(engine.cursor(), 0);
        assert_eq!(engine.errors(), 2);
        assert_eq!(engine.error_map().get(&'a'), Some(&2));
        assert_eq!(engine.confusion_map().get("a→q"), Some(&2));
    }

    #[test]
    fn signals_arrive_in_order() {
        let (mut engine, _clock) = engine();
        engine.load("a");
        engine.handle_keystroke(Key::Char('a'));

        let events = engine.observer();
        assert_eq!(events.len(), 5);
        assert_matches!(events[0], SessionEvent::Render(_));
        assert_matches!(events[1], SessionEvent::Key(KeyObservation { key: 'a', correct: true, expected: 'a' }));
        assert_matches!(events[2], SessionEvent::Render(_));
        assert_matches!(events[3], SessionEvent::Stats(_));
        assert_matches!(events[4], SessionEvent::Complete(_));
    }

    #[test]
    fn enter_and_tab_match_literal_text() {
        let (mut engine, _clock) = engine();
        engine.load("a\n\tb");
        engine.handle_keystroke(Key::Char('a'));
        engine.handle_keystroke(Key::Enter);
        engine.handle_keystroke(Key::Tab);
        engine.handle_keystroke(Key::Char('b'));

        assert!(engine.is_finished());
        assert_eq!(engine.errors(), 0);
        assert_eq!(engine.history().len(), 1);
    }

    #[test]
    fn latency_recorded_between_correct_keys_only() {
        let (mut engine, clock) = engine();
        engine.load("abc");

        clock.advance_ms(100);
        engine.handle_keystroke(Key::Char('a'));
        clock.advance_ms(120);
        engine.handle_keystroke(Key::Char('x'));
        clock.advance_ms(80);
        engine.handle_keystroke(Key::Char('b'));

        // a -> b spans the wrong key: 200ms
        assert_eq!(engine.latency_samples(), &[200]);
    }

    #[test]
    fn latency_ceiling_is_exclusive() {
        let (mut engine, clock) = engine();
        engine.load("abcd");

        engine.handle_keystroke(Key::Char('a'));
        clock.advance_ms(4999);
        engine.handle_keystroke(Key::Char('b'));
        clock.advance_ms(5000);
        engine.handle_keystroke(Key::Char('c'));
        clock.advance_ms(7000);
        engine.handle_keystroke(Key::Char('d'));

        assert_eq!(engine.latency_samples(), &[4999]);
    }

    #[test]
    fn zero_interval_is_not_a_sample() {
        let (mut engine, _clock) = engine();
        engine.load("ab");
        engine.handle_keystroke(Key::Char('a'));
        engine.handle_keystroke(Key::Char('b'));

        assert!(engine.latency_samples().is_empty());
        let record = engine.history().list(1).remove(0);
        assert_eq!(record.latency(), None);
    }

    #[test]
    fn stats_track_elapsed_and_wpm() {
        let (mut engine, clock) = engine();
        engine.load("hello world");

        clock.advance_ms(1000);
        type_str(&mut engine, "hello");
        clock.advance_ms(1500);

        let stats = engine.stats();
        assert_eq!(stats.elapsed_seconds, 2);
        // 5 chars = 1 word over 1s from start to last correct key
        assert_eq!(stats.wpm, 60);
        assert_eq!(stats.accuracy, 100.0);
        assert_eq!(stats.errors, 0);
    }

    #[test]
    fn stats_before_typing() {
        let (mut engine, _clock) = engine();
        engine.load("abc");
        let stats = engine.stats();
        assert_eq!(stats.wpm, 0);
        assert_eq!(stats.accuracy, 100.0);
        assert_eq!(stats.elapsed_seconds, 0);
    }

    #[test]
    fn finished_session_ignores_keys() {
        let (mut engine, _clock) = engine();
        engine.load("a");
        engine.handle_keystroke(Key::Char('a'));
        let events_after_finish = engine.observer().len();

        engine.handle_keystroke(Key::Char('a'));
        engine.handle_keystroke(Key::Char('z'));

        assert_eq!(engine.observer().len(), events_after_finish);
        assert_eq!(engine.keystrokes(), 1);
        assert_eq!(engine.history().len(), 1);
    }

    #[test]
    fn empty_text_is_finished_and_not_persisted() {
        let (mut engine, _clock) = engine();
        engine.load("");

        assert!(engine.is_finished());
        engine.handle_keystroke(Key::Char('a'));
        assert_eq!(engine.keystrokes(), 0);
        assert!(engine.history().is_empty());
        assert_matches!(&engine.observer()[..], [SessionEvent::Render(state)] => {
            assert!(state.statuses.is_empty());
        });
    }

    #[test]
    fn reload_resets_counters() {
        let (mut engine, _clock) = engine();
        engine.load("ab");
        type_str(&mut engine, "xa");
        engine.load("cd");

        assert_eq!(engine.cursor(), 0);
        assert_eq!(engine.errors(), 0);
        assert!(engine.error_map().is_empty());
        assert!(engine.confusion_map().is_empty());
        assert!(engine.latency_samples().is_empty());
        assert_eq!(engine.text(), &['c', 'd']);
    }

    #[test]
    fn record_carries_wall_clock_id() {
        let (mut engine, clock) = engine();
        engine.load("ab");
        clock.advance_ms(300);
        type_str(&mut engine, "ab");

        let record = engine.history().list(1).remove(0);
        assert_eq!(record.id(), clock.wall_now().timestamp_millis());
        assert_eq!(record.completed_at(), clock.wall_now());
        assert_eq!(record.length(), 2);
    }

    #[test]
    fn ids_stay_unique_within_one_millisecond() {
        let (mut engine, clock) = engine();
        for _ in 0..50 {
            engine.load("a");
            type_str(&mut engine, "a");
        }

        let ids: Vec<i64> = engine.history().list(100).iter().map(|r| r.id()).collect();
        assert_eq!(ids.len(), 50);
        assert!(ids.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(ids[49], clock.wall_now().timestamp_millis());
    }

    #[test]
    fn ids_catch_up_with_the_wall_clock() {
        let (mut engine, clock) = engine();
        engine.load("a");
        type_str(&mut engine, "a");
        engine.load("a");
        type_str(&mut engine, "a");

        clock.advance_ms(1_000);
        engine.load("a");
        type_str(&mut engine, "a");

        let ids: Vec<i64> = engine.history().list(3).iter().map(|r| r.id()).collect();
        assert_eq!(ids[0], clock.wall_now().timestamp_millis());
        assert_eq!(ids[1], ids[2] + 1);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "keystroke before any text was loaded")]
    fn keystroke_before_load_asserts_in_debug() {
        let (mut engine, _clock) = engine();
        engine.handle_keystroke(Key::Char('a'));
    }
}
