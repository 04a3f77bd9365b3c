use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::time::{Duration, SystemTime};

use crate::clock::Clock;
use crate::gateway::Recorder;

pub const GAME_TITLE: &str = "Memory Game";

pub const DEFAULT_PAIRS: usize = 6;

/// Non-matching cards stay face-up this long before flipping back
const REVEAL_WINDOW: Duration = Duration::from_millis(1000);

const SYMBOL_POOL: &[char] = &[
    '🧠', '⚡', '🎯', '🎲', '🔮', '🎪', '🌟', '🍀', '🎵', '🚀', '🌈', '🔥',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardFace {
    Hidden,
    Revealed,
    Matched,
}

/// Pair-matching game: flip two cards per turn, fewest moves wins.
/// Score is `max(100 - 5 * moves, 10)`, persisted once on completion with
/// the move count as the duration metric.
#[derive(Debug)]
pub struct MemoryGame {
    deck: Vec<char>,
    face_up: Vec<usize>,
    matched: HashSet<usize>,
    moves: u32,
    reveal_until: Option<SystemTime>,
    completed: bool,
    score: Option<i64>,
    recorder: Option<Recorder>,
    user_id: Option<String>,
}

impl MemoryGame {
    pub fn new(user_id: Option<String>, recorder: Option<Recorder>, pairs: usize) -> Self {
        let pairs = pairs.clamp(2, SYMBOL_POOL.len());
        let mut deck: Vec<char> = SYMBOL_POOL[..pairs]
            .iter()
            .flat_map(|&s| [s, s])
            .collect();
        deck.shuffle(&mut rand::thread_rng());

        Self {
            deck,
            face_up: Vec::new(),
            matched: HashSet::new(),
            moves: 0,
            reveal_until: None,
            completed: false,
            score: None,
            recorder,
            user_id,
        }
    }

    /// Reshuffle and start over; the recorder is kept across restarts
    pub fn restart(&mut self) {
        let pairs = self.deck.len() / 2;
        let recorder = self.recorder.take();
        let user_id = self.user_id.take();
        *self = Self::new(user_id, recorder, pairs);
    }

    /// Flip a card. Ignored while two cards are showing, on already-visible
    /// cards, and after completion.
    pub fn flip(&mut self, index: usize, clock: &impl Clock) {
        if self.completed
            || index >= self.deck.len()
            || self.face_up.len() == 2
            || self.face_up.contains(&index)
            || self.matched.contains(&index)
        {
            return;
        }

        self.face_up.push(index);
        if self.face_up.len() < 2 {
            return;
        }

        self.moves += 1;
        let (first, second) = (self.face_up[0], self.face_up[1]);
        if self.deck[first] == self.deck[second] {
            self.matched.insert(first);
            self.matched.insert(second);
            self.face_up.clear();
            if self.matched.len() == self.deck.len() {
                self.complete();
            }
        } else {
            self.reveal_until = Some(clock.now() + REVEAL_WINDOW);
        }
    }

    /// Flip non-matching cards back once the reveal window has passed
    pub fn on_tick(&mut self, clock: &impl Clock) {
        if let Some(deadline) = self.reveal_until {
            if clock.now() >= deadline {
                self.face_up.clear();
                self.reveal_until = None;
            }
        }
    }

    fn complete(&mut self) {
        self.completed = true;
        let score = (100 - 5 * self.moves as i64).max(10);
        self.score = Some(score);

        if let Some(recorder) = &self.recorder {
            recorder.submit(GAME_TITLE, self.user_id.as_deref(), score, self.moves as i64);
        }
    }

    pub fn card(&self, index: usize) -> Option<(char, CardFace)> {
        let symbol = *self.deck.get(index)?;
        let face = if self.matched.contains(&index) {
            CardFace::Matched
        } else if self.face_up.contains(&index) {
            CardFace::Revealed
        } else {
            CardFace::Hidden
        };
        Some((symbol, face))
    }

    pub fn len(&self) -> usize {
        self.deck.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deck.is_empty()
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }

    pub fn matched_pairs(&self) -> usize {
        self.matched.len() / 2
    }

    pub fn total_pairs(&self) -> usize {
        self.deck.len() / 2
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn score(&self) -> Option<i64> {
        self.score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::testing::ManualClock;
    use crate::db::SessionRow;
    use crate::gateway::{ScoreStore, StoreError};
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CountingStore {
        rows: Arc<Mutex<Vec<SessionRow>>>,
    }

    impl ScoreStore for CountingStore {
        fn resolve_game_id(&self, _title: &str) -> Result<Option<String>, StoreError> {
            Ok(Some("memory-game".to_string()))
        }

        fn insert_session(&self, row: &SessionRow) -> Result<(), StoreError> {
            self.rows.lock().unwrap().push(row.clone());
            Ok(())
        }
    }

    fn pair_positions(game: &MemoryGame) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for i in 0..game.len() {
            for j in (i + 1)..game.len() {
                if game.deck[i] == game.deck[j] {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    fn mismatched_positions(game: &MemoryGame) -> (usize, usize) {
        for i in 1..game.len() {
            if game.deck[i] != game.deck[0] {
                return (0, i);
            }
        }
        unreachable!("deck with >= 2 pairs always has a mismatch");
    }

    #[test]
    fn test_new_deck_has_pair_of_each_symbol() {
        let game = MemoryGame::new(None, None, 6);

        assert_eq!(game.len(), 12);
        assert_eq!(game.total_pairs(), 6);
        assert_eq!(pair_positions(&game).len(), 6);
        assert_eq!(game.matched_pairs(), 0);
    }

    #[test]
    fn test_matching_pair_is_kept_face_up() {
        let clock = ManualClock::new();
        let mut game = MemoryGame::new(None, None, 6);
        let (a, b) = pair_positions(&game)[0];

        game.flip(a, &clock);
        game.flip(b, &clock);

        assert_eq!(game.moves(), 1);
        assert_eq!(game.matched_pairs(), 1);
        assert_eq!(game.card(a).unwrap().1, CardFace::Matched);
        assert_eq!(game.card(b).unwrap().1, CardFace::Matched);
    }

    #[test]
    fn test_mismatch_flips_back_after_reveal_window() {
        let clock = ManualClock::new();
        let mut game = MemoryGame::new(None, None, 6);
        let (a, b) = mismatched_positions(&game);

        game.flip(a, &clock);
        game.flip(b, &clock);
        assert_eq!(game.moves(), 1);
        assert_eq!(game.card(a).unwrap().1, CardFace::Revealed);

        // third flip is ignored while two cards are showing
        let other = (0..game.len()).find(|i| *i != a && *i != b).unwrap();
        game.flip(other, &clock);
        assert_eq!(game.card(other).unwrap().1, CardFace::Hidden);

        clock.advance_ms(999);
        game.on_tick(&clock);
        assert_eq!(game.card(a).unwrap().1, CardFace::Revealed);

        clock.advance_ms(1);
        game.on_tick(&clock);
        assert_eq!(game.card(a).unwrap().1, CardFace::Hidden);
        assert_eq!(game.card(b).unwrap().1, CardFace::Hidden);
    }

    #[test]
    fn test_flipping_same_card_twice_is_ignored() {
        let clock = ManualClock::new();
        let mut game = MemoryGame::new(None, None, 6);

        game.flip(0, &clock);
        game.flip(0, &clock);

        assert_eq!(game.moves(), 0);
        assert_eq!(game.card(0).unwrap().1, CardFace::Revealed);
    }

    #[test]
    fn test_perfect_game_scores_maximum() {
        let clock = ManualClock::new();
        let mut game = MemoryGame::new(None, None, 6);

        for (a, b) in pair_positions(&game) {
            game.flip(a, &clock);
            game.flip(b, &clock);
        }

        assert!(game.is_completed());
        assert_eq!(game.moves(), 6);
        // 100 - 5 * 6
        assert_eq!(game.score(), Some(70));
    }

    #[test]
    fn test_score_floors_at_ten() {
        let clock = ManualClock::new();
        let mut game = MemoryGame::new(None, None, 2);
        let pairs = pair_positions(&game);
        let (a, b) = pairs[0];
        let (c, d) = pairs[1];

        // churn mismatches to inflate the move count past the floor
        for _ in 0..20 {
            game.flip(a, &clock);
            game.flip(c, &clock);
            clock.advance_ms(1000);
            game.on_tick(&clock);
        }
        game.flip(a, &clock);
        game.flip(b, &clock);
        game.flip(c, &clock);
        game.flip(d, &clock);

        assert!(game.is_completed());
        assert_eq!(game.score(), Some(10));
    }

    #[test]
    fn test_completion_submits_score_with_move_count_duration() {
        let store = CountingStore::default();
        let rows = store.rows.clone();
        let (ntx, _nrx) = mpsc::channel();
        let recorder = Recorder::spawn(store, ntx);

        let clock = ManualClock::new();
        let mut game = MemoryGame::new(Some("user-1".to_string()), Some(recorder), 3);
        for (a, b) in pair_positions(&game) {
            game.flip(a, &clock);
            game.flip(b, &clock);
        }
        assert!(game.is_completed());

        drop(game); // joins the recorder worker

        let rows = rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].score, 85); // 100 - 5 * 3
        assert_eq!(rows[0].duration, 3);
    }

    #[test]
    fn test_flips_after_completion_are_ignored() {
        let clock = ManualClock::new();
        let mut game = MemoryGame::new(None, None, 2);
        for (a, b) in pair_positions(&game) {
            game.flip(a, &clock);
            game.flip(b, &clock);
        }
        assert!(game.is_completed());

        let moves = game.moves();
        game.flip(0, &clock);
        assert_eq!(game.moves(), moves);
    }

    #[test]
    fn test_restart_resets_board() {
        let clock = ManualClock::new();
        let mut game = MemoryGame::new(None, None, 4);
        let (a, b) = pair_positions(&game)[0];
        game.flip(a, &clock);
        game.flip(b, &clock);

        game.restart();

        assert_eq!(game.len(), 8);
        assert_eq!(game.moves(), 0);
        assert_eq!(game.matched_pairs(), 0);
        assert!(!game.is_completed());
    }
}
