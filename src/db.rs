use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;

/// Catalog rows seeded at startup. Saves resolve a human-readable title to
/// one of these ids; a title with no row is an error, never a default.
pub const GAME_CATALOG: &[(&str, &str)] = &[
    ("reaction-game", "Reaction Game"),
    ("memory-game", "Memory Game"),
];

/// One persisted play, as written by the recorder
#[derive(Debug, Clone)]
pub struct SessionRow {
    pub user_id: String,
    pub game_id: String,
    pub score: i64,
    /// Secondary metric: latency for the reaction game, move count for the
    /// memory game. Not guaranteed to mirror `score`.
    pub duration: i64,
    pub timestamp: DateTime<Local>,
}

/// One recorded play joined with its catalog title, for the history screen
#[derive(Debug, Clone)]
pub struct HistoryRow {
    pub user_id: String,
    pub game_title: String,
    pub score: i64,
    pub duration: i64,
    pub timestamp: DateTime<Local>,
}

/// Per-game aggregate for the history screen
#[derive(Debug, Clone)]
pub struct GameSummaryRow {
    pub game_id: String,
    pub title: String,
    pub plays: i64,
    pub min_score: i64,
    pub max_score: i64,
    pub avg_score: f64,
    pub last_played: Option<DateTime<Local>>,
}

/// Database manager for the game catalog and recorded plays
#[derive(Debug)]
pub struct ScoreDb {
    conn: Connection,
}

impl ScoreDb {
    /// Open (or create) the database at the default state path
    pub fn new() -> Result<Self> {
        let db_path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("blink_scores.db"));
        Self::open(&db_path)
    }

    /// Open (or create) the database at an explicit path
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }

        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    /// Bootstrap schema and catalog on an existing connection
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS games (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL UNIQUE
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS game_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                game_id TEXT NOT NULL,
                score INTEGER NOT NULL,
                duration INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_game_sessions_game ON game_sessions(game_id)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_game_sessions_timestamp ON game_sessions(timestamp)",
            [],
        )?;

        for (id, title) in GAME_CATALOG {
            conn.execute(
                "INSERT OR IGNORE INTO games (id, title) VALUES (?1, ?2)",
                params![id, title],
            )?;
        }

        Ok(ScoreDb { conn })
    }

    /// Resolve a display title to its opaque game id
    pub fn resolve_game_id(&self, title: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT id FROM games WHERE title = ?1", [title], |row| {
                row.get(0)
            })
            .optional()
    }

    /// Record one play
    pub fn insert_session(&self, row: &SessionRow) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO game_sessions (user_id, game_id, score, duration, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                row.user_id,
                row.game_id,
                row.score,
                row.duration,
                row.timestamp.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// Most recent plays, newest first
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<HistoryRow>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT s.user_id, g.title, s.score, s.duration, s.timestamp
            FROM game_sessions s
            JOIN games g ON g.id = s.game_id
            ORDER BY s.timestamp DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let timestamp_str: String = row.get(4)?;
            let timestamp = parse_timestamp(&timestamp_str, 4)?;

            Ok(HistoryRow {
                user_id: row.get(0)?,
                game_title: row.get(1)?,
                score: row.get(2)?,
                duration: row.get(3)?,
                timestamp,
            })
        })?;

        rows.collect()
    }

    /// Per-game aggregates across all recorded plays
    pub fn game_summaries(&self) -> Result<Vec<GameSummaryRow>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                g.id,
                g.title,
                COUNT(s.id) as plays,
                MIN(s.score),
                MAX(s.score),
                AVG(s.score),
                MAX(s.timestamp)
            FROM games g
            LEFT JOIN game_sessions s ON s.game_id = g.id
            GROUP BY g.id
            ORDER BY g.title
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let plays: i64 = row.get(2)?;
            let last_played: Option<String> = row.get(6)?;
            let last_played = match last_played {
                Some(ts) => Some(parse_timestamp(&ts, 6)?),
                None => None,
            };

            Ok(GameSummaryRow {
                game_id: row.get(0)?,
                title: row.get(1)?,
                plays,
                min_score: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                max_score: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
                avg_score: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
                last_played,
            })
        })?;

        rows.collect()
    }

    /// Export every recorded play as CSV, newest first
    pub fn export_csv<W: Write>(&self, out: W) -> Result<(), Box<dyn std::error::Error>> {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(["timestamp", "user", "game", "score", "duration"])?;

        for row in self.recent_sessions(i64::MAX as usize)? {
            writer.write_record([
                row.timestamp.to_rfc3339(),
                row.user_id,
                row.game_title,
                row.score.to_string(),
                row.duration.to_string(),
            ])?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Remove all recorded plays (reset; catalog rows are kept)
    pub fn clear_sessions(&self) -> Result<()> {
        self.conn.execute("DELETE FROM game_sessions", [])?;
        Ok(())
    }
}

fn parse_timestamp(raw: &str, column: usize) -> Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                column,
                "timestamp".to_string(),
                rusqlite::types::Type::Text,
            )
        })
}
