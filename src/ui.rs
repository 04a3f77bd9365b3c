use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Widget, Wrap},
};
use time_humanize::HumanTime;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::db::{GameSummaryRow, HistoryRow};
use crate::memory::{CardFace, MemoryGame};
use crate::notice::{Notice, NoticeKind};
use crate::reaction::{ReactionGame, RoundState};
use crate::session::SessionSummary;
use crate::util::std_dev;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

/// Columns on the memory board
pub const MEMORY_GRID_COLS: usize = 4;

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim_bold() -> Style {
    bold().add_modifier(Modifier::DIM)
}

/// Reaction screen: a state-colored signal panel with the round message,
/// flanked by the last/best/session stats line.
pub struct ReactionView<'a> {
    pub game: &'a ReactionGame,
}

impl Widget for ReactionView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (panel_color, state_label) = match self.game.state() {
            RoundState::Idle => (Color::DarkGray, "idle"),
            RoundState::Armed => (Color::Red, "wait"),
            RoundState::Triggered => (Color::Green, "go!"),
            RoundState::Resolved if self.game.faulted() => (Color::Yellow, "too soon"),
            RoundState::Resolved => (Color::Cyan, "done"),
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints(
                [
                    Constraint::Min(5),    // signal panel
                    Constraint::Length(1), // padding
                    Constraint::Length(1), // stats
                    Constraint::Length(1), // legend
                ]
                .as_ref(),
            )
            .split(area);

        let panel = Paragraph::new(vec![
            Line::default(),
            Line::from(Span::styled(
                self.game.message().to_string(),
                bold().fg(Color::White),
            )),
        ])
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(panel_color))
                .title(Span::styled(state_label, bold().fg(panel_color))),
        );
        panel.render(chunks[0], buf);

        let summary = self.game.summary();
        let stats = format!(
            "last: {}   best: {}   session: {} rounds, avg {}",
            self.game
                .last_latency_ms()
                .map_or("--".to_string(), |ms| format!("{}ms", ms)),
            self.game
                .best_ms()
                .map_or("--".to_string(), |ms| format!("{}ms", ms)),
            summary.count,
            if summary.count == 0 {
                "--".to_string()
            } else {
                format!("{}ms", summary.average_ms)
            },
        );
        Paragraph::new(Span::styled(stats, bold()))
            .alignment(Alignment::Center)
            .render(chunks[2], buf);

        Paragraph::new(Span::styled(
            "(space) play  (s)ummary  (h)istory  (d)ismiss  (tab) switch game  (esc) quit",
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);
    }
}

/// Memory screen: the card grid with a keyboard cursor plus move/progress
/// counters and, once solved, the final score banner.
pub struct MemoryView<'a> {
    pub game: &'a MemoryGame,
    pub cursor: usize,
}

impl Widget for MemoryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let rows_needed = self.game.len().div_ceil(MEMORY_GRID_COLS) as u16;

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints(
                [
                    Constraint::Length(1),               // counters
                    Constraint::Length(1),               // padding
                    Constraint::Length(rows_needed * 3), // grid
                    Constraint::Length(1),               // banner
                    Constraint::Length(1),               // legend
                ]
                .as_ref(),
            )
            .split(area);

        let counters = format!(
            "moves: {}   matched: {}/{}",
            self.game.moves(),
            self.game.matched_pairs(),
            self.game.total_pairs(),
        );
        Paragraph::new(Span::styled(counters, bold()))
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        let grid_rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![Constraint::Length(3); rows_needed as usize])
            .split(chunks[2]);

        for (row_idx, row_area) in grid_rows.iter().enumerate() {
            let cells = Layout::default()
                .direction(Direction::Horizontal)
                .constraints(vec![
                    Constraint::Ratio(1, MEMORY_GRID_COLS as u32);
                    MEMORY_GRID_COLS
                ])
                .split(*row_area);

            for (col_idx, cell_area) in cells.iter().enumerate() {
                let index = row_idx * MEMORY_GRID_COLS + col_idx;
                let Some((symbol, face)) = self.game.card(index) else {
                    continue;
                };

                let text = match face {
                    CardFace::Hidden => "?".to_string(),
                    CardFace::Revealed | CardFace::Matched => symbol.to_string(),
                };
                let style = match face {
                    CardFace::Hidden => dim_bold(),
                    CardFace::Revealed => bold().fg(Color::Yellow),
                    CardFace::Matched => bold().fg(Color::Green),
                };
                let border_style = if index == self.cursor && !self.game.is_completed() {
                    Style::default().fg(Color::Magenta)
                } else {
                    Style::default().add_modifier(Modifier::DIM)
                };

                Paragraph::new(Span::styled(text, style))
                    .alignment(Alignment::Center)
                    .block(Block::default().borders(Borders::ALL).border_style(border_style))
                    .render(*cell_area, buf);
            }
        }

        if let Some(score) = self.game.score() {
            Paragraph::new(Span::styled(
                format!("Solved in {} moves. Final score: {}", self.game.moves(), score),
                bold().fg(Color::Green),
            ))
            .alignment(Alignment::Center)
            .render(chunks[3], buf);
        }

        Paragraph::new(Span::styled(
            "(arrows) move  (space) flip  (r)estart  (h)istory  (tab) switch game  (esc) quit",
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(chunks[4], buf);
    }
}

/// Session summary overlay: aggregate numbers plus a latency-per-round chart
pub struct SummaryView<'a> {
    pub summary: SessionSummary,
    pub samples: &'a [u64],
}

impl Widget for SummaryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints(
                [
                    Constraint::Min(5),    // chart
                    Constraint::Length(1), // stats
                    Constraint::Length(1), // legend
                ]
                .as_ref(),
            )
            .split(area);

        if self.samples.is_empty() {
            Paragraph::new(Span::styled(
                "No rounds completed yet",
                dim_bold().add_modifier(Modifier::ITALIC),
            ))
            .alignment(Alignment::Center)
            .render(chunks[0], buf);
        } else {
            let coords: Vec<(f64, f64)> = self
                .samples
                .iter()
                .enumerate()
                .map(|(i, &ms)| ((i + 1) as f64, ms as f64))
                .collect();
            let max_latency = self.samples.iter().max().copied().unwrap_or(0) as f64;

            let datasets = vec![Dataset::default()
                .marker(symbols::Marker::Braille)
                .style(Style::default().fg(Color::Magenta))
                .graph_type(GraphType::Line)
                .data(&coords)];

            let chart = Chart::new(datasets)
                .x_axis(
                    Axis::default()
                        .title("round")
                        .style(Style::default().fg(Color::Gray))
                        .bounds([1.0, self.samples.len() as f64])
                        .labels(vec![
                            Span::raw("1"),
                            Span::raw(format!("{}", self.samples.len())),
                        ]),
                )
                .y_axis(
                    Axis::default()
                        .title("ms")
                        .style(Style::default().fg(Color::Gray))
                        .bounds([0.0, max_latency * 1.1])
                        .labels(vec![
                            Span::raw("0"),
                            Span::raw(format!("{:.0}", max_latency * 1.1)),
                        ]),
                );
            chart.render(chunks[0], buf);
        }

        let as_f64: Vec<f64> = self.samples.iter().map(|&ms| ms as f64).collect();
        let sd = std_dev(&as_f64).unwrap_or(0.0);
        let stats = format!(
            "rounds: {}   avg: {}ms   best: {}ms   sd: {:.1}",
            self.summary.count, self.summary.average_ms, self.summary.best_ms, sd,
        );
        Paragraph::new(Span::styled(stats, bold()))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);

        Paragraph::new(Span::styled(
            "(t)weet best  (b)ack  (esc) quit",
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);
    }
}

/// Score history screen backed by the database: per-game aggregates on top,
/// recent plays below.
pub struct HistoryView<'a> {
    pub rows: &'a [HistoryRow],
    pub summaries: &'a [GameSummaryRow],
    pub scroll: usize,
}

impl Widget for HistoryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints(
                [
                    Constraint::Length(2), // per-game summary
                    Constraint::Min(1),    // rows
                    Constraint::Length(1), // legend
                ]
                .as_ref(),
            )
            .split(area);

        let summary_line = self
            .summaries
            .iter()
            .map(|s| {
                if s.plays == 0 {
                    format!("{}: no plays", s.title)
                } else {
                    // lower is better for reaction latency, higher for the rest
                    let best = if s.game_id == "reaction-game" {
                        format!("best {}ms", s.min_score)
                    } else {
                        format!("best {}", s.max_score)
                    };
                    format!("{}: {} plays, {}, avg {:.0}", s.title, s.plays, best, s.avg_score)
                }
            })
            .join("   |   ");
        Paragraph::new(Span::styled(summary_line, bold()))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(chunks[0], buf);

        let visible_height = chunks[1].height as usize;
        let lines: Vec<Line> = self
            .rows
            .iter()
            .skip(self.scroll)
            .take(visible_height)
            .map(|row| {
                let when = HumanTime::from(std::time::SystemTime::from(
                    row.timestamp.with_timezone(&chrono::Utc),
                ));
                Line::from(vec![
                    Span::styled(format!("{:<16}", when.to_string()), dim_bold()),
                    Span::raw("  "),
                    Span::styled(format!("{:<14}", row.game_title), bold()),
                    Span::raw("  "),
                    Span::styled(format!("{:>6}", row.score), bold().fg(Color::Cyan)),
                    Span::raw("  "),
                    Span::styled(
                        format!("dur {:>6}  {}", row.duration, row.user_id),
                        Style::default(),
                    ),
                ])
            })
            .collect();

        if lines.is_empty() {
            Paragraph::new(Span::styled(
                "No recorded plays",
                dim_bold().add_modifier(Modifier::ITALIC),
            ))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);
        } else {
            Paragraph::new(lines).render(chunks[1], buf);
        }

        Paragraph::new(Span::styled(
            "(up/down) scroll  (1) time (2) game (3) score  (b)ack  (esc) quit",
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);
    }
}

/// Bottom-anchored transient notices
pub struct NoticeBar<'a> {
    pub notices: Vec<&'a Notice>,
}

impl Widget for NoticeBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if self.notices.is_empty() {
            return;
        }

        let line = self
            .notices
            .iter()
            .map(|n| n.text.as_str())
            .join("  ·  ");
        let style = if self.notices.iter().any(|n| n.kind == NoticeKind::Error) {
            bold().fg(Color::Red)
        } else {
            bold().fg(Color::Green)
        };

        // clamp to the bar width rather than wrapping over the game area
        let clamped = clamp_to_width(line, area.width as usize);

        Paragraph::new(Span::styled(clamped, style))
            .alignment(Alignment::Center)
            .render(area, buf);
    }
}

/// Truncate by display width; wide glyphs count double, so counting
/// chars alone can overrun the bar.
fn clamp_to_width(line: String, max: usize) -> String {
    if line.width() <= max {
        return line;
    }
    let mut used = 0;
    line.chars()
        .take_while(|c| {
            used += c.width().unwrap_or(0);
            used <= max
        })
        .collect()
}

/// Share-intent URL for the results view
pub fn share_url(best_ms: u64, rounds: usize) -> String {
    format!(
        "https://twitter.com/intent/tweet?text={}ms%20best%20reaction%20time%20over%20{}%20rounds%20with%20blink",
        best_ms, rounds
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_url_embeds_numbers() {
        let url = share_url(181, 12);
        assert!(url.contains("181ms"));
        assert!(url.contains("12%20rounds"));
    }

    #[test]
    fn test_memory_grid_is_four_wide() {
        assert_eq!(MEMORY_GRID_COLS, 4);
    }

    #[test]
    fn test_clamp_leaves_short_lines_alone() {
        assert_eq!(clamp_to_width("saved".to_string(), 10), "saved");
    }

    #[test]
    fn test_clamp_counts_wide_glyphs_by_display_width() {
        // each card symbol is two columns wide
        let line = "🐙🐙🐙🐙🐙".to_string();
        let clamped = clamp_to_width(line, 5);
        assert_eq!(clamped.width(), 4);
        assert_eq!(clamped.chars().count(), 2);
    }

    #[test]
    fn test_clamp_truncates_ascii_to_exact_width() {
        let clamped = clamp_to_width("x".repeat(20), 7);
        assert_eq!(clamped.width(), 7);
    }
}
