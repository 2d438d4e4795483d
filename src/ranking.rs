use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::AuthorStats;

/// Accepted answers weigh five times a plain answer.
pub const ACCEPTED_WEIGHT: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RankingWindow {
    Weekly,
    Monthly,
    Overall,
}

impl RankingWindow {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "weekly" => Some(RankingWindow::Weekly),
            "monthly" => Some(RankingWindow::Monthly),
            "overall" => Some(RankingWindow::Overall),
            _ => None,
        }
    }

    /// Lower bound of the window, `None` for the unbounded board.
    /// Weekly rolls back seven days; monthly starts at the first of the
    /// current calendar month.
    pub fn start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            RankingWindow::Weekly => Some(now - chrono::Duration::days(7)),
            RankingWindow::Monthly => Utc
                .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
                .single(),
            RankingWindow::Overall => None,
        }
    }

    pub fn top_n(&self) -> usize {
        match self {
            RankingWindow::Weekly | RankingWindow::Monthly => 50,
            RankingWindow::Overall => 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RankingRow {
    /// 1-based position; ties receive consecutive distinct ranks.
    pub rank: u32,
    pub author: String,
    pub user_name: Option<String>,
    pub answers: i64,
    pub accepted: i64,
    pub score: i64,
}

pub fn score(answers: i64, accepted: i64) -> i64 {
    answers + accepted * ACCEPTED_WEIGHT
}

/// Order author aggregates into a board: score desc, then accepted desc,
/// then answers desc, truncated to the window's top-N. Display names are
/// resolved by the caller.
pub fn leaderboard(mut stats: Vec<AuthorStats>, top_n: usize) -> Vec<RankingRow> {
    stats.sort_by(|a, b| {
        score(b.answers, b.accepted)
            .cmp(&score(a.answers, a.accepted))
            .then(b.accepted.cmp(&a.accepted))
            .then(b.answers.cmp(&a.answers))
    });
    stats.truncate(top_n);
    stats
        .into_iter()
        .enumerate()
        .map(|(i, s)| RankingRow {
            rank: (i + 1) as u32,
            author: s.author,
            user_name: None,
            answers: s.answers,
            accepted: s.accepted,
            score: score(s.answers, s.accepted),
        })
        .collect()
}
