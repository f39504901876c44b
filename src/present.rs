//! Plain-text rendering of a session for terminal front-ends

use chrono::NaiveDate;
use reqwest::Url;
use std::fmt::Write;

use crate::session::Session;
use crate::types::*;

/// Compact like counts: `999`, `1.2K`, `3.4M`
pub fn format_likes(value: u64) -> String {
    const UNITS: [(u64, &str); 4] = [
        (1_000, "K"),
        (1_000_000, "M"),
        (1_000_000_000, "B"),
        (1_000_000_000_000, "T"),
    ];

    if value < 1_000 {
        return value.to_string();
    }

    let tenths_of = |unit: usize| (value as f64 / UNITS[unit].0 as f64 * 10.0).round() as u64;

    let mut unit = UNITS
        .iter()
        .rposition(|(size, _)| value >= *size)
        .unwrap_or(0);
    let mut tenths = tenths_of(unit);
    // 999_960 is "1M", not "1000K"
    if tenths >= 10_000 && unit + 1 < UNITS.len() {
        unit += 1;
        tenths = tenths_of(unit);
    }

    let suffix = UNITS[unit].1;
    if tenths % 10 == 0 {
        format!("{}{}", tenths / 10, suffix)
    } else {
        format!("{}.{}{}", tenths / 10, tenths % 10, suffix)
    }
}

/// Embeddable player URL for a watch or shorts link.
/// Returns `url` unchanged if no video id can be found.
pub fn embed_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        tracing::debug!("Not a URL, leaving media reference as is: {}", url);
        return url.to_string();
    };

    let video_id = parsed
        .query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.into_owned())
        .or_else(|| {
            parsed
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(str::to_string)
        });

    match video_id {
        Some(id) if !id.is_empty() => format!(
            "https://www.youtube.com/embed/{}?rel=0&modestbranding=1&enablejsapi=1",
            id
        ),
        _ => url.to_string(),
    }
}

pub fn render_briefing(session: &Session) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== COMMENT GUESSER ===");
    let _ = writeln!(
        out,
        "Watch the video, then pick one of its comments. The reveal shows every like count."
    );
    let _ = writeln!(
        out,
        "One pick per round. Run out of time and the round counts as a miss."
    );
    if session.streak > 0 {
        let _ = writeln!(out, "Current streak: {}", session.streak);
    }

    if session.loading {
        let _ = writeln!(out, "\nLoading rounds...");
    } else if let Some(error) = &session.last_error {
        let _ = writeln!(out, "\n! {}", error);
        let _ = writeln!(out, "Type 'start' to try again.");
    } else {
        let _ = writeln!(out, "\nType 'start' to begin.");
    }
    out
}

pub fn render_round(session: &Session) -> String {
    let mut out = String::new();
    let Some(round) = session.current_round() else {
        return out;
    };

    let _ = writeln!(
        out,
        "--- Round {}/{} ---",
        session.current_index + 1,
        session.total_rounds()
    );
    let _ = writeln!(out, "Video: {}", embed_url(&round.media_reference));
    if let Some(left) = session.time_left {
        let _ = writeln!(out, "Time left: {}s", left);
    }

    let locked = session.locked_choice.as_ref().map(Choice::wire_id);
    for (i, option) in round.options.iter().enumerate() {
        let mark = if locked == Some(option.comment_id.as_str()) {
            ">"
        } else {
            " "
        };
        let _ = writeln!(out, "{} [{}] {}", mark, i + 1, option.text);
    }

    match &session.locked_choice {
        Some(Choice::NoAnswer) => {
            let _ = writeln!(out, "Time's up. Scoring...");
        }
        Some(Choice::Comment(_)) => {
            let _ = writeln!(out, "Guess locked. Scoring...");
        }
        None => {}
    }
    if let Some(error) = &session.last_error {
        let _ = writeln!(out, "! {}", error);
        let _ = writeln!(out, "Type 'retry' to resend your guess.");
    }
    out
}

/// End-of-session report, dated `date`
pub fn render_report(session: &Session, date: NaiveDate) -> String {
    let mut out = String::new();
    let header = match session.phase {
        SessionPhase::Won => "MISSION COMPLETE",
        SessionPhase::Lost => "FAILURE",
        _ => "IN PROGRESS",
    };

    let _ = writeln!(out, "=== {} ===", header);
    let _ = writeln!(out, "Date: {}", date.format("%Y-%m-%d"));
    let _ = writeln!(
        out,
        "Completed {}/{}",
        session.rounds_cleared(),
        session.total_rounds()
    );
    let _ = writeln!(out, "Current streak: {}", session.streak);

    if let Some(verdict) = &session.last_verdict {
        let _ = writeln!(out);
        for option in &verdict.revealed_options {
            let mut tags = Vec::new();
            if option.is_top_comment {
                tags.push("top comment");
            }
            if option.comment_id == verdict.selected_option_id {
                tags.push("your pick");
            }
            let tags = if tags.is_empty() {
                String::new()
            } else {
                format!("  <- {}", tags.join(", "))
            };
            let _ = writeln!(
                out,
                "{:>7} likes  {}{}",
                format_likes(option.like_count),
                option.text,
                tags
            );
        }
        if verdict.selected_option_id == NO_ANSWER {
            let _ = writeln!(out, "(no answer before time ran out)");
        }
    }

    if let Some(error) = &session.last_error {
        let _ = writeln!(out, "\n! {}", error);
    }
    let _ = writeln!(out, "\nType 'restart' to play again.");
    out
}
