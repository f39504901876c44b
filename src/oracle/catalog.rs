//! Video catalog, round issuing and the issued-round book

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use super::{GameMode, OracleError};
use crate::types::*;

/// Comments a video needs before it can become a round
pub const MIN_COMMENTS: usize = 4;

/// Wrong options shown next to the top comment
pub const DISTRACTORS: usize = 3;

/// Issued rounds kept for scoring
pub const ROUND_BOOK_CAPACITY: usize = 50;

const VIDEO_LINK: &str = "https://www.youtube.com/shorts/";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogComment {
    pub id: CommentId,
    pub text: String,
    pub likes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogVideo {
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    pub comments: Vec<CatalogComment>,
}

impl CatalogVideo {
    /// Most-liked comment first, blank and reserved comments dropped
    fn ranked_comments(&self) -> Vec<&CatalogComment> {
        let mut comments: Vec<&CatalogComment> = self
            .comments
            .iter()
            .filter(|c| !c.text.trim().is_empty() && !c.id.is_empty() && c.id != NO_ANSWER)
            .collect();
        comments.sort_by(|a, b| b.likes.cmp(&a.likes));
        let mut seen = HashSet::new();
        comments.retain(|c| seen.insert(c.id.as_str()));
        comments
    }

    pub fn is_playable(&self) -> bool {
        self.ranked_comments().len() >= MIN_COMMENTS
    }
}

/// The videos rounds are drawn from
#[derive(Debug, Clone)]
pub struct Catalog {
    videos: Vec<CatalogVideo>,
}

impl Catalog {
    /// Keep only playable videos; fail if none remain
    pub fn new(videos: Vec<CatalogVideo>) -> Result<Self, OracleError> {
        let total = videos.len();
        let videos: Vec<CatalogVideo> = videos.into_iter().filter(|v| v.is_playable()).collect();
        if videos.is_empty() {
            return Err(OracleError::NoPlayableVideos);
        }
        if videos.len() < total {
            tracing::warn!(
                "Skipping {} of {} catalog videos with fewer than {} usable comments",
                total - videos.len(),
                total,
                MIN_COMMENTS
            );
        }
        Ok(Self { videos })
    }

    pub fn load(path: &Path) -> Result<Self, OracleError> {
        let raw = std::fs::read_to_string(path).map_err(|source| OracleError::CatalogIo {
            path: path.display().to_string(),
            source,
        })?;
        let videos: Vec<CatalogVideo> = serde_json::from_str(&raw)?;
        let catalog = Self::new(videos)?;
        tracing::info!(
            "Loaded {} playable videos from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    fn len(&self) -> usize {
        self.videos.len()
    }

    /// Draw `count` rounds, using distinct videos while there are enough
    pub fn issue<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        count: usize,
        duration: i64,
    ) -> Vec<IssuedRound> {
        let mut picked: Vec<&CatalogVideo> = self.videos.choose_multiple(rng, count).collect();
        while picked.len() < count {
            match self.videos.choose(rng) {
                Some(video) => picked.push(video),
                None => break,
            }
        }

        picked
            .into_iter()
            .filter_map(|video| IssuedRound::draw(rng, video, duration))
            .collect()
    }
}

/// A round handed out to a player, with what is needed to score it
#[derive(Debug, Clone)]
pub struct IssuedRound {
    pub round: Round,
    pub title: String,
    pub top_comment_id: CommentId,
    likes: HashMap<CommentId, u64>,
}

impl IssuedRound {
    /// Top comment plus sampled distractors, shuffled
    pub fn draw<R: Rng + ?Sized>(
        rng: &mut R,
        video: &CatalogVideo,
        duration: i64,
    ) -> Option<Self> {
        let ranked = video.ranked_comments();
        let (top, rest) = ranked.split_first()?;
        if rest.len() < DISTRACTORS {
            return None;
        }

        let mut chosen: Vec<&CatalogComment> =
            rest.choose_multiple(rng, DISTRACTORS).copied().collect();
        chosen.push(*top);
        chosen.shuffle(rng);

        let round = Round {
            round_id: ulid::Ulid::new().to_string(),
            media_reference: format!("{}{}", VIDEO_LINK, video.video_id),
            time_budget: duration,
            options: chosen
                .iter()
                .map(|c| CommentOption {
                    comment_id: c.id.clone(),
                    text: c.text.clone(),
                })
                .collect(),
        };

        Some(Self {
            round,
            title: video.title.clone(),
            top_comment_id: top.id.clone(),
            likes: chosen.iter().map(|c| (c.id.clone(), c.likes)).collect(),
        })
    }

    /// Score `comment_id` and reveal every option, most liked first
    pub fn score(&self, comment_id: &str, mode: GameMode) -> Result<Verdict, OracleError> {
        let is_correct = if comment_id == NO_ANSWER {
            false
        } else if !self.round.has_option(comment_id) {
            return Err(OracleError::InvalidGuess);
        } else {
            match mode {
                GameMode::Guess => comment_id == self.top_comment_id,
                GameMode::Avoid => comment_id != self.top_comment_id,
            }
        };

        let mut revealed_options: Vec<RevealedOption> = self
            .round
            .options
            .iter()
            .map(|o| RevealedOption {
                comment_id: o.comment_id.clone(),
                text: o.text.clone(),
                like_count: self.likes.get(&o.comment_id).copied().unwrap_or(0),
                is_top_comment: o.comment_id == self.top_comment_id,
            })
            .collect();
        revealed_options.sort_by(|a, b| b.like_count.cmp(&a.like_count));

        Ok(Verdict {
            is_correct,
            selected_option_id: comment_id.to_string(),
            revealed_options,
        })
    }
}

/// Issued rounds awaiting a guess, oldest evicted past capacity
#[derive(Debug)]
pub struct RoundBook {
    capacity: usize,
    order: VecDeque<RoundId>,
    rounds: HashMap<RoundId, IssuedRound>,
}

impl Default for RoundBook {
    fn default() -> Self {
        Self::with_capacity(ROUND_BOOK_CAPACITY)
    }
}

impl RoundBook {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
            rounds: HashMap::new(),
        }
    }

    pub fn insert(&mut self, issued: IssuedRound) {
        let id = issued.round.round_id.clone();
        if self.rounds.insert(id.clone(), issued).is_none() {
            self.order.push_back(id);
        }
        while self.rounds.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.rounds.remove(&oldest);
            tracing::debug!("Evicted unscored round {}", oldest);
        }
    }

    pub fn get(&self, round_id: &str) -> Option<&IssuedRound> {
        self.rounds.get(round_id)
    }

    /// Remove a round once it has been scored
    pub fn remove(&mut self, round_id: &str) -> Option<IssuedRound> {
        let removed = self.rounds.remove(round_id)?;
        self.order.retain(|id| id != round_id);
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }
}
