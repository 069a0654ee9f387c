// src/dashboard/history.rs

use std::collections::VecDeque;

use serde::Deserialize;
use utoipa::ToSchema;

use crate::models::{Generation, GenerationType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HistoryFilter {
    #[default]
    All,
    Title,
    Image,
    Youtube,
}

impl HistoryFilter {
    pub fn generation_type(&self) -> Option<GenerationType> {
        match self {
            HistoryFilter::All => None,
            HistoryFilter::Title => Some(GenerationType::TextToThumbnail),
            HistoryFilter::Image => Some(GenerationType::ImageToThumbnail),
            HistoryFilter::Youtube => Some(GenerationType::YoutubeToThumbnail),
        }
    }
}

/// Newest-first generations kept in memory, at most `capacity` of them.
/// Older entries are only reachable through paginated fetches.
#[derive(Debug)]
pub struct History {
    items: VecDeque<Generation>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Puts `generation` at the head; an existing entry with the same id is moved, not duplicated.
    pub fn prepend(&mut self, generation: Generation) {
        self.items.retain(|g| g.id != generation.id);
        self.items.push_front(generation);
        self.items.truncate(self.capacity);
    }

    /// Replaces the contents with a freshly fetched first page.
    pub fn replace(&mut self, generations: Vec<Generation>) {
        self.items.clear();
        for generation in generations {
            if self.items.len() == self.capacity {
                break;
            }
            if !self.items.iter().any(|g| g.id == generation.id) {
                self.items.push_back(generation);
            }
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn recent(&self, n: usize) -> Vec<Generation> {
        self.items.iter().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
