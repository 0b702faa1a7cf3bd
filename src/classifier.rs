// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Keyword heuristic for spam-like message bodies.
//!
//! The verdict only feeds sender reputation. It never blocks delivery.

/// Link-bait, promotional and prize tokens.
pub const DEFAULT_SPAM_KEYWORDS: &[&str] = &[
    "http", "www", ".com", "free", "discount", "prize", "gift", "crypto", "nft",
];

/// Classification verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Clean,
    Spammy,
}

impl Verdict {
    pub fn is_spammy(self) -> bool {
        matches!(self, Verdict::Spammy)
    }
}

/// Case-insensitive substring classifier over a fixed keyword set.
#[derive(Debug, Clone)]
pub struct ContentClassifier {
    /// Lowercased, deduplicated keywords
    keywords: Vec<String>,
}

impl Default for ContentClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_SPAM_KEYWORDS.iter().copied())
    }
}

impl ContentClassifier {
    /// Build a classifier from a keyword list.
    pub fn new<'a>(keywords: impl IntoIterator<Item = &'a str>) -> Self {
        let mut keywords: Vec<String> = keywords.into_iter().map(str::to_lowercase).collect();
        keywords.sort();
        keywords.dedup();
        Self { keywords }
    }

    /// Keywords present in `body`, each reported once.
    pub fn matches<'s>(&'s self, body: &str) -> Vec<&'s str> {
        let lowered = body.to_lowercase();
        self.keywords
            .iter()
            .filter(|keyword| lowered.contains(keyword.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// `Spammy` iff more than one distinct keyword matches.
    pub fn classify(&self, body: &str) -> Verdict {
        if self.matches(body).len() > 1 {
            Verdict::Spammy
        } else {
            Verdict::Clean
        }
    }
}
