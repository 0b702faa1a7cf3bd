// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Generators for sender addresses and message bodies.

/// Generate `count` distinct IPv4 addresses in 10.0.0.0/8.
pub fn generate_addresses(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("10.{}.{}.{}", (i >> 16) & 0xff, (i >> 8) & 0xff, i & 0xff))
        .collect()
}

/// Bodies with no spam keywords.
pub fn clean_bodies() -> Vec<&'static str> {
    vec![
        "Your talk yesterday was great.",
        "What book are you reading?",
        "Honest feedback: the slides were too dense.",
        "Do you still play the guitar?",
    ]
}

/// Bodies matching at least two distinct spam keywords.
pub fn spam_bodies() -> Vec<&'static str> {
    vec![
        "FREE crypto giveaway",
        "claim your prize at www.example.com",
        "discount nft drop http://x",
        "free gift inside",
    ]
}

/// Bodies matching exactly one spam keyword.
pub fn borderline_bodies() -> Vec<&'static str> {
    vec![
        "Is the workshop free?",
        "Thanks for the gift!",
        "What do you think about crypto regulation?",
    ]
}
