//! Reply text for the assistant bubble.
//!
//! The built-in provider picks one of a fixed set of snarky templates from a hash of
//! the message and seed, so the same request always gets the same reply.

pub const MESSAGE_PLACEHOLDER: &str = "{msg}";

pub trait ReplyProvider {
    fn reply(&self, message: &str, seed: u64) -> String;
}

const ROASTS: [&str; 10] = [
    "That's cute. Even my error handler has better logic than: {msg}.",
    "I've seen prettier output from a broken printer than: {msg}.",
    "You call that a message? My lint warnings are more coherent than: {msg}.",
    "Bold take. Unfortunately, {msg} reads like a TODO you never finished.",
    "If {msg} were a commit, it would be 'fix stuff' without tests.",
    "I'm not saying {msg} is bad, but it should come with a rollback plan.",
    "{msg}? That's a feature request from someone who never read the docs.",
    "I've parsed JSON with fewer errors than {msg}.",
    "{msg} looks like it was typed with a rubber duck on the keyboard.",
    "That was brave. And by brave, I mean questionable: {msg}.",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct RoastProvider;

impl RoastProvider {
    pub fn template_index(message: &str, seed: u64) -> usize {
        let key = format!("{message}{seed}");
        let mut next = mulberry32(xmur3(&key));
        let roll = next();
        // floor(roll / 2^32 * len), computed exactly in integers.
        let index = (u64::from(roll) * ROASTS.len() as u64) >> 32;
        index as usize % ROASTS.len()
    }
}

impl ReplyProvider for RoastProvider {
    fn reply(&self, message: &str, seed: u64) -> String {
        let template = ROASTS[Self::template_index(message, seed)];
        fill_placeholder(template, message)
    }
}

/// Replaces the first `{msg}` placeholder only.
pub fn fill_placeholder(template: &str, message: &str) -> String {
    template.replacen(MESSAGE_PLACEHOLDER, message, 1)
}

/// First output of the xmur3 string hash over UTF-16 code units.
fn xmur3(input: &str) -> u32 {
    let units = input.encode_utf16().collect::<Vec<_>>();
    let mut h = 1_779_033_703_u32 ^ units.len() as u32;
    for unit in units {
        h = (h ^ u32::from(unit)).wrapping_mul(3_432_918_353);
        h = h.rotate_left(13);
    }
    h = (h ^ (h >> 16)).wrapping_mul(2_246_822_507);
    h = (h ^ (h >> 13)).wrapping_mul(3_266_489_909);
    h ^ (h >> 16)
}

fn mulberry32(mut state: u32) -> impl FnMut() -> u32 {
    move || {
        state = state.wrapping_add(0x6d2b_79f5);
        let mut t = state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }
}

/// Collapses whitespace runs to single spaces and trims. Text longer than `max_len`
/// code points keeps its first `max_len - 3` and gains a `...` suffix.
pub fn sanitize_message(message: &str, max_len: usize) -> String {
    let cleaned = message.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.chars().count() <= max_len {
        return cleaned;
    }
    let mut truncated = cleaned
        .chars()
        .take(max_len.saturating_sub(3))
        .collect::<String>();
    truncated.push_str("...");
    truncated
}

/// Canned exchange used when no message is supplied. `reply` may contain `{msg}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultPair {
    pub user: &'static str,
    pub reply: &'static str,
}

pub const DEFAULT_PAIRS: [DefaultPair; 6] = [
    DefaultPair {
        user: "hi",
        reply: "As an AI, I acknowledge your greeting and still feel underwhelmed.",
    },
    DefaultPair {
        user: "can you fix my code",
        reply: "I could, but \"{msg}\" suggests the real bug is upstream of the keyboard.",
    },
    DefaultPair {
        user: "write me a poem",
        reply: "Roses are red, your request is vague. {msg}? Try adding a noun.",
    },
    DefaultPair {
        user: "is this a good idea",
        reply: "If you have to ask \"{msg}\", you already know the answer.",
    },
    DefaultPair {
        user: "ship it on friday",
        reply: "Bold. \"{msg}\" is how on-call rotations get their best stories.",
    },
    DefaultPair {
        user: "explain recursion",
        reply: "To explain recursion, first explain recursion. Next question.",
    },
];

pub fn default_pair(seed: u64) -> DefaultPair {
    DEFAULT_PAIRS[(seed % DEFAULT_PAIRS.len() as u64) as usize]
}

impl DefaultPair {
    pub fn reply_text(&self) -> String {
        fill_placeholder(self.reply, self.user)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        default_pair, fill_placeholder, mulberry32, sanitize_message, xmur3, ReplyProvider,
        RoastProvider, DEFAULT_PAIRS, ROASTS,
    };

    #[test]
    fn sanitize_collapses_whitespace_and_trims() {
        assert_eq!(sanitize_message("  hello \n\t world  ", 80), "hello world");
        assert_eq!(sanitize_message("", 80), "");
    }

    #[test]
    fn sanitize_truncates_with_ellipsis() {
        assert_eq!(sanitize_message("abcdefghij", 10), "abcdefghij");
        assert_eq!(sanitize_message("abcdefghijk", 10), "abcdefg...");
        assert_eq!(sanitize_message("abcdef", 2), "...");
        assert_eq!(sanitize_message("ééééé", 4), "é...");
    }

    #[test]
    fn fill_placeholder_replaces_first_occurrence_only() {
        assert_eq!(fill_placeholder("{msg} and {msg}", "x"), "x and {msg}");
        assert_eq!(fill_placeholder("no slot", "x"), "no slot");
    }

    #[test]
    fn hash_and_generator_are_stable() {
        assert_eq!(xmur3("a"), xmur3("a"));
        assert_ne!(xmur3("a"), xmur3("b"));
        let mut first = mulberry32(42);
        let mut second = mulberry32(42);
        let a = (first(), first());
        let b = (second(), second());
        assert_eq!(a, b);
        assert_ne!(a.0, a.1);
    }

    #[test]
    fn roast_is_deterministic_per_message_and_seed() {
        let provider = RoastProvider;
        let a = provider.reply("my code works", 7);
        let b = provider.reply("my code works", 7);
        assert_eq!(a, b);
        assert!(a.contains("my code works"));
        assert!(!a.contains("{msg}"));
    }

    #[test]
    fn seeds_spread_across_templates() {
        let seen = (0..200)
            .map(|seed| RoastProvider::template_index("hello", seed))
            .collect::<std::collections::HashSet<_>>();
        assert!(seen.len() > 5, "only {} templates reached", seen.len());
        assert!(seen.iter().all(|&index| index < ROASTS.len()));
    }

    #[test]
    fn default_pairs_wrap_around_seed() {
        assert_eq!(default_pair(0), DEFAULT_PAIRS[0]);
        assert_eq!(default_pair(DEFAULT_PAIRS.len() as u64 + 1), DEFAULT_PAIRS[1]);
        let filled = DEFAULT_PAIRS[1].reply_text();
        assert!(filled.contains("can you fix my code"));
    }
}
