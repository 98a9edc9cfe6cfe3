//! Scripted conversation timeline: intro, user typing, send, reply typing, idle.
//!
//! The generator is a pure function of the two final strings, so identical inputs always
//! yield identical frame lists.

use serde::Serialize;

pub const INTRO_FRAMES: usize = 6;
pub const SEND_FRAMES: usize = 3;
pub const IDLE_FRAMES: usize = 24;
pub const USER_TYPING_CAP: usize = 40;
pub const REPLY_TYPING_CAP: usize = 70;
pub const MAX_FRAMES: usize = 120;

/// Caret is lit for the first half of every ten-frame cycle.
pub const BLINK_PERIOD: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Intro,
    UserTyping,
    Send,
    ReplyTyping,
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameState {
    pub frame_index: u32,
    pub phase: Phase,
    /// Uncommitted text in the input bar.
    pub user_input: String,
    pub show_user_bubble: bool,
    /// Reply text revealed so far; empty until the reply starts typing.
    pub reply_text: String,
    pub send_pressed: bool,
}

impl FrameState {
    pub fn caret_visible(&self) -> bool {
        caret_on(self.frame_index)
    }
}

pub fn caret_on(frame_index: u32) -> bool {
    frame_index % BLINK_PERIOD < BLINK_PERIOD / 2
}

/// Characters revealed per typing frame, fixed once for the whole phase.
pub fn reveal_step(len: usize, cap: usize) -> usize {
    ((len + cap - 1) / cap).max(1)
}

/// Progressive prefixes of `text`, counted in code points.
///
/// Yields `ceil(len / step)` prefixes starting at one character and advancing by
/// `step`; the final prefix is always the whole string.
pub fn reveal_prefixes(text: &str, cap: usize) -> Vec<String> {
    let chars = text.chars().collect::<Vec<_>>();
    let len = chars.len();
    if len == 0 {
        return Vec::new();
    }

    let step = reveal_step(len, cap);
    let count = (len + step - 1) / step;
    (0..count)
        .map(|k| {
            let shown = if k + 1 == count { len } else { 1 + k * step };
            chars[..shown].iter().collect()
        })
        .collect()
}

pub fn expected_frame_count(user_len: usize, reply_len: usize) -> usize {
    let typed = |len: usize, cap: usize| {
        if len == 0 {
            0
        } else {
            let step = reveal_step(len, cap);
            (len + step - 1) / step
        }
    };
    let total = INTRO_FRAMES
        + typed(user_len, USER_TYPING_CAP)
        + SEND_FRAMES
        + typed(reply_len, REPLY_TYPING_CAP)
        + IDLE_FRAMES;
    total.min(MAX_FRAMES)
}

struct Timeline {
    frames: Vec<FrameState>,
}

impl Timeline {
    fn push(
        &mut self,
        phase: Phase,
        user_input: &str,
        show_user_bubble: bool,
        reply_text: &str,
        send_pressed: bool,
    ) {
        let frame_index = self.frames.len() as u32;
        self.frames.push(FrameState {
            frame_index,
            phase,
            user_input: user_input.to_owned(),
            show_user_bubble,
            reply_text: reply_text.to_owned(),
            send_pressed,
        });
    }
}

/// Builds the full frame list for a conversation, truncated to [`MAX_FRAMES`].
pub fn build_frame_states(user_text: &str, reply_text: &str) -> Vec<FrameState> {
    let frame_count = expected_frame_count(user_text.chars().count(), reply_text.chars().count());
    let mut timeline = Timeline {
        frames: Vec::with_capacity(frame_count),
    };

    for _ in 0..INTRO_FRAMES {
        timeline.push(Phase::Intro, "", false, "", false);
    }

    for prefix in reveal_prefixes(user_text, USER_TYPING_CAP) {
        timeline.push(Phase::UserTyping, &prefix, false, "", false);
    }

    for i in 0..SEND_FRAMES {
        timeline.push(Phase::Send, "", true, "", i + 1 < SEND_FRAMES);
    }

    for prefix in reveal_prefixes(reply_text, REPLY_TYPING_CAP) {
        timeline.push(Phase::ReplyTyping, "", true, &prefix, false);
    }

    for _ in 0..IDLE_FRAMES {
        timeline.push(Phase::Idle, "", true, reply_text, false);
    }

    let mut frames = timeline.frames;
    frames.truncate(frame_count);
    frames
}
