use crate::passage::PassageWordUnit;
use crate::text::{first_token, normalize_words};

/// Marks passage units as read by walking the transcript and the passage
/// forward together.
///
/// Both cursors only move forward: a transcript token that matches the first
/// normalized token of the current unit advances both, anything else skips the
/// unit. Omitted passage words are therefore tolerated, while an inserted
/// spoken word stalls matching until a later unit happens to line up.
///
/// Marks are only ever added, so calling this again with a longer transcript is
/// safe. Returns the number of units newly marked by this call.
pub fn mark_words_as_read(transcript: &str, units: &mut [PassageWordUnit]) -> usize {
    let transcript_words = normalize_words(transcript);
    if transcript_words.is_empty() || units.is_empty() {
        return 0;
    }

    let passage_words: Vec<String> = units.iter().map(|u| first_token(&u.text)).collect();

    let mut newly_read = 0;
    let mut t_idx = 0;
    let mut p_idx = 0;

    while t_idx < transcript_words.len() && p_idx < passage_words.len() {
        if transcript_words[t_idx] == passage_words[p_idx] {
            if !units[p_idx].read {
                units[p_idx].read = true;
                newly_read += 1;
            }
            t_idx += 1;
        }
        p_idx += 1;
    }

    newly_read
}
