//! Decides, for one inbound message, whether it carries forwardable
//! redemption codes and what exactly those codes are.
//!
//! Everything here is pure and stateless: no I/O, no shared state, safe to
//! call from any number of handlers concurrently. A message that matches
//! nothing yields an empty result, never an error.

/// Codes are exactly this many characters, no more, no less.
pub const CODE_LEN: usize = 8;

/// One message as seen by the pipeline, already detached from the platform's
/// update types. Built by the bot glue, consumed once.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Message text or caption, whichever the platform provided.
    pub text: Option<String>,
    /// Any attachment (photo, video, document, sticker, ...).
    pub has_media: bool,
    /// Any URL or text-link entity in the text or caption.
    pub has_link_entity: bool,
    pub origin_chat_id: i64,
    pub target_chat_id: i64,
}

/// A length-8 run of `A-Z0-9` produced by the scanner, not yet checked for
/// the letter/digit mix. Only [`extract_candidates`] can construct one, so
/// validation never sees a malformed input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate(String);

impl Candidate {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A candidate that passed validation: 8 chars of `A-Z0-9` with at least one
/// letter and at least one digit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedCode(String);

impl ExtractedCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExtractedCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a message should be dropped without scanning its text.
///
/// Media and embedded links disqualify the whole message, not just parts of
/// it: this relay is code-only, and a code travelling with an attachment or a
/// URL is treated as noise or a scam signal. The origin check keeps the bot
/// from re-processing its own output in the target channel.
pub fn should_skip(msg: &InboundMessage) -> bool {
    let no_text = msg.text.as_deref().map_or(true, str::is_empty);
    no_text
        || msg.origin_chat_id == msg.target_chat_id
        || msg.has_media
        || msg.has_link_entity
}

/// Scans `text` for whole-token code candidates.
///
/// The input is uppercased, then split into maximal alphanumeric runs
/// delimited by non-alphanumeric characters or the string edges. A run
/// qualifies only if it is exactly [`CODE_LEN`] characters of ASCII `A-Z0-9`;
/// a 9+ character run yields nothing at all rather than any 8-char substring.
/// Runs touching a non-ASCII letter or digit are part of that longer run and
/// therefore rejected too. Candidates come back in order of appearance,
/// duplicates included.
pub fn extract_candidates(text: &str) -> Vec<Candidate> {
    let upper = text.to_uppercase();
    let mut candidates = Vec::new();
    let mut run = String::new();
    let mut ascii_only = true;

    for ch in upper.chars() {
        if ch.is_alphanumeric() {
            if !ch.is_ascii_alphanumeric() {
                ascii_only = false;
            }
            run.push(ch);
        } else {
            flush_run(&mut run, ascii_only, &mut candidates);
            ascii_only = true;
        }
    }
    flush_run(&mut run, ascii_only, &mut candidates);

    candidates
}

fn flush_run(run: &mut String, ascii_only: bool, out: &mut Vec<Candidate>) {
    if ascii_only && run.len() == CODE_LEN {
        out.push(Candidate(std::mem::take(run)));
    } else {
        run.clear();
    }
}

/// Whether a scanned candidate is a genuine code: at least one letter AND at
/// least one digit. All-alphabetic and all-numeric runs are common false
/// positives (hex-like tokens, phone fragments, hashtag stems).
pub fn is_valid_code(candidate: &Candidate) -> bool {
    let has_letter = candidate.0.bytes().any(|b| b.is_ascii_alphabetic());
    let has_digit = candidate.0.bytes().any(|b| b.is_ascii_digit());
    has_letter && has_digit
}

/// The pipeline entry point: scan, validate, keep order.
pub fn extract_valid_codes(text: &str) -> Vec<ExtractedCode> {
    extract_candidates(text)
        .into_iter()
        .filter(is_valid_code)
        .map(|c| ExtractedCode(c.0))
        .collect()
}
