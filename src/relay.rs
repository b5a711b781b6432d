//! Renders extracted codes into the outbound MarkdownV2 message and composes
//! the per-message pipeline the bot glue calls.

use chrono::{DateTime, Utc};
use teloxide::utils::markdown;

use crate::config::RelayConfig;
use crate::extractor::{self, ExtractedCode, InboundMessage};

/// Optional context about where a message came from, rendered into the
/// footer area when present.
#[derive(Debug, Clone, Default)]
pub struct DeliveryMeta {
    pub source_title: Option<String>,
    pub source_link: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// What one processed message produces: the codes in discovery order and the
/// ready-to-send MarkdownV2 text.
#[derive(Debug, Clone)]
pub struct RelayOutcome {
    pub codes: Vec<ExtractedCode>,
    pub text: String,
}

/// Runs one inbound message through the whole pipeline: skip checks, code
/// extraction, formatting. `None` means nothing to forward. Pure: the caller
/// owns delivery and the forwarded-codes counter.
pub fn process(
    msg: &InboundMessage,
    relay: &RelayConfig,
    meta: &DeliveryMeta,
) -> Option<RelayOutcome> {
    if extractor::should_skip(msg) {
        return None;
    }
    let codes = extractor::extract_valid_codes(msg.text.as_deref()?);
    if codes.is_empty() {
        return None;
    }
    let text = format_for_delivery(&codes, relay, meta);
    Some(RelayOutcome { codes, text })
}

/// Renders the outbound message: header, one monospaced code per line in
/// input order, footer, optional source line. No truncation, no dedup.
///
/// Header, footer and the source line are literal text and go through
/// [`markdown::escape`]. Code bodies are `A-Z0-9` only, which contains no
/// MarkdownV2-reserved characters, so they are embedded unescaped.
pub fn format_for_delivery(
    codes: &[ExtractedCode],
    relay: &RelayConfig,
    meta: &DeliveryMeta,
) -> String {
    let mut out = String::new();
    out.push_str(&markdown::escape(&relay.header));
    out.push_str("\n\n");
    for code in codes {
        out.push_str(&markdown::code_inline(code.as_str()));
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&markdown::escape(&relay.footer));
    if let Some(line) = source_line(meta) {
        out.push('\n');
        out.push_str(&line);
    }
    out
}

fn source_line(meta: &DeliveryMeta) -> Option<String> {
    let mut parts = Vec::new();
    match (&meta.source_title, &meta.source_link) {
        (Some(title), Some(link)) => parts.push(markdown::link(link, &markdown::escape(title))),
        (Some(title), None) => parts.push(markdown::escape(title)),
        (None, Some(link)) => parts.push(markdown::link(link, "source")),
        (None, None) => {}
    }
    if let Some(ts) = meta.timestamp {
        parts.push(markdown::escape(&ts.format("%Y-%m-%d %H:%M UTC").to_string()));
    }
    if parts.is_empty() {
        None
    } else {
        Some(format!("via {}", parts.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message(text: &str) -> InboundMessage {
        InboundMessage {
            text: Some(text.to_string()),
            has_media: false,
            has_link_entity: false,
            origin_chat_id: -1001,
            target_chat_id: -1002,
        }
    }

    fn relay_config() -> RelayConfig {
        RelayConfig::default()
    }

    #[test]
    fn test_end_to_end_single_code() {
        let msg = message("Check this out: YVUW2WPE no links here");
        let outcome = process(&msg, &relay_config(), &DeliveryMeta::default()).unwrap();

        let got: Vec<&str> = outcome.codes.iter().map(|c| c.as_str()).collect();
        assert_eq!(got, vec!["YVUW2WPE"]);

        // Header, monospaced code, footer, in that order.
        let header_at = outcome.text.find("New codes spotted").unwrap();
        let code_at = outcome.text.find("`YVUW2WPE`").unwrap();
        let footer_at = outcome.text.find("Tap a code to copy it").unwrap();
        assert!(header_at < code_at);
        assert!(code_at < footer_at);
    }

    #[test]
    fn test_link_entity_message_is_skipped() {
        let mut msg = message("http://example.com 7NTHLZ02");
        msg.has_link_entity = true;
        assert!(process(&msg, &relay_config(), &DeliveryMeta::default()).is_none());
    }

    #[test]
    fn test_media_message_is_skipped() {
        let mut msg = message("YVUW2WPE");
        msg.has_media = true;
        assert!(process(&msg, &relay_config(), &DeliveryMeta::default()).is_none());
    }

    #[test]
    fn test_no_codes_means_nothing_to_forward() {
        let msg = message("just chatting, no codes today");
        assert!(process(&msg, &relay_config(), &DeliveryMeta::default()).is_none());
    }

    #[test]
    fn test_codes_one_per_line_in_order() {
        let msg = message("AB12CD34 then 7NTHLZ02 then AB12CD34");
        let outcome = process(&msg, &relay_config(), &DeliveryMeta::default()).unwrap();

        let code_lines: Vec<&str> = outcome
            .text
            .lines()
            .filter(|l| l.starts_with('`'))
            .collect();
        assert_eq!(code_lines, vec!["`AB12CD34`", "`7NTHLZ02`", "`AB12CD34`"]);
    }

    #[test]
    fn test_header_and_footer_are_escaped() {
        let relay = RelayConfig {
            header: "Codes (fresh) - grab them!".to_string(),
            footer: "Expires today.".to_string(),
        };
        let codes = extractor::extract_valid_codes("YVUW2WPE");
        let text = format_for_delivery(&codes, &relay, &DeliveryMeta::default());

        assert!(text.contains(r"Codes \(fresh\) \- grab them\!"));
        assert!(text.contains(r"Expires today\."));
        // The code itself stays unescaped inside its backticks.
        assert!(text.contains("`YVUW2WPE`"));
    }

    #[test]
    fn test_source_line_with_title_link_and_timestamp() {
        let meta = DeliveryMeta {
            source_title: Some("Deals & Drops".to_string()),
            source_link: Some("https://t.me/deals/42".to_string()),
            timestamp: Some(Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap()),
        };
        let codes = extractor::extract_valid_codes("YVUW2WPE");
        let text = format_for_delivery(&codes, &relay_config(), &meta);

        assert!(text.contains("[Deals & Drops](https://t.me/deals/42)"));
        assert!(text.contains(r"2026\-03\-01 12:30 UTC"));
    }

    #[test]
    fn test_no_meta_no_source_line() {
        let codes = extractor::extract_valid_codes("YVUW2WPE");
        let text = format_for_delivery(&codes, &relay_config(), &DeliveryMeta::default());
        assert!(!text.contains("via "));
    }
}
