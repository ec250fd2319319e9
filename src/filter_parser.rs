//! # Filter Markup Parser
//!
//! Parses the arguments of `/filter` and the reply markup of a filter:
//! `[label](buttonurl:https://…)` and `[label](buttonalert:text)` become
//! inline buttons, `:same` keeps a button on the previous row, and a button
//! preceded by an odd number of backslashes stays literal text.

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

lazy_static! {
    static ref BUTTON_REGEX: Regex =
        Regex::new(r"(?s)(\[([^\[]+?)\]\((buttonurl|buttonalert):(?:/{0,2})(.+?)(:same)?\))")
            .expect("button markup regex is valid");
}

const SMART_OPEN: char = '“';
const SMART_CLOSE: char = '”';

/// Prefix of alert button callback data
pub const ALERT_CALLBACK_PREFIX: &str = "alertmessage";

/// Telegram's limit on callback data, in bytes
pub const MAX_CALLBACK_DATA: usize = 64;

/// Marks a hashed keyword in alert callback data
const HASHED_KEY_PREFIX: char = '#';

/// What pressing a filter button does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ButtonAction {
    Url { url: String },
    Alert { callback_data: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterButton {
    pub text: String,
    #[serde(flatten)]
    pub action: ButtonAction,
}

/// Reply markup split into plain text, button rows and alert texts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedReply {
    pub text: String,
    pub buttons: Vec<Vec<FilterButton>>,
    pub alerts: Vec<String>,
}

/// Short stand-in for a keyword: `#` and the first 8 bytes of its SHA-256 in hex
pub fn hashed_keyword(keyword: &str) -> String {
    let digest = Sha256::digest(keyword.as_bytes());
    let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
    format!("{HASHED_KEY_PREFIX}{hex}")
}

/// Callback data for the `index`-th alert of a filter
///
/// The keyword is replaced by [`hashed_keyword`] when the data would not fit
/// in [`MAX_CALLBACK_DATA`] bytes.
pub fn alert_callback_data(index: usize, keyword: &str) -> String {
    let data = format!("{ALERT_CALLBACK_PREFIX}:{index}:{keyword}");
    if data.len() <= MAX_CALLBACK_DATA {
        data
    } else {
        format!("{ALERT_CALLBACK_PREFIX}:{index}:{}", hashed_keyword(keyword))
    }
}

/// Whether a key from alert callback data refers to `keyword`
pub fn alert_key_matches(key: &str, keyword: &str) -> bool {
    key == keyword || (key.starts_with(HASHED_KEY_PREFIX) && hashed_keyword(keyword) == key)
}

/// Inverse of [`alert_callback_data`], yielding the index and the keyword key
pub fn parse_alert_callback(data: &str) -> Option<(usize, String)> {
    let mut parts = data.splitn(3, ':');
    if parts.next()? != ALERT_CALLBACK_PREFIX {
        return None;
    }
    let index = parts.next()?.parse().ok()?;
    let keyword = parts.next()?.to_string();
    Some((index, keyword))
}

/// Drop escaping backslashes, keeping the escaped characters
pub fn remove_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut escaped = false;
    for c in text.chars() {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else {
            out.push(c);
        }
    }
    out
}

/// Split `/filter` arguments into keyword and optional content
///
/// A leading `'`, `"` or `“` quotes a multi-word keyword. Without a closing
/// quote the text is split on the first whitespace instead.
pub fn split_quotes(text: &str) -> Vec<String> {
    let text = text.trim();
    let chars: Vec<char> = text.chars().collect();
    let Some(&open) = chars.first() else {
        return Vec::new();
    };

    if !matches!(open, '\'' | '"' | SMART_OPEN) {
        return split_first_whitespace(text);
    }

    let mut close = None;
    let mut i = 1;
    while i < chars.len() {
        if chars[i] == '\\' {
            i += 1;
        } else if chars[i] == open || (open == SMART_OPEN && chars[i] == SMART_CLOSE) {
            close = Some(i);
            break;
        }
        i += 1;
    }

    let Some(close) = close else {
        return split_first_whitespace(text);
    };

    let inner: String = chars[1..close].iter().collect();
    let mut key = remove_escapes(inner.trim());
    if key.is_empty() {
        key = format!("{open}{open}");
    }
    let rest: String = chars[close + 1..].iter().collect();
    let rest = rest.trim();

    let mut parts = vec![key];
    if !rest.is_empty() {
        parts.push(rest.to_string());
    }
    parts
}

fn split_first_whitespace(text: &str) -> Vec<String> {
    match text.split_once(char::is_whitespace) {
        Some((head, tail)) => {
            let tail = tail.trim_start();
            if tail.is_empty() {
                vec![head.to_string()]
            } else {
                vec![head.to_string(), tail.to_string()]
            }
        }
        None if text.is_empty() => Vec::new(),
        None => vec![text.to_string()],
    }
}

/// Extract buttons and alerts from reply markup
pub fn parse_reply(text: &str, keyword: &str) -> ParsedReply {
    let mut parsed = ParsedReply::default();
    let mut prev = 0;

    for caps in BUTTON_REGEX.captures_iter(text) {
        let Some(whole) = caps.get(1) else { continue };
        let start = whole.start();

        let escapes = text[..start].chars().rev().take_while(|&c| c == '\\').count();
        if escapes % 2 == 1 {
            // keep the markup literally, minus the escaping backslash
            parsed.text.push_str(&text[prev..start - 1]);
            prev = start;
            continue;
        }

        parsed.text.push_str(&text[prev..start]);
        prev = whole.end();

        let label = caps.get(2).map_or("", |m| m.as_str()).to_string();
        let target = caps.get(4).map_or("", |m| m.as_str());
        let same_row = caps.get(5).is_some();

        let action = if caps.get(3).map(|m| m.as_str()) == Some("buttonalert") {
            let index = parsed.alerts.len();
            parsed.alerts.push(target.to_string());
            ButtonAction::Alert {
                callback_data: alert_callback_data(index, keyword),
            }
        } else {
            ButtonAction::Url {
                url: target.replace(' ', ""),
            }
        };

        let button = FilterButton {
            text: label,
            action,
        };
        match parsed.buttons.last_mut() {
            Some(row) if same_row => row.push(button),
            _ => parsed.buttons.push(vec![button]),
        }
    }

    parsed.text.push_str(&text[prev..]);
    parsed.text = parsed.text.trim().to_string();
    parsed
}

/// Parse content typed after the keyword; the remaining text is escaped for HTML
pub fn parse_text_reply(text: &str, keyword: &str) -> ParsedReply {
    let mut parsed = parse_reply(text, keyword);
    parsed.text = html_escape::encode_text(&parsed.text).into_owned();
    parsed
}

/// Parse the HTML rendering of a replied message
///
/// The text stays HTML. Button labels, URLs and alerts are shown as plain
/// text by Telegram, so their entities are decoded.
pub fn parse_html_reply(html: &str, keyword: &str) -> ParsedReply {
    let mut parsed = parse_reply(html, keyword);
    for button in parsed.buttons.iter_mut().flatten() {
        button.text = html_escape::decode_html_entities(&button.text).into_owned();
        if let ButtonAction::Url { url } = &mut button.action {
            *url = html_escape::decode_html_entities(url).into_owned();
        }
    }
    for alert in &mut parsed.alerts {
        *alert = html_escape::decode_html_entities(alert).into_owned();
    }
    parsed
}

/// Whether `keyword` occurs in `text` as a whole word, ignoring case
pub fn keyword_matches(keyword: &str, text: &str) -> bool {
    let pattern = format!(r"( |^|[^\w]){}( |$|[^\w])", regex::escape(keyword));
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .is_ok_and(|re| re.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(text: &str, url: &str) -> FilterButton {
        FilterButton {
            text: text.to_string(),
            action: ButtonAction::Url {
                url: url.to_string(),
            },
        }
    }

    #[test]
    fn test_split_quotes_plain() {
        assert_eq!(split_quotes("hello world again"), vec!["hello", "world again"]);
        assert_eq!(split_quotes("hello"), vec!["hello"]);
        assert!(split_quotes("   ").is_empty());
    }

    #[test]
    fn test_split_quotes_quoted_keyword() {
        assert_eq!(
            split_quotes(r#""iron man" the reply"#),
            vec!["iron man", "the reply"]
        );
        assert_eq!(split_quotes("“smart quotes” text"), vec!["smart quotes", "text"]);
        assert_eq!(split_quotes(r#""say \"hi\"" ok"#), vec![r#"say "hi""#, "ok"]);
        assert_eq!(split_quotes(r#""" rest"#), vec![r#""""#, "rest"]);
    }

    #[test]
    fn test_split_quotes_unterminated_falls_back() {
        assert_eq!(split_quotes(r#""iron man"#), vec![r#""iron"#, "man"]);
    }

    #[test]
    fn test_parse_reply_buttons_and_rows() {
        let parsed = parse_reply(
            "Watch here [Site](buttonurl:https://example.com) [Mirror](buttonurl:https://mirror.example.com:same)\n[Next](buttonurl://example.org/next)",
            "movie",
        );
        assert_eq!(parsed.text, "Watch here");
        assert_eq!(
            parsed.buttons,
            vec![
                vec![
                    url("Site", "https://example.com"),
                    url("Mirror", "https://mirror.example.com")
                ],
                vec![url("Next", "example.org/next")],
            ]
        );
        assert!(parsed.alerts.is_empty());
    }

    #[test]
    fn test_parse_reply_alerts() {
        let parsed = parse_reply(
            "[Rules](buttonalert:No spam)[Info](buttonalert:Be nice:same)",
            "rules",
        );
        assert_eq!(parsed.text, "");
        assert_eq!(parsed.alerts, vec!["No spam", "Be nice"]);
        assert_eq!(parsed.buttons.len(), 1);
        assert_eq!(
            parsed.buttons[0][1].action,
            ButtonAction::Alert {
                callback_data: "alertmessage:1:rules".to_string()
            }
        );
    }

    #[test]
    fn test_parse_reply_escaped_button_stays_text() {
        let parsed = parse_reply(r"see \[Site](buttonurl:https://example.com)", "k");
        assert!(parsed.buttons.is_empty());
        assert_eq!(parsed.text, "see [Site](buttonurl:https://example.com)");

        let parsed = parse_reply(r"see \\[Site](buttonurl:https://example.com)", "k");
        assert_eq!(parsed.buttons.len(), 1);
        assert_eq!(parsed.text, r"see \\");
    }

    #[test]
    fn test_same_on_first_button_starts_row() {
        let parsed = parse_reply("[A](buttonurl:a.com:same)", "k");
        assert_eq!(parsed.buttons, vec![vec![url("A", "a.com")]]);
    }

    #[test]
    fn test_alert_callback_round_trip() {
        let data = alert_callback_data(3, "key:word");
        assert_eq!(parse_alert_callback(&data), Some((3, "key:word".to_string())));
        assert_eq!(parse_alert_callback("file_abc"), None);
        assert_eq!(parse_alert_callback("alertmessage:x:k"), None);
    }

    #[test]
    fn test_long_keyword_alert_fits_callback_limit() {
        let keyword = "a very long keyword that would never fit into callback data";
        let data = alert_callback_data(12, keyword);
        assert!(data.len() <= MAX_CALLBACK_DATA);

        let (index, key) = parse_alert_callback(&data).unwrap();
        assert_eq!(index, 12);
        assert!(alert_key_matches(&key, keyword));
        assert!(!alert_key_matches(&key, "another keyword"));

        let short = alert_callback_data(0, "rules");
        assert_eq!(short, "alertmessage:0:rules");
        assert!(alert_key_matches("rules", "rules"));
    }

    #[test]
    fn test_typed_reply_is_escaped_for_html() {
        let parsed = parse_text_reply(
            &split_quotes("rules Use <3 & be kind [Tom & Jerry](buttonurl:https://example.com/?a=1&b=2)")[1],
            "rules",
        );
        assert_eq!(parsed.text, "Use &lt;3 &amp; be kind");
        assert_eq!(
            parsed.buttons,
            vec![vec![url("Tom & Jerry", "https://example.com/?a=1&b=2")]]
        );
    }

    #[test]
    fn test_html_reply_decodes_button_entities() {
        let parsed = parse_html_reply(
            "<b>Bold</b> &amp; more [Tom &amp; Jerry](buttonurl:https://example.com/?a=1&amp;b=2)[Note](buttonalert:1 &lt; 2)",
            "cartoon",
        );
        assert_eq!(parsed.text, "<b>Bold</b> &amp; more");
        assert_eq!(parsed.buttons[0][0], url("Tom & Jerry", "https://example.com/?a=1&b=2"));
        assert_eq!(parsed.alerts, vec!["1 < 2"]);
    }

    #[test]
    fn test_keyword_matches_word_bounded() {
        assert!(keyword_matches("avatar", "anyone has Avatar?"));
        assert!(keyword_matches("iron man", "iron man"));
        assert!(!keyword_matches("cat", "concatenate"));
        assert!(keyword_matches("c++", "learn c++ today"));
    }

    #[test]
    fn test_buttons_serialize_tagged() {
        let json = serde_json::to_string(&url("Site", "https://example.com")).unwrap();
        assert_eq!(
            json,
            r#"{"text":"Site","kind":"url","url":"https://example.com"}"#
        );
    }
}
