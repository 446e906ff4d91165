//! Price page retrieval and chart payload extraction.

use super::parser::ParseFailure;
use crate::error::{PowersaveError, Result};
use crate::logging::{StructuredLogger, get_logger};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use std::time::Duration;

/// Source of the raw price page
#[async_trait]
pub trait PriceFeedPort: Send + Sync {
    /// Fetch the page at `url` as text
    async fn fetch_page(&self, url: &str) -> Result<String>;
}

/// Price page fetched over HTTP(S)
pub struct HttpPriceFeed {
    client: reqwest::Client,
    logger: StructuredLogger,
}

impl HttpPriceFeed {
    /// Create a client whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            logger: get_logger("price_feed"),
        })
    }
}

#[async_trait]
impl PriceFeedPort for HttpPriceFeed {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        self.logger.debug(&format!("Fetching price page {}", url));
        let resp = self
            .client
            .get(url)
            .header(
                USER_AGENT,
                concat!("nilan-powersave/", env!("CARGO_PKG_VERSION")),
            )
            .header(ACCEPT, "text/html")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PowersaveError::fetch(url, format!("HTTP {}", status)));
        }
        let body = resp.text().await?;
        self.logger
            .debug(&format!("Fetched {} bytes from {}", body.len(), url));
        Ok(body)
    }
}

/// Elements whose content is raw text rather than markup
const RAW_TEXT_ELEMENTS: [&str; 5] = ["script", "style", "textarea", "title", "template"];

/// Extract the value of `attribute` on the element whose id is `element_id`.
///
/// Attribute values are entity-decoded, so a JSON payload stored in a
/// double-quoted attribute comes back as plain JSON. Comments and the
/// contents of raw-text elements such as `<script>` are not markup and are
/// skipped.
pub fn extract_chart_payload(
    html: &str,
    element_id: &str,
    attribute: &str,
) -> std::result::Result<String, ParseFailure> {
    let mut rest = html;
    while let Some(open) = rest.find('<') {
        let after = &rest[open + 1..];
        if let Some(comment) = after.strip_prefix("!--") {
            rest = comment.find("-->").map_or("", |end| &comment[end + 3..]);
            continue;
        }

        let (name, attrs, consumed) = parse_tag(after);
        let is_target = attrs
            .iter()
            .any(|(name, value)| name.eq_ignore_ascii_case("id") && value == element_id);
        if is_target {
            return attrs
                .into_iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
                .map(|(_, value)| value)
                .ok_or_else(|| {
                    ParseFailure::MalformedPayload(format!(
                        "element #{element_id} has no {attribute} attribute"
                    ))
                });
        }

        rest = &after[consumed..];
        if RAW_TEXT_ELEMENTS
            .iter()
            .any(|raw| name.eq_ignore_ascii_case(raw))
        {
            rest = skip_raw_text(rest, &name);
        }
    }
    Err(ParseFailure::MalformedPayload(format!(
        "element #{element_id} not found in page"
    )))
}

/// Skip past the closing tag of raw-text element `name`
fn skip_raw_text<'a>(input: &'a str, name: &str) -> &'a str {
    let closing = format!("</{}", name.to_ascii_lowercase());
    let lower = input.to_ascii_lowercase();
    match lower.find(&closing) {
        Some(pos) => &input[pos + closing.len()..],
        None => "",
    }
}

/// Parse the name and attributes of a tag starting right after `<`.
///
/// Returns the tag name, the decoded attributes and the number of bytes
/// consumed.
fn parse_tag(input: &str) -> (String, Vec<(String, String)>, usize) {
    let bytes = input.as_bytes();
    let mut attrs = Vec::new();

    // Closing tags, doctypes and processing instructions carry nothing of interest
    if matches!(bytes.first(), Some(b'/' | b'!' | b'?') | None) {
        return (String::new(), attrs, 0);
    }

    let mut i = 0;
    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'>' | b'/') {
        i += 1;
    }
    let tag = input[..i].to_string();

    loop {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] == b'>' {
            return (tag, attrs, i);
        }

        let name_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'=' | b'>' | b'/')
        {
            i += 1;
        }
        let name = input[name_start..i].to_string();

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            let value = match bytes.get(i) {
                Some(&quote @ (b'"' | b'\'')) => {
                    let start = i + 1;
                    let end = input[start..]
                        .find(quote as char)
                        .map_or(bytes.len(), |p| start + p);
                    i = (end + 1).min(bytes.len());
                    &input[start..end]
                }
                _ => {
                    let start = i;
                    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>'
                    {
                        i += 1;
                    }
                    &input[start..i]
                }
            };
            attrs.push((name, decode_entities(value)));
        } else if !name.is_empty() {
            attrs.push((name, String::new()));
        }
    }
}

/// Decode named and numeric character references used in attribute values
pub fn decode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';').filter(|&semi| semi <= 10) {
            Some(semi) => match decode_reference(&tail[1..semi]) {
                Some(c) => {
                    out.push(c);
                    rest = &tail[semi + 1..];
                }
                None => {
                    out.push('&');
                    rest = &tail[1..];
                }
            },
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    match name {
        "quot" => Some('"'),
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_entity_encoded_json() {
        let html = r#"<html><body>
            <div class="x" id="other" data-chart="nope"></div>
            <div id="chart-component" data-chart="{&quot;east&quot;:{&quot;values&quot;:[&quot;1,2&quot;]}}" hidden>
            </div></body></html>"#;
        let payload = extract_chart_payload(html, "chart-component", "data-chart").unwrap();
        assert_eq!(payload, r#"{"east":{"values":["1,2"]}}"#);
    }

    #[test]
    fn test_single_quoted_attribute_with_angle_brackets() {
        let html = "<div data-chart='{\"a\":\"<b>\"}' id='chart-component'></div>";
        let payload = extract_chart_payload(html, "chart-component", "data-chart").unwrap();
        assert_eq!(payload, "{\"a\":\"<b>\"}");
    }

    #[test]
    fn test_missing_element_or_attribute() {
        let err = extract_chart_payload("<p>nothing</p>", "chart-component", "data-chart");
        assert!(matches!(err, Err(ParseFailure::MalformedPayload(_))));

        let err = extract_chart_payload(
            "<div id=chart-component></div>",
            "chart-component",
            "data-chart",
        );
        assert!(matches!(err, Err(ParseFailure::MalformedPayload(m)) if m.contains("no data-chart")));
    }

    #[test]
    fn test_commented_out_element_is_ignored() {
        let html = r#"<body>
            <!-- <div id="chart-component" data-chart="STALE"></div> -->
            <div id="chart-component" data-chart="LIVE"></div></body>"#;
        assert_eq!(
            extract_chart_payload(html, "chart-component", "data-chart").unwrap(),
            "LIVE"
        );
    }

    #[test]
    fn test_script_text_is_not_markup() {
        let html = r#"<head><SCRIPT>
            const tpl = '<div id="chart-component">';
            </Script></head>
            <body><div id="chart-component" data-chart="LIVE"></div></body>"#;
        assert_eq!(
            extract_chart_payload(html, "chart-component", "data-chart").unwrap(),
            "LIVE"
        );

        let unterminated = "<!-- <div id=\"chart-component\" data-chart=\"X\">";
        assert!(extract_chart_payload(unterminated, "chart-component", "data-chart").is_err());
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp; b &#34;c&#x22; &bogus; &"), "a & b \"c\" &bogus; &");
    }
}
