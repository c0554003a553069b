use tracing::{debug, info, warn};

use crate::errors::ParseError;
use crate::models::{ParseReport, ParsedEntry};

const HEADER_MARKER: &str = "#EXTM3U";
const EXTINF_MARKER: &str = "#EXTINF";
const BOM: char = '\u{feff}';

/// Attribute keys the parser maps onto `ParsedEntry` fields
const LOGO_KEY: &str = "tvg-logo";
const GROUP_KEY: &str = "group-title";

fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

/// Cursor over playlist text returning one logical line at a time.
///
/// `\n`, `\r` and `\r\n` each end a line. Lines are borrowed from the source,
/// nothing is collected up front.
#[derive(Debug, Clone)]
pub struct LineReader<'a> {
    source: &'a str,
    cursor: usize,
}

impl<'a> LineReader<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, cursor: 0 }
    }

    /// Next line without its terminator, `None` once the input is exhausted
    pub fn read_line(&mut self) -> Option<&'a str> {
        let bytes = self.source.as_bytes();
        let len = bytes.len();
        let start = self.cursor;
        if start >= len {
            return None;
        }

        let mut i = start;
        while i < len {
            match bytes[i] {
                b'\n' => {
                    self.cursor = i + 1;
                    return Some(&self.source[start..i]);
                }
                b'\r' => {
                    self.cursor = if bytes.get(i + 1) == Some(&b'\n') { i + 2 } else { i + 1 };
                    return Some(&self.source[start..i]);
                }
                _ => i += 1,
            }
        }

        self.cursor = len;
        Some(&self.source[start..])
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }
}

/// One `key` or `key="value"` item from the attribute section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Lower-cased key
    pub key: String,
    pub value: Option<String>,
}

/// Tokenized `#EXTINF` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtinfLine {
    /// Everything after the first unquoted comma
    pub name: String,
    pub attributes: Vec<Attribute>,
}

impl ExtinfLine {
    pub fn value(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .rev()
            .find(|a| a.key == key)
            .and_then(|a| a.value.as_deref())
    }

    /// Pair this metadata with the URL line that followed it
    pub fn into_entry(self, url: &str) -> ParsedEntry {
        let mut entry = ParsedEntry {
            name: self.name,
            url: url.to_string(),
            ..Default::default()
        };

        for attribute in self.attributes {
            let Some(value) = attribute.value else {
                continue;
            };
            match attribute.key.as_str() {
                LOGO_KEY => entry.logo = value,
                GROUP_KEY => entry.group_title = value,
                _ => entry.attributes.push((attribute.key, value)),
            }
        }
        entry
    }
}

fn malformed(line: &str, reason: &str) -> ParseError {
    ParseError::MalformedLine {
        line: line.to_string(),
        reason: reason.to_string(),
    }
}

/// Position of the first comma outside a quoted span.
/// A `\"` inside a quoted span does not close it.
fn find_name_separator(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut in_quote = false;
    let mut prev = 0u8;

    for (i, &byte) in bytes.iter().enumerate() {
        match byte {
            b'"' if in_quote && prev == b'\\' => {}
            b'"' => in_quote = !in_quote,
            b',' if !in_quote => return Some(i),
            _ => {}
        }
        prev = byte;
    }
    None
}

/// Read a quoted value starting just after the opening quote.
/// Returns the unescaped value and the position after the closing quote.
/// An unterminated value runs to the end of the section.
fn read_quoted(section: &str, start: usize) -> (String, usize) {
    let bytes = section.as_bytes();
    let mut value = String::new();
    let mut segment = start;
    let mut i = start;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' if bytes.get(i + 1) == Some(&b'"') => {
                value.push_str(&section[segment..i]);
                value.push('"');
                i += 2;
                segment = i;
            }
            b'"' => {
                value.push_str(&section[segment..i]);
                return (value, i + 1);
            }
            _ => i += 1,
        }
    }

    value.push_str(&section[segment..]);
    (value, bytes.len())
}

/// Split an `#EXTINF` line into its attributes and display name
pub fn parse_extinf(line: &str) -> Result<ExtinfLine, ParseError> {
    if !line.starts_with(EXTINF_MARKER) {
        return Err(malformed(line, "missing #EXTINF marker"));
    }
    let separator =
        find_name_separator(line).ok_or_else(|| malformed(line, "missing display name separator"))?;

    let name = line[separator + 1..].to_string();
    let section = &line[EXTINF_MARKER.len()..separator];
    let bytes = section.as_bytes();

    let mut attributes = Vec::new();
    let mut pos = 0;
    loop {
        while pos < bytes.len() && is_space(bytes[pos]) {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }

        let start = pos;
        while pos < bytes.len() && bytes[pos] != b'=' && !is_space(bytes[pos]) {
            pos += 1;
        }
        let key = section[start..pos].to_lowercase();

        let value = if bytes.get(pos) == Some(&b'=') {
            pos += 1;
            if bytes.get(pos) == Some(&b'"') {
                let (value, next) = read_quoted(section, pos + 1);
                pos = next;
                Some(value)
            } else {
                let value_start = pos;
                while pos < bytes.len() && !is_space(bytes[pos]) {
                    pos += 1;
                }
                Some(section[value_start..pos].to_string())
            }
        } else {
            None
        };

        if !key.is_empty() {
            attributes.push(Attribute { key, value });
        }
    }

    Ok(ExtinfLine { name, attributes })
}

enum ParserState {
    AwaitHeader,
    AwaitMetadata,
    AwaitUrl(ExtinfLine),
    Done,
}

/// M3U playlist parser
///
/// Drives `LineReader` and `parse_extinf` over a whole document, pairing each
/// metadata line with the line after it.
#[derive(Debug, Clone)]
pub struct M3UParser {
    /// Minimum percentage increase between progress callbacks
    progress_step: f32,
}

impl Default for M3UParser {
    fn default() -> Self {
        Self { progress_step: 1.0 }
    }
}

impl M3UParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress_step(progress_step: f32) -> Self {
        Self { progress_step }
    }

    pub fn parse(&self, text: &str) -> Result<ParseReport, ParseError> {
        self.parse_with_progress(text, &mut |_| {})
    }

    /// Parse the whole document, reporting completion percentage as it goes
    pub fn parse_with_progress(
        &self,
        text: &str,
        on_progress: &mut dyn FnMut(f32),
    ) -> Result<ParseReport, ParseError> {
        let text = text.strip_prefix(BOM).unwrap_or(text);
        let mut reader = LineReader::new(text);
        let total = reader.len().max(1) as f32;
        let mut last_percent = 0f32;

        let mut report = ParseReport::default();
        let mut state = ParserState::AwaitHeader;

        loop {
            state = match state {
                ParserState::AwaitHeader => match reader.read_line() {
                    Some(line) if line.starts_with(HEADER_MARKER) => ParserState::AwaitMetadata,
                    _ => return Err(ParseError::InvalidFormat),
                },
                ParserState::AwaitMetadata => match reader.read_line() {
                    None => ParserState::Done,
                    Some(line) if line.starts_with(EXTINF_MARKER) => match parse_extinf(line) {
                        Ok(extinf) => ParserState::AwaitUrl(extinf),
                        Err(e) => {
                            warn!("Skipping entry: {}", e);
                            report.skipped += 1;
                            ParserState::AwaitMetadata
                        }
                    },
                    Some(line) => {
                        if !line.trim().is_empty() {
                            debug!("Ignoring line outside an entry: {}", line);
                        }
                        ParserState::AwaitMetadata
                    }
                },
                ParserState::AwaitUrl(extinf) => match reader.read_line() {
                    Some(url) => {
                        report.entries.push(extinf.into_entry(url));
                        ParserState::AwaitMetadata
                    }
                    None => {
                        warn!("Dropping '{}': playlist ended before its URL", extinf.name);
                        report.skipped += 1;
                        ParserState::Done
                    }
                },
                ParserState::Done => break,
            };

            let percent = reader.position() as f32 / total * 100.0;
            if percent - last_percent > self.progress_step {
                last_percent = percent;
                on_progress(percent);
            }
        }

        if last_percent < 100.0 {
            on_progress(100.0);
        }

        info!(
            entries = report.entries.len(),
            skipped = report.skipped,
            "Parsed playlist"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<&str> {
        let mut reader = LineReader::new(text);
        let mut out = Vec::new();
        while let Some(line) = reader.read_line() {
            out.push(line);
        }
        out
    }

    #[test]
    fn test_read_line_terminators_are_equivalent() {
        let expected = vec!["#EXTM3U", "#EXTINF:-1,A", "http://a/1"];
        assert_eq!(lines("#EXTM3U\n#EXTINF:-1,A\nhttp://a/1\n"), expected);
        assert_eq!(lines("#EXTM3U\r\n#EXTINF:-1,A\r\nhttp://a/1\r\n"), expected);
        assert_eq!(lines("#EXTM3U\r#EXTINF:-1,A\rhttp://a/1\r"), expected);
        assert_eq!(lines("#EXTM3U\n#EXTINF:-1,A\r\nhttp://a/1"), expected);
    }

    #[test]
    fn test_read_line_keeps_blank_lines() {
        assert_eq!(lines("a\n\nb"), vec!["a", "", "b"]);
        assert_eq!(lines("a\r\n\r\nb"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_read_line_past_end_is_idempotent() {
        let mut reader = LineReader::new("only");
        assert_eq!(reader.read_line(), Some("only"));
        assert_eq!(reader.read_line(), None);
        assert_eq!(reader.read_line(), None);
        assert_eq!(reader.position(), 4);

        let mut empty = LineReader::new("");
        assert_eq!(empty.read_line(), None);
    }

    #[test]
    fn test_parse_extinf() {
        let line = r#"#EXTINF:-1 tvg-id="globo.br" tvg-logo="http://logo.png" group-title="Canais",Globo HD"#;
        let extinf = parse_extinf(line).unwrap();
        assert_eq!(extinf.name, "Globo HD");
        assert_eq!(extinf.value("tvg-logo"), Some("http://logo.png"));
        assert_eq!(extinf.value("group-title"), Some("Canais"));
        assert_eq!(extinf.value("tvg-id"), Some("globo.br"));
        // the duration is a bare token with no value
        assert_eq!(extinf.attributes[0].key, ":-1");
        assert_eq!(extinf.attributes[0].value, None);
    }

    #[test]
    fn test_parse_extinf_escaped_quote() {
        let extinf = parse_extinf(r#"#EXTINF:-1 tvg-logo="a\"b",Name"#).unwrap();
        assert_eq!(extinf.value("tvg-logo"), Some("a\"b"));
        assert_eq!(extinf.name, "Name");
    }

    #[test]
    fn test_parse_extinf_comma_inside_quotes() {
        let extinf = parse_extinf(r#"#EXTINF:-1 group-title="News, Sports",Channel, One"#).unwrap();
        assert_eq!(extinf.value("group-title"), Some("News, Sports"));
        assert_eq!(extinf.name, "Channel, One");
    }

    #[test]
    fn test_parse_extinf_keys_are_case_insensitive() {
        let extinf = parse_extinf(r#"#EXTINF:-1 TVG-LOGO="L" Group-Title="G",X"#).unwrap();
        let entry = extinf.into_entry("http://x/y");
        assert_eq!(entry.logo, "L");
        assert_eq!(entry.group_title, "G");
        assert!(entry.attributes.is_empty());
    }

    #[test]
    fn test_parse_extinf_lenient_values() {
        let extinf = parse_extinf(r#"#EXTINF:-1 tvg-chno=7 tvg-logo="L",Name"#).unwrap();
        assert_eq!(extinf.value("tvg-chno"), Some("7"));
        assert_eq!(extinf.value("tvg-logo"), Some("L"));
        // an open quote swallows the comma, so there is no separator
        assert!(parse_extinf(r#"#EXTINF:-1 tvg-logo="open,Name"#).is_err());
    }

    #[test]
    fn test_parse_extinf_rejects_malformed() {
        assert!(matches!(
            parse_extinf("#EXTINF:-1 no separator"),
            Err(ParseError::MalformedLine { .. })
        ));
        assert!(matches!(
            parse_extinf("#EXTVLCOPT:x,y"),
            Err(ParseError::MalformedLine { .. })
        ));
    }

    #[test]
    fn test_into_entry_keeps_unknown_attributes() {
        let extinf = parse_extinf(r#"#EXTINF:-1 tvg-id="abc" tvg-logo="L",N"#).unwrap();
        let entry = extinf.into_entry("http://x/1.mp4");
        assert_eq!(entry.attribute("tvg-id"), Some("abc"));
        assert_eq!(entry.url, "http://x/1.mp4");
    }

    #[test]
    fn test_parse_end_to_end_entry() {
        let text = "#EXTM3U\n#EXTINF:-1 tvg-logo=\"L\" group-title=\"G\",Show S02E05\nhttp://x/y\n";
        let report = M3UParser::new().parse(text).unwrap();
        assert_eq!(report.skipped, 0);
        assert_eq!(report.entries.len(), 1);
        let entry = &report.entries[0];
        assert_eq!(entry.name, "Show S02E05");
        assert_eq!(entry.logo, "L");
        assert_eq!(entry.group_title, "G");
        assert_eq!(entry.url, "http://x/y");
    }

    #[test]
    fn test_parse_invalid_header() {
        let parser = M3UParser::new();
        assert!(matches!(parser.parse(""), Err(ParseError::InvalidFormat)));
        assert_eq!(
            parser.parse("#EXTINF:-1,A\nhttp://a/1\n").unwrap_err(),
            ParseError::InvalidFormat
        );
    }

    #[test]
    fn test_parse_header_attributes_and_bom() {
        let text = "\u{feff}#EXTM3U x-tvg-url=\"http://epg\"\n#EXTINF:-1,A\nhttp://a/1\n";
        let report = M3UParser::new().parse(text).unwrap();
        assert_eq!(report.entries.len(), 1);
    }

    #[test]
    fn test_parse_skips_malformed_pair_without_consuming_next() {
        let text = "#EXTM3U\n\
                    #EXTINF:-1 tvg-logo=\"L\" no separator\n\
                    http://a/1\n\
                    #EXTINF:-1,Good\n\
                    http://a/2\n";
        let report = M3UParser::new().parse(text).unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].name, "Good");
        assert_eq!(report.entries[0].url, "http://a/2");
    }

    #[test]
    fn test_parse_ignores_comments_and_blank_lines() {
        let text = "#EXTM3U\n\n#EXTVLCOPT:http-user-agent=x\n#EXTINF:-1,A\nhttp://a/1\n\n#EXTINF:-1,B\nhttp://a/2";
        let report = M3UParser::new().parse(text).unwrap();
        let names: Vec<&str> = report.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_parse_drops_metadata_without_url() {
        let report = M3UParser::new().parse("#EXTM3U\n#EXTINF:-1,A\nhttp://a/1\n#EXTINF:-1,B\n").unwrap();
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_parse_same_result_for_any_line_ending() {
        let lf = "#EXTM3U\n#EXTINF:-1,A\nhttp://a/1\n#EXTINF:-1,B\nhttp://a/2\n";
        let crlf = lf.replace('\n', "\r\n");
        let cr = lf.replace('\n', "\r");
        let parser = M3UParser::new();
        let expected = parser.parse(lf).unwrap().entries;
        assert_eq!(parser.parse(&crlf).unwrap().entries, expected);
        assert_eq!(parser.parse(&cr).unwrap().entries, expected);
    }

    #[test]
    fn test_parse_progress_is_monotonic_and_finishes() {
        let mut text = String::from("#EXTM3U\n");
        for i in 0..200 {
            text.push_str(&format!("#EXTINF:-1,Item {}\nhttp://a/{}.mp4\n", i, i));
        }

        let mut seen = Vec::new();
        let report = M3UParser::new()
            .parse_with_progress(&text, &mut |p| seen.push(p))
            .unwrap();

        assert_eq!(report.entries.len(), 200);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.last().copied(), Some(100.0));
        assert!(seen.len() > 10);
    }
}
