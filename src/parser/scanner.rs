//! Splits lines into headings, text lines and fenced code blocks.

use crate::domain::ParseError;

/// A classified unit of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block<'a> {
    /// An ATX heading.
    Heading {
        /// Number of leading `#`.
        level: usize,
        /// Heading text, trimmed.
        text: &'a str,
        /// 1-based line.
        line: usize,
        /// 1-based byte column of `text`.
        column: usize,
    },
    /// A non-blank line that is neither a heading nor part of a fence.
    Text {
        /// Line text, trimmed.
        text: &'a str,
        /// 1-based line.
        line: usize,
    },
    /// A fenced code block.
    Fence {
        /// The info string after the opening fence, trimmed.
        info: &'a str,
        /// The lines between the fences, joined with `\n`.
        body: String,
        /// 1-based line of the opening fence.
        line: usize,
    },
}

/// Classifies `lines[start..]`.
///
/// Line numbers are reported relative to the start of `lines`. Scanning
/// stops at an unterminated fence, which is returned as a fatal error
/// alongside every block read before it.
pub fn scan<'a>(lines: &[&'a str], start: usize) -> (Vec<Block<'a>>, Option<ParseError>) {
    let mut blocks = Vec::new();
    let mut index = start;

    while index < lines.len() {
        let raw = lines[index];
        let line = index + 1;
        let trimmed = raw.trim();
        index += 1;

        if trimmed.is_empty() {
            continue;
        }

        if let Some((marker, info)) = fence_open(trimmed) {
            let close = lines[index..]
                .iter()
                .position(|candidate| is_fence_close(candidate.trim(), marker));
            let Some(offset) = close else {
                let column = raw.len() - raw.trim_start().len() + 1;
                let error = ParseError::fatal("unterminated fenced code block", line, column)
                    .with_context(raw);
                return (blocks, Some(error));
            };
            let body = lines[index..index + offset].join("\n");
            index += offset + 1;
            blocks.push(Block::Fence { info, body, line });
            continue;
        }

        if let Some((level, text)) = heading(trimmed) {
            let column = text.as_ptr() as usize - raw.as_ptr() as usize + 1;
            blocks.push(Block::Heading {
                level,
                text,
                line,
                column,
            });
            continue;
        }

        blocks.push(Block::Text {
            text: trimmed,
            line,
        });
    }

    (blocks, None)
}

/// The fence marker and info string if `line` opens a fence.
fn fence_open(line: &str) -> Option<(&str, &str)> {
    let fence_char = line.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let length = line.chars().take_while(|c| *c == fence_char).count();
    if length < 3 {
        return None;
    }
    let (marker, info) = line.split_at(length);
    Some((marker, info.trim()))
}

fn is_fence_close(line: &str, marker: &str) -> bool {
    let Some(fence_char) = marker.chars().next() else {
        return false;
    };
    line.len() >= marker.len() && line.chars().all(|c| c == fence_char)
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &line[level..];
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some((level, rest.trim().trim_end_matches('#').trim_end()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    #[test]
    fn classifies_blocks_with_positions() {
        let text = "# Title\n\nSome prose\n  ## GET /x\n```json\n{}\n```\n";
        let (blocks, fatal) = scan(&lines(text), 0);
        assert!(fatal.is_none());
        assert_eq!(
            blocks,
            vec![
                Block::Heading {
                    level: 1,
                    text: "Title",
                    line: 1,
                    column: 3
                },
                Block::Text {
                    text: "Some prose",
                    line: 3
                },
                Block::Heading {
                    level: 2,
                    text: "GET /x",
                    line: 4,
                    column: 6
                },
                Block::Fence {
                    info: "json",
                    body: "{}".to_string(),
                    line: 5
                },
            ]
        );
    }

    #[test]
    fn fence_content_is_not_classified() {
        let text = "~~~~\n## not a heading\n~~~\n~~~~";
        let (blocks, fatal) = scan(&lines(text), 0);
        assert!(fatal.is_none());
        assert_eq!(
            blocks,
            vec![Block::Fence {
                info: "",
                body: "## not a heading\n~~~".to_string(),
                line: 1
            }]
        );
    }

    #[test]
    fn unterminated_fence_is_fatal() {
        let text = "intro\n```json\n{\"a\": 1}\n";
        let (blocks, fatal) = scan(&lines(text), 0);
        assert_eq!(blocks.len(), 1);
        let fatal = fatal.unwrap();
        assert!(fatal.fatal);
        assert_eq!((fatal.line, fatal.column), (2, 1));
    }

    #[test]
    fn hashes_without_space_are_text() {
        let (blocks, _) = scan(&lines("#hashtag"), 0);
        assert!(matches!(blocks[0], Block::Text { .. }));
    }

    #[test]
    fn start_offset_keeps_absolute_line_numbers() {
        let (blocks, _) = scan(&lines("---\ntitle: x\n---\nbody"), 3);
        assert_eq!(blocks, vec![Block::Text { text: "body", line: 4 }]);
    }
}
