//! Narrative rendering: backend Markdown to styled, wrapped terminal lines.
//!
//! The narrative comes from a remote service and is written straight into the
//! terminal, so it goes through [`sanitize`] before parsing. Escape sequences
//! in the text would otherwise reach the terminal emulator verbatim.

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use unicode_width::UnicodeWidthStr;

const CODE_BG: Color = Color::Rgb(40, 44, 52);
const CODE_FG: Color = Color::Rgb(171, 178, 191);
const HEADING_COLOR: Color = Color::Rgb(97, 175, 239);
const STRONG_COLOR: Color = Color::Rgb(224, 208, 183);
const EMPHASIS_COLOR: Color = Color::Rgb(152, 195, 121);
const LINK_COLOR: Color = Color::Rgb(86, 182, 194);
const BULLET_COLOR: Color = Color::Rgb(198, 120, 221);
const QUOTE_COLOR: Color = Color::Rgb(128, 128, 128);
const RULE_COLOR: Color = Color::Rgb(80, 80, 80);
const FRAME_COLOR: Color = Color::Rgb(60, 60, 60);

const TAB_WIDTH: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text(String),
    Strong(String),
    Emphasis(String),
    StrongEmphasis(String),
    Code(String),
    Link { text: String, url: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ListMarker {
    Bullet,
    Ordered(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: u8, content: Vec<Inline> },
    Paragraph(Vec<Inline>),
    ListItem { indent: usize, marker: ListMarker, content: Vec<Inline> },
    Quote(Vec<Inline>),
    CodeBlock { language: Option<String>, code: String },
    Rule,
    Blank,
}

/// Strip terminal escape sequences and control characters, expand tabs.
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\u{1b}' => {
                // CSI: ESC [ params final-byte; anything else: ESC + one char
                if chars.peek() == Some(&'[') {
                    chars.next();
                    for next in chars.by_ref() {
                        if ('@'..='~').contains(&next) {
                            break;
                        }
                    }
                } else {
                    chars.next();
                }
            }
            '\n' => out.push('\n'),
            '\t' => out.push_str(&" ".repeat(TAB_WIDTH)),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }

    out
}

pub fn parse(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut code: Option<(Option<String>, Vec<&str>)> = None;

    for line in text.lines() {
        if let Some(fence) = line.trim_start().strip_prefix("```") {
            match code.take() {
                Some((language, body)) => blocks.push(Block::CodeBlock {
                    language,
                    code: body.join("\n"),
                }),
                None => {
                    flush_paragraph(&mut paragraph, &mut blocks);
                    let language = fence.trim();
                    code = Some((
                        (!language.is_empty()).then(|| language.to_string()),
                        Vec::new(),
                    ));
                }
            }
            continue;
        }
        if let Some((_, body)) = code.as_mut() {
            body.push(line);
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::Blank);
            continue;
        }

        let block = if matches!(trimmed, "---" | "***" | "___") {
            Some(Block::Rule)
        } else if let Some(heading) = parse_heading(trimmed) {
            Some(heading)
        } else if let Some(quoted) = trimmed.strip_prefix('>') {
            Some(Block::Quote(parse_inline(quoted.trim())))
        } else {
            parse_list_item(line)
        };

        match block {
            Some(block) => {
                flush_paragraph(&mut paragraph, &mut blocks);
                blocks.push(block);
            }
            None => paragraph.push(trimmed),
        }
    }

    flush_paragraph(&mut paragraph, &mut blocks);
    // An unterminated fence still shows its contents
    if let Some((language, body)) = code {
        if !body.is_empty() {
            blocks.push(Block::CodeBlock {
                language,
                code: body.join("\n"),
            });
        }
    }

    blocks
}

fn flush_paragraph(lines: &mut Vec<&str>, blocks: &mut Vec<Block>) {
    if lines.is_empty() {
        return;
    }
    blocks.push(Block::Paragraph(parse_inline(&lines.join(" "))));
    lines.clear();
}

fn parse_heading(trimmed: &str) -> Option<Block> {
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some(Block::Heading {
        level: level as u8,
        content: parse_inline(rest.trim()),
    })
}

fn parse_list_item(line: &str) -> Option<Block> {
    let indent = line.len() - line.trim_start().len();
    let trimmed = line.trim_start();

    for bullet in ["- ", "* ", "+ "] {
        if let Some(text) = trimmed.strip_prefix(bullet) {
            return Some(Block::ListItem {
                indent,
                marker: ListMarker::Bullet,
                content: parse_inline(text),
            });
        }
    }

    let (number, text) = trimmed.split_once(". ")?;
    let number: u32 = number.parse().ok()?;
    Some(Block::ListItem {
        indent,
        marker: ListMarker::Ordered(number),
        content: parse_inline(text),
    })
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
}

/// Inline markup: `code`, *em*, **strong**, ***both***, [text](url).
/// Underscores inside words (snake_case) stay literal.
pub fn parse_inline(text: &str) -> Vec<Inline> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    let mut plain = String::new();
    let mut unclosed = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let consumed = match c {
            '`' => find(&chars, i + 1, |ch| ch == '`').map(|end| {
                let code: String = chars[i + 1..end].iter().collect();
                (Inline::Code(code), end + 1)
            }),
            '*' | '_' => emphasis_at(&chars, i, &mut unclosed),
            '[' => link_at(&chars, i),
            _ => None,
        };

        match consumed {
            Some((inline, next)) => {
                if !plain.is_empty() {
                    out.push(Inline::Text(std::mem::take(&mut plain)));
                }
                // Empty code spans vanish
                if inline != Inline::Code(String::new()) {
                    out.push(inline);
                }
                i = next;
            }
            None => {
                plain.push(c);
                i += 1;
            }
        }
    }

    if !plain.is_empty() {
        out.push(Inline::Text(plain));
    }
    out
}

fn find(chars: &[char], from: usize, pred: impl Fn(char) -> bool) -> Option<usize> {
    (from..chars.len()).find(|&j| pred(chars[j]))
}

/// `unclosed` remembers marker runs with no closer anywhere after them, so a
/// later opener of the same run is rejected without rescanning.
fn emphasis_at(
    chars: &[char],
    start: usize,
    unclosed: &mut Vec<(char, usize)>,
) -> Option<(Inline, usize)> {
    let marker = chars[start];
    let underscore = marker == '_';
    if underscore && start > 0 && is_word_char(chars[start - 1]) {
        return None;
    }

    let run = chars[start..].iter().take_while(|&&c| c == marker).count().min(3);
    let open_end = start + run;
    if underscore && !chars.get(open_end).is_some_and(|&c| is_word_char(c)) {
        return None;
    }
    if unclosed.contains(&(marker, run)) {
        return None;
    }

    let mut j = open_end;
    while j + run <= chars.len() {
        let closes = chars[j..j + run].iter().all(|&c| c == marker)
            && !(underscore && chars.get(j + run).is_some_and(|&c| is_word_char(c)));
        if closes && j > open_end {
            let content: String = chars[open_end..j].iter().collect();
            let inline = match run {
                1 => Inline::Emphasis(content),
                2 => Inline::Strong(content),
                _ => Inline::StrongEmphasis(content),
            };
            return Some((inline, j + run));
        }
        j += 1;
    }
    unclosed.push((marker, run));
    None
}

fn link_at(chars: &[char], start: usize) -> Option<(Inline, usize)> {
    let close = find(chars, start + 1, |c| c == ']')?;
    if chars.get(close + 1) != Some(&'(') {
        return None;
    }
    let paren = find(chars, close + 2, |c| c == ')')?;
    Some((
        Inline::Link {
            text: chars[start + 1..close].iter().collect(),
            url: chars[close + 2..paren].iter().collect(),
        },
        paren + 1,
    ))
}

fn inline_spans(content: &[Inline], base: Style) -> Vec<Span<'static>> {
    content
        .iter()
        .map(|inline| match inline {
            Inline::Text(t) => Span::styled(t.clone(), base),
            Inline::Strong(t) => Span::styled(
                t.clone(),
                base.fg(STRONG_COLOR).add_modifier(Modifier::BOLD),
            ),
            Inline::Emphasis(t) => Span::styled(
                t.clone(),
                base.fg(EMPHASIS_COLOR).add_modifier(Modifier::ITALIC),
            ),
            Inline::StrongEmphasis(t) => Span::styled(
                t.clone(),
                base.fg(STRONG_COLOR)
                    .add_modifier(Modifier::BOLD | Modifier::ITALIC),
            ),
            Inline::Code(t) => Span::styled(format!(" {} ", t), Style::default().fg(CODE_FG).bg(CODE_BG)),
            // Terminals get the text only; the URL is not clickable here
            Inline::Link { text, .. } => Span::styled(
                text.clone(),
                base.fg(LINK_COLOR).add_modifier(Modifier::UNDERLINED),
            ),
        })
        .collect()
}

/// Greedy word wrap. `prefix` starts the first line, `hang` every following one.
fn wrap(
    spans: Vec<Span<'static>>,
    width: usize,
    prefix: Vec<Span<'static>>,
    hang: usize,
) -> Vec<Line<'static>> {
    let width = width.max(hang + 8);
    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = prefix;
    let mut used: usize = current.iter().map(|s| s.content.width()).sum();
    let mut has_words = false;

    for span in spans {
        for word in span.content.split_inclusive(' ') {
            let w = word.trim_end().width();
            if has_words && used + w > width {
                lines.push(finish_line(std::mem::take(&mut current)));
                current.push(Span::raw(" ".repeat(hang)));
                used = hang;
                has_words = false;
            }
            let piece = if has_words { word } else { word.trim_start() };
            if piece.is_empty() {
                continue;
            }
            used += piece.width();
            has_words = true;
            current.push(Span::styled(piece.to_string(), span.style));
        }
    }

    if has_words || lines.is_empty() {
        lines.push(finish_line(current));
    }
    lines
}

fn finish_line(mut spans: Vec<Span<'static>>) -> Line<'static> {
    if let Some(last) = spans.last_mut() {
        let trimmed = last.content.trim_end();
        if trimmed.len() != last.content.len() {
            last.content = trimmed.to_string().into();
        }
    }
    Line::from(spans)
}

pub fn render(blocks: &[Block], width: usize) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for block in blocks {
        match block {
            Block::Heading { level, content } => {
                let style = match level {
                    1 => Style::default()
                        .fg(HEADING_COLOR)
                        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
                    2 => Style::default().fg(HEADING_COLOR).add_modifier(Modifier::BOLD),
                    _ => Style::default()
                        .fg(HEADING_COLOR)
                        .add_modifier(Modifier::BOLD | Modifier::DIM),
                };
                let heading = wrap(inline_spans(content, style), width, Vec::new(), 0);
                let text_width = heading
                    .iter()
                    .map(|l| l.width())
                    .max()
                    .unwrap_or(0);
                lines.extend(heading);
                if *level == 1 {
                    lines.push(Line::from(Span::styled(
                        "─".repeat(text_width.min(width)),
                        Style::default().fg(Color::Rgb(70, 85, 110)),
                    )));
                }
            }
            Block::Paragraph(content) => {
                lines.extend(wrap(inline_spans(content, Style::default()), width, Vec::new(), 0));
            }
            Block::ListItem { indent, marker, content } => {
                let bullet = match marker {
                    ListMarker::Bullet => "• ".to_string(),
                    ListMarker::Ordered(n) => format!("{}. ", n),
                };
                let hang = indent + bullet.width();
                let prefix = vec![
                    Span::raw(" ".repeat(*indent)),
                    Span::styled(bullet, Style::default().fg(BULLET_COLOR)),
                ];
                lines.extend(wrap(inline_spans(content, Style::default()), width, prefix, hang));
            }
            Block::Quote(content) => {
                let style = Style::default().fg(QUOTE_COLOR).add_modifier(Modifier::ITALIC);
                let wrapped = wrap(inline_spans(content, style), width.saturating_sub(2), Vec::new(), 0);
                lines.extend(wrapped.into_iter().map(|line| {
                    let mut spans = vec![Span::styled("│ ", Style::default().fg(QUOTE_COLOR))];
                    spans.extend(line.spans);
                    Line::from(spans)
                }));
            }
            Block::CodeBlock { language, code } => {
                let lang = language.as_deref().unwrap_or("code");
                lines.push(Line::from(vec![
                    Span::styled(format!("┌─ {} ", lang), Style::default().fg(CODE_FG)),
                    Span::styled(
                        "─".repeat(width.saturating_sub(lang.width() + 4)),
                        Style::default().fg(FRAME_COLOR),
                    ),
                ]));
                for code_line in code.lines() {
                    lines.push(Line::from(vec![
                        Span::styled("│ ", Style::default().fg(FRAME_COLOR)),
                        Span::styled(code_line.to_string(), Style::default().fg(CODE_FG).bg(CODE_BG)),
                    ]));
                }
                lines.push(Line::from(Span::styled(
                    format!("└{}", "─".repeat(width.saturating_sub(1))),
                    Style::default().fg(FRAME_COLOR),
                )));
            }
            Block::Rule => {
                lines.push(Line::from(Span::styled(
                    "─".repeat(width),
                    Style::default().fg(RULE_COLOR),
                )));
            }
            Block::Blank => {
                // Collapse runs of blank lines
                if lines.last().is_some_and(|l| l.width() > 0) {
                    lines.push(Line::from(""));
                }
            }
        }
    }

    lines
}

/// Sanitize, parse and render in one go.
pub fn render_narrative(text: &str, width: usize) -> Vec<Line<'static>> {
    render(&parse(&sanitize(text)), width)
}

/// The sanitized source, one terminal line per Markdown line.
pub fn raw_lines(text: &str) -> Vec<Line<'static>> {
    sanitize(text)
        .lines()
        .map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(CODE_FG))))
        .collect()
}
