//! Word-boundary text wrapping driven by measured glyph advances.

use crate::error::ExportError;
use crate::font::FontFace;

/// Wraps `text` so that every line fits in `max_width` when drawn with `face`
/// at `font_size`. Words are never split: a word wider than `max_width` gets
/// a line of its own and overflows it.
pub fn wrap(text: &str, max_width: f32, face: &FontFace, font_size: f32) -> Vec<String> {
    let tokens = tokenize_text(text);
    wrap_tokens(&tokens, max_width, face, font_size)
}

/// Total height of `lines` laid out at a fixed `line_height`.
pub fn measure(lines: &[String], line_height: f32) -> f32 {
    lines.len() as f32 * line_height
}

/// Fails with [`ExportError::LayoutFailure`] when `face` cannot draw `text`.
pub fn ensure_supported(text: &str, face: &FontFace) -> Result<(), ExportError> {
    match face.unsupported_char(text) {
        Some(ch) => Err(ExportError::LayoutFailure(format!(
            "unsupported character '{}' (U+{:04X}) in \"{}\"",
            ch, ch as u32, text
        ))),
        None => Ok(()),
    }
}

#[derive(Debug, PartialEq)]
enum Token<'a> {
    Word(&'a str),
    Space,
    Newline,
}

fn wrap_tokens(tokens: &[Token<'_>], max_width: f32, face: &FontFace, font_size: f32) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();

    for token in tokens {
        match token {
            Token::Newline => {
                if !current.is_empty() {
                    result.push(std::mem::take(&mut current));
                }
            }
            Token::Space => {}
            Token::Word(word) => {
                if current.is_empty() {
                    current.push_str(word);
                    continue;
                }
                let candidate_width = face.text_width(&current, font_size)
                    + face.text_width(" ", font_size)
                    + face.text_width(word, font_size);
                if candidate_width > max_width {
                    result.push(std::mem::take(&mut current));
                    current.push_str(word);
                } else {
                    current.push(' ');
                    current.push_str(word);
                }
            }
        }
    }

    if !current.is_empty() {
        result.push(current);
    }
    result
}

fn tokenize_text(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut word_start: Option<usize> = None;

    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(start) = word_start.take() {
                tokens.push(Token::Word(&text[start..idx]));
            }
            if ch == '\n' {
                tokens.push(Token::Newline);
            } else if tokens.last() != Some(&Token::Space) {
                tokens.push(Token::Space);
            }
            continue;
        }
        if word_start.is_none() {
            word_start = Some(idx);
        }
    }
    if let Some(start) = word_start {
        tokens.push(Token::Word(&text[start..]));
    }
    tokens
}
