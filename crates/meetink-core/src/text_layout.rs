//! Text measurement and line wrapping.
//!
//! Both interaction bounds and the renderer go through [`layout_text`], so the hit box of a
//! text item is always the box that gets painted.

use kurbo::Rect;

use crate::items::TextData;

/// One laid-out line.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    /// Measured advance width.
    pub width: f64,
    /// Top of the line box in local coordinates.
    pub top: f64,
}

/// Result of laying out a text payload, in local coordinates with the origin at the top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub lines: Vec<TextLine>,
    pub width: f64,
    pub height: f64,
    pub line_height: f64,
}

impl TextLayout {
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

/// Advance width of a single character.
pub fn char_advance(data: &TextData) -> f64 {
    let ratio = data.font_family.advance_ratio();
    let weight = if data.bold { 1.05 } else { 1.0 };
    data.font_size.max(0.0) * ratio * weight
}

/// Measured advance width of a run of text.
pub fn measure(data: &TextData, s: &str) -> f64 {
    s.chars().count() as f64 * char_advance(data)
}

/// Lay out `data.text`, wrapping greedily at word boundaries when `max_width` is set.
///
/// Words wider than the wrap width are broken between characters.
pub fn layout_text(data: &TextData) -> TextLayout {
    let line_height = data.line_height().max(0.0);
    let advance = char_advance(data);
    let wrap = data.max_width.filter(|w| w.is_finite() && *w > 0.0);

    let mut rows: Vec<String> = Vec::new();
    for paragraph in data.text.split('\n') {
        match wrap {
            Some(max) => wrap_paragraph(paragraph, max, advance, &mut rows),
            None => rows.push(paragraph.trim_end_matches('\r').to_string()),
        }
    }

    let lines: Vec<TextLine> = rows
        .into_iter()
        .enumerate()
        .map(|(i, text)| TextLine {
            width: text.chars().count() as f64 * advance,
            top: i as f64 * line_height,
            text,
        })
        .collect();
    let width = lines.iter().map(|l| l.width).fold(0.0, f64::max);
    let height = lines.len() as f64 * line_height;

    TextLayout {
        lines,
        width,
        height,
        line_height,
    }
}

fn wrap_paragraph(paragraph: &str, max_width: f64, advance: f64, rows: &mut Vec<String>) {
    let max_chars = if advance > 0.0 {
        ((max_width / advance).floor() as usize).max(1)
    } else {
        usize::MAX
    };

    let mut current = String::new();
    let mut current_len = 0usize;
    for word in paragraph.split_whitespace() {
        let word_len = word.chars().count();
        let needed = if current_len == 0 { word_len } else { current_len + 1 + word_len };

        if needed <= max_chars {
            if current_len > 0 {
                current.push(' ');
            }
            current.push_str(word);
            current_len = needed;
            continue;
        }

        if current_len > 0 {
            rows.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if word_len <= max_chars {
            current.push_str(word);
            current_len = word_len;
        } else {
            let chars: Vec<char> = word.chars().collect();
            let mut chunks = chars.chunks(max_chars).peekable();
            while let Some(chunk) = chunks.next() {
                let piece: String = chunk.iter().collect();
                if chunks.peek().is_some() {
                    rows.push(piece);
                } else {
                    current_len = chunk.len();
                    current = piece;
                }
            }
        }
    }
    rows.push(current);
}
