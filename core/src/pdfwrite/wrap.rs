//! Character-by-character line wrapping suitable for CJK: no word
//! boundaries are assumed, and newlines in the input always force a break.

use ttf_parser::Face;

/// Measures one character's advance width at `font_size`, falling back to
/// `0.5 * font_size` when the face has no glyph for it.
pub fn char_width(face: Option<&Face>, ch: char, font_size: f32) -> f32 {
    let units_per_em = face.map(|f| f.units_per_em() as f32).unwrap_or(1000.0);
    let advance = face.and_then(|f| {
        let glyph_id = f.glyph_index(ch)?;
        f.glyph_hor_advance(glyph_id)
    });
    match advance {
        Some(units) => units as f32 / units_per_em * font_size,
        None => 0.5 * font_size,
    }
}

pub struct Wrapped {
    pub lines: Vec<String>,
}

/// Commits a line when the next character would overflow `max_width` and
/// the current line is non-empty; explicit newlines always force a break.
pub fn wrap(text: &str, face: Option<&Face>, font_size: f32, max_width: f32) -> Wrapped {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0.0f32;

    for ch in text.chars() {
        if ch == '\n' {
            lines.push(std::mem::take(&mut current));
            current_width = 0.0;
            continue;
        }
        let w = char_width(face, ch, font_size);
        if !current.is_empty() && current_width + w > max_width {
            lines.push(std::mem::take(&mut current));
            current_width = 0.0;
        }
        current.push(ch);
        current_width += w;
    }
    lines.push(current);

    Wrapped { lines }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_empty_text_yields_one_empty_line() {
        let w = wrap("", None, 10.0, 100.0);
        assert_eq!(w.lines, vec![""]);
    }

    #[test]
    fn wrap_respects_explicit_newlines() {
        let w = wrap("a\nb", None, 10.0, 1000.0);
        assert_eq!(w.lines, vec!["a", "b"]);
    }

    #[test]
    fn wrap_breaks_when_width_exceeded_without_face() {
        // No face: every char costs 0.5*font_size = 5.0; max_width 12 fits 2 chars.
        let w = wrap("abcd", None, 10.0, 12.0);
        assert_eq!(w.lines, vec!["ab", "cd"]);
    }

    #[test]
    fn wrap_never_drops_a_character() {
        let text = "hello\nworld again";
        let w = wrap(text, None, 8.0, 20.0);
        let total: String = w.lines.join("\n");
        assert_eq!(total.chars().filter(|c| *c != '\n').count(), text.chars().filter(|c| *c != '\n').count());
    }
}
