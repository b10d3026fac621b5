//! Positional task references: "la primera tarea", "tarea 2".
//!
//! Detected before the provider call so the model sees the real title
//! instead of an ordinal it cannot resolve.

use recado_core::text::normalize_title;

/// Spanish ordinal/cardinal words, 1-based.
const ORDINAL_WORDS: &[(&str, usize)] = &[
    ("primera", 1),
    ("primer", 1),
    ("1ra", 1),
    ("1era", 1),
    ("1er", 1),
    ("uno", 1),
    ("segunda", 2),
    ("segundo", 2),
    ("2da", 2),
    ("2do", 2),
    ("dos", 2),
    ("tercera", 3),
    ("tercer", 3),
    ("3ra", 3),
    ("3er", 3),
    ("tres", 3),
    ("cuarta", 4),
    ("cuarto", 4),
    ("4ta", 4),
    ("4to", 4),
    ("cuatro", 4),
    ("quinta", 5),
    ("quinto", 5),
    ("5ta", 5),
    ("5to", 5),
    ("cinco", 5),
    ("sexta", 6),
    ("sexto", 6),
    ("6ta", 6),
    ("6to", 6),
    ("seis", 6),
    ("septima", 7),
    ("septimo", 7),
    ("7ma", 7),
    ("7mo", 7),
    ("siete", 7),
    ("octava", 8),
    ("octavo", 8),
    ("8va", 8),
    ("8vo", 8),
    ("ocho", 8),
    ("novena", 9),
    ("noveno", 9),
    ("9na", 9),
    ("9no", 9),
    ("nueve", 9),
    ("decima", 10),
    ("decimo", 10),
    ("10ma", 10),
    ("10mo", 10),
    ("diez", 10),
];

/// A word token with its byte span in the original text.
struct Word {
    folded: String,
    start: usize,
    end: usize,
}

fn words(text: &str) -> Vec<Word> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (i, ch) in text.char_indices() {
        if ch.is_alphanumeric() {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start.take() {
            out.push(make_word(text, s, i));
        }
    }
    if let Some(s) = start {
        out.push(make_word(text, s, text.len()));
    }
    out
}

fn make_word(text: &str, start: usize, end: usize) -> Word {
    Word {
        folded: normalize_title(&text[start..end]),
        start,
        end,
    }
}

fn ordinal_value(word: &str) -> Option<usize> {
    if let Some(&(_, n)) = ORDINAL_WORDS.iter().find(|(w, _)| *w == word) {
        return Some(n);
    }
    // Bare "tarea 2": any positive number works.
    word.parse::<usize>().ok().filter(|n| *n >= 1)
}

/// Detect a positional task reference ("primera tarea", "tarea 3") and
/// return the zero-based index plus the byte span of the whole phrase.
///
/// Only adjacent word pairs count; "la primera de mis tareas" stays
/// untouched and goes to the provider as-is.
pub(super) fn find_reference(text: &str) -> Option<(usize, std::ops::Range<usize>)> {
    let words = words(text);
    for pair in words.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a.folded == "tarea" {
            if let Some(n) = ordinal_value(&b.folded) {
                return Some((n - 1, a.start..b.end));
            }
        }
        if b.folded == "tarea" {
            if let Some(n) = ordinal_value(&a.folded) {
                return Some((n - 1, a.start..b.end));
            }
        }
    }
    None
}

/// Replace the referenced phrase with the real task title.
pub(super) fn rewrite(text: &str, span: std::ops::Range<usize>, title: &str) -> String {
    let mut out = String::with_capacity(text.len() + title.len());
    out.push_str(&text[..span.start]);
    out.push_str(title);
    out.push_str(&text[span.end..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_ordinal_before_tarea() {
        let (idx, span) = find_reference("marca la primera tarea como hecha").unwrap();
        assert_eq!(idx, 0);
        assert_eq!(
            rewrite("marca la primera tarea como hecha", span, "Pagar cuentas"),
            "marca la Pagar cuentas como hecha"
        );
    }

    #[test]
    fn detects_tarea_number() {
        let (idx, _) = find_reference("elimina la tarea 3").unwrap();
        assert_eq!(idx, 2);
    }

    #[test]
    fn detects_accented_ordinal() {
        let (idx, _) = find_reference("borra la séptima tarea").unwrap();
        assert_eq!(idx, 6);
    }

    #[test]
    fn ignores_plain_text() {
        assert!(find_reference("crea una tarea para estudiar inglés").is_none());
        assert!(find_reference("¿qué tareas tengo?").is_none());
    }

    #[test]
    fn rewrite_keeps_surrounding_text() {
        let text = "ponle recordatorio a la tarea 2 por favor";
        let (idx, span) = find_reference(text).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(
            rewrite(text, span, "Informe mensual"),
            "ponle recordatorio a la Informe mensual por favor"
        );
    }
}
