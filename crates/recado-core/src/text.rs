//! Text normalization and fuzzy matching for Spanish task titles.

/// Normalize a title for lookup: lowercase, strip Spanish diacritics,
/// strip punctuation, collapse whitespace. Idempotent.
pub fn normalize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for ch in title.chars().flat_map(char::to_lowercase) {
        let ch = strip_diacritic(ch);
        if ch.is_alphanumeric() || ch.is_whitespace() {
            out.push(ch);
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase and strip diacritics without touching punctuation. Used where
/// separators like `:` and `/` still carry meaning (date and time parsing).
pub fn fold_lower(s: &str) -> String {
    s.chars()
        .flat_map(char::to_lowercase)
        .map(strip_diacritic)
        .collect()
}

fn strip_diacritic(ch: char) -> char {
    match ch {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        _ => ch,
    }
}

/// Similarity ratio in `[0, 1]` between two normalized strings, based on
/// edit distance. `1.0` means identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - edit_distance(&a, &b) as f64 / max_len as f64
}

fn edit_distance(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let sub = prev[j] + usize::from(ca != cb);
            curr[j + 1] = sub.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_accents_case_punctuation() {
        assert_eq!(
            normalize_title("  Revisar   Liquidaciones!! "),
            "revisar liquidaciones"
        );
        assert_eq!(normalize_title("Práctica de inglés"), "practica de ingles");
        assert_eq!(normalize_title("AÑO nuevo, ¿sí?"), "ano nuevo si");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_title("Comprar útiles — ¡urgente!");
        assert_eq!(normalize_title(&once), once);
    }

    #[test]
    fn normalize_empty() {
        assert_eq!(normalize_title(""), "");
        assert_eq!(normalize_title("  ¡¡!!  "), "");
    }

    #[test]
    fn similarity_bounds() {
        assert_eq!(similarity("pagar cuentas", "pagar cuentas"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert!(similarity("pagar cuentas", "xyz") < 0.3);
    }

    #[test]
    fn similarity_catches_typos() {
        // One substitution in a 13-char string stays well above the cutoff.
        assert!(similarity("pagar cuentas", "pagar cuentes") >= 0.6);
        assert!(similarity("liquidaciones", "liquidacion") >= 0.6);
    }
}
