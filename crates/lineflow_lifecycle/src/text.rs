//! Operator text folding shared by the parsers.

/// Trim, lowercase and strip Spanish diacritics.
pub fn fold_accents(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' => 'a',
            'é' | 'è' => 'e',
            'í' | 'ì' => 'i',
            'ó' | 'ò' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_accents() {
        assert_eq!(fold_accents(" ELECTRÓNICO "), "electronico");
        assert_eq!(fold_accents("Dic"), "dic");
        assert_eq!(fold_accents("señal"), "señal");
    }
}
