//! Transcript normalization
//!
//! Lowercases, folds `ё` into `е`, replaces punctuation that carries no
//! meaning for matching with spaces and collapses whitespace. Keeps the
//! characters address and order patterns rely on (`.`, `,`, `-`, `/`, `№`, `#`).

use voice_support_core::Utterance;

/// Normalize a raw transcript. Idempotent.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars().flat_map(|c| c.to_lowercase()) {
        let ch = if ch == 'ё' { 'е' } else { ch };
        if ch.is_alphanumeric() || matches!(ch, '.' | ',' | '-' | '/' | '№' | '#') {
            out.push(ch);
        } else {
            out.push(' ');
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build an `Utterance` from a provider transcript
pub fn utterance(raw: &str) -> Utterance {
    Utterance::new(raw, normalize(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_normalization() {
        assert_eq!(normalize("  Где МОЙ заказ?!  "), "где мой заказ");
        assert_eq!(normalize("Ещё раз"), "еще раз");
        assert_eq!(normalize("г. Москва, ул. Ленина, д. 5"), "г. москва, ул. ленина, д. 5");
        assert_eq!(normalize("заказ №123"), "заказ №123");
    }

    #[test]
    fn test_idempotent() {
        for raw in ["До свидания!", "Санкт-Петербург, кв. 12", "«Привет»\tмир", ""] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_utterance_keeps_raw() {
        let u = utterance("Где мой заказ?");
        assert_eq!(u.raw, "Где мой заказ?");
        assert_eq!(u.normalized, "где мой заказ");
    }
}
