//! Despacho-date extraction from free text.
//!
//! Patterns are tried in a fixed priority order and the first pattern that
//! matches anywhere in the text wins, regardless of where other dates sit.
//! The last pattern accepts any isolated `DD/MM/YYYY`, so texts that only
//! mention, say, a hearing date will report that date.

use regex::Regex;
use std::sync::OnceLock;

/// Most specific first. Each pattern captures the date in group 1.
const DESPACHO_PATTERNS: &[&str] = &[
    r"DATA\s+DE\s+EXPEDIENTE:\s*(\d{2}/\d{2}/\d{4})",
    r"Data\s+de\s+Expediente:\s*(\d{2}/\d{2}/\d{4})",
    r"DATA\s+DE\s+VINCULA[ÇC][ÃA]O:\s*(\d{2}/\d{2}/\d{4})",
    r"Data\s+de\s+Vincula[çc][ãa]o:\s*(\d{2}/\d{2}/\d{4})",
    r"DATA\s+VINCULA[ÇC][ÃA]O:\s*(\d{2}/\d{2}/\d{4})",
    r"Data\s+Vincula[çc][ãa]o:\s*(\d{2}/\d{2}/\d{4})",
    r"Vincula[çc][ãa]o:\s*(\d{2}/\d{2}/\d{4})",
    r"DATA:\s*(\d{2}/\d{2}/\d{4})",
    r"Data:\s*(\d{2}/\d{2}/\d{4})",
    // distribution notices: "distribuido para ... na data de DD/MM/YYYY"
    r"na\s+data\s+de\s+(\d{2}/\d{2}/\d{4})",
    r"\b(\d{2}/\d{2}/\d{4})\b",
];

fn patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        DESPACHO_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("valid despacho pattern"))
            .collect()
    })
}

/// Recover the despacho date (`DD/MM/YYYY`) from a communication text.
#[must_use]
pub fn extract_despacho_date(text: &str) -> Option<&str> {
    patterns()
        .iter()
        .find_map(|re| re.captures(text).and_then(|caps| caps.get(1)))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expediente_label() {
        assert_eq!(
            extract_despacho_date("DATA DE EXPEDIENTE: 05/11/2025 - Processo foo"),
            Some("05/11/2025")
        );
        assert_eq!(
            extract_despacho_date("Data de Expediente: 15/12/2025 - Processo xyz"),
            Some("15/12/2025")
        );
    }

    #[test]
    fn test_distribution_notice() {
        let text = "Processo 4002606-06.2025.8.26.0438 distribuido para Vara do Juizado \
                    Especial Cível e Criminal da Comarca de Penápolis na data de 10/11/2025.";
        assert_eq!(extract_despacho_date(text), Some("10/11/2025"));
    }

    #[test]
    fn test_vinculacao_variants() {
        assert_eq!(
            extract_despacho_date("DATA DE VINCULAÇÃO: 20/11/2025"),
            Some("20/11/2025")
        );
        assert_eq!(
            extract_despacho_date("Data de Vinculacao: 21/11/2025"),
            Some("21/11/2025")
        );
        assert_eq!(
            extract_despacho_date("DATA VINCULAÇÃO: 22/11/2025"),
            Some("22/11/2025")
        );
        assert_eq!(
            extract_despacho_date("Vinculação: 23/11/2025"),
            Some("23/11/2025")
        );
    }

    #[test]
    fn test_bare_data_label() {
        assert_eq!(
            extract_despacho_date("Intimação com DATA: 20/11/2025"),
            Some("20/11/2025")
        );
    }

    #[test]
    fn test_priority_beats_position() {
        let text = "Audiência em 01/12/2025. DATA DE EXPEDIENTE: 05/11/2025";
        assert_eq!(extract_despacho_date(text), Some("05/11/2025"));

        let text = "na data de 03/11/2025, Data: 04/11/2025";
        assert_eq!(extract_despacho_date(text), Some("04/11/2025"));
    }

    #[test]
    fn test_isolated_date_fallback() {
        assert_eq!(
            extract_despacho_date("Audiência marcada para 25/12/2025"),
            Some("25/12/2025")
        );
    }

    #[test]
    fn test_no_date() {
        assert_eq!(extract_despacho_date("Processo sem data no texto"), None);
        assert_eq!(extract_despacho_date(""), None);
        assert_eq!(extract_despacho_date("prazo 123/45/67890"), None);
    }
}
