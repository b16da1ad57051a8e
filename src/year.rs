use chrono::{Datelike, Local};
use regex::Regex;
use std::sync::OnceLock;

fn year_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"20[0-9]{2}").expect("static year pattern"))
}

/// First `20xx` found in the training text, else `current_year`.
pub fn classify_year(pelatihan: &str, ujikom_praktek: &str, current_year: i32) -> String {
    let text = format!("{} {}", pelatihan, ujikom_praktek);
    match year_pattern().find(&text) {
        Some(m) => m.as_str().to_string(),
        None => current_year.to_string(),
    }
}

/// [`classify_year`] against the local wall clock.
pub fn detect_year(pelatihan: &str, ujikom_praktek: &str) -> String {
    classify_year(pelatihan, ujikom_praktek, Local::now().year())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_year_in_training_text() {
        assert_eq!(classify_year("Training Batch 2024 Jakarta", "", 1999), "2024");
    }

    #[test]
    fn falls_back_to_ujikom_text() {
        assert_eq!(classify_year("K3 Umum", "Ujikom Maret 2023", 1999), "2023");
    }

    #[test]
    fn first_match_wins() {
        assert_eq!(classify_year("Batch 2022", "Ujikom 2025", 1999), "2022");
    }

    #[test]
    fn only_ascii_digits_form_a_year() {
        assert_eq!(classify_year("Batch 20\u{0662}\u{0664}", "", 2031), "2031");
        assert_eq!(
            classify_year("Angkatan \u{FF12}\u{FF10}\u{FF12}\u{FF14}", "", 2031),
            "2031"
        );
        assert_eq!(classify_year("Batch 20\u{0662}\u{0664}", "Ujikom 2026", 2031), "2026");
    }

    #[test]
    fn defaults_to_current_year() {
        assert_eq!(classify_year("Batch 19", "tanpa tahun", 2031), "2031");
        assert_eq!(classify_year("", "", 2031), "2031");
    }

    #[test]
    fn wall_clock_default_is_current_year() {
        let now = Local::now().year().to_string();
        assert_eq!(detect_year("no year here", ""), now);
    }
}
