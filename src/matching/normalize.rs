//! Text normalization for company matching
//!
//! - Unicode NFKC fold
//! - Whitespace collapsing
//! - Trailing legal suffix removal (longest first, case-insensitive, repeated)
//! - Trailing punctuation trimming
//!
//! Case is preserved in the canonical form; [`comparison_key`] lowercases it
//! for equality checks.

use unicode_normalization::UnicodeNormalization;

/// Trailing legal suffixes, longest first. Each carries its leading space so
/// a suffix only matches as a separate word.
const LEGAL_SUFFIXES: &[&str] = &[
    " GMBH & CO. KG",
    " GMBH & CO KG",
    " INCORPORATED",
    " CORPORATION",
    " GMBH & CO.",
    " PTY. LTD.",
    " GMBH & CO",
    " HOLDINGS",
    " PTY LTD",
    " LIMITED",
    " HOLDING",
    " S.P.A.",
    " S.R.L.",
    " S.A.S.",
    " S.P.A",
    " GROUP",
    " CORP.",
    " GMBH",
    " LTD.",
    " INC.",
    " S.A.",
    " N.V.",
    " B.V.",
    " SARL",
    " CORP",
    " A/S",
    " LTD",
    " INC",
    " SPA",
    " SAS",
    " SRL",
    " OYJ",
    " ASA",
    " PLC",
    " LLC",
    " CO.",
    " AG",
    " SA",
    " CO",
    " OY",
    " AB",
    " AS",
    " NV",
    " BV",
    " SE",
    " KG",
];

const TRAILING_PUNCTUATION: &[char] = &[',', '.', ';', ':', '-', '&', ' '];

/// Reduce a raw company string to its canonical form.
///
/// Blank input yields an empty string.
///
/// # Examples
///
/// ```
/// use company_unify::matching::normalize::normalize_company_name;
///
/// assert_eq!(normalize_company_name("ACME Steel GmbH & Co. KG"), "ACME Steel");
/// assert_eq!(normalize_company_name("Apple, Inc."), "Apple");
/// assert_eq!(normalize_company_name("  Outokumpu   Oyj "), "Outokumpu");
/// ```
pub fn normalize_company_name(raw: &str) -> String {
    let folded: String = raw.nfkc().collect();
    let mut name = folded.split_whitespace().collect::<Vec<_>>().join(" ");

    loop {
        name.truncate(name.trim_end_matches(TRAILING_PUNCTUATION).len());
        match LEGAL_SUFFIXES
            .iter()
            .find(|suffix| ends_with_ignore_ascii_case(&name, suffix))
        {
            Some(suffix) => name.truncate(name.len() - suffix.len()),
            None => break,
        }
    }

    name
}

/// Lowercased canonical form, used for exact comparisons
pub fn comparison_key(raw: &str) -> String {
    normalize_company_name(raw).to_lowercase()
}

const COUNTRY_ACRONYMS: &[&str] = &["usa", "us", "uk", "uae", "drc", "ussr"];

/// Standardise country casing: "GERMANY" and "germany" both become "Germany".
///
/// Known country acronyms are upper-cased in any input casing ("usa" and
/// "USA" both become "USA"); other short all-caps tokens are kept as written.
/// Connectives after the first word stay lowercase ("Bosnia and Herzegovina").
pub fn title_case_country(raw: &str) -> String {
    raw.split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            let is_acronym = word.chars().count() <= 3
                && word.chars().all(|c| c.is_uppercase() || !c.is_alphabetic());
            let lower = word.to_lowercase();
            if i > 0 && matches!(lower.as_str(), "and" | "of" | "the") {
                lower
            } else if COUNTRY_ACRONYMS.contains(&lower.as_str()) {
                lower.to_uppercase()
            } else if is_acronym {
                word.to_string()
            } else {
                capitalize(&lower)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn ends_with_ignore_ascii_case(name: &str, suffix: &str) -> bool {
    if name.len() <= suffix.len() {
        return false;
    }
    let start = name.len() - suffix.len();
    name.is_char_boundary(start) && name[start..].eq_ignore_ascii_case(suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffixes_sorted_longest_first() {
        for pair in LEGAL_SUFFIXES.windows(2) {
            assert!(pair[0].len() >= pair[1].len(), "{:?} before {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_strip_compound_suffix() {
        assert_eq!(normalize_company_name("ACME Steel GmbH & Co. KG"), "ACME Steel");
        assert_eq!(
            comparison_key("ACME Steel GmbH & Co. KG"),
            comparison_key("acme steel")
        );
    }

    #[test]
    fn test_strip_repeated_suffixes() {
        assert_eq!(normalize_company_name("Tata Steel Group Ltd."), "Tata Steel");
        assert_eq!(normalize_company_name("Voestalpine AG,"), "Voestalpine");
        assert_eq!(normalize_company_name("Goldman Sachs & Co."), "Goldman Sachs");
    }

    #[test]
    fn test_suffix_must_be_separate_word() {
        assert_eq!(normalize_company_name("Thomas"), "Thomas");
        assert_eq!(normalize_company_name("Arcelor Mittal SA"), "Arcelor Mittal");
        assert_eq!(normalize_company_name("Bag"), "Bag");
    }

    #[test]
    fn test_bare_suffix_is_kept() {
        assert_eq!(normalize_company_name("AG"), "AG");
    }

    #[test]
    fn test_blank_input() {
        assert_eq!(normalize_company_name(""), "");
        assert_eq!(normalize_company_name("   "), "");
    }

    #[test]
    fn test_whitespace_collapse() {
        assert_eq!(
            normalize_company_name("  Salzgitter   Flachstahl  GmbH "),
            "Salzgitter Flachstahl"
        );
    }

    #[test]
    fn test_unicode_fold() {
        // Full-width characters are converted to ASCII by NFKC
        assert_eq!(normalize_company_name("Ａｃｍｅ ＡＧ"), "Acme");
        assert_eq!(normalize_company_name("Société Générale SA"), "Société Générale");
    }

    #[test]
    fn test_nordic_suffix() {
        assert_eq!(comparison_key("Outokumpu Oyj"), comparison_key("OUTOKUMPU"));
    }

    #[test]
    fn test_title_case_country() {
        assert_eq!(title_case_country("GERMANY"), "Germany");
        assert_eq!(title_case_country("united kingdom"), "United Kingdom");
        assert_eq!(title_case_country("UK"), "UK");
        assert_eq!(title_case_country("usa"), "USA");
        assert_eq!(title_case_country("Usa"), "USA");
        assert_eq!(title_case_country("BOSNIA AND HERZEGOVINA"), "Bosnia and Herzegovina");
    }
}
