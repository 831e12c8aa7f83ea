use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::RegionProfile;

/// Indonesian address abbreviations, applied top to bottom. Later rules see
/// the text left behind by earlier ones, so the order is significant.
const ABBREVIATIONS: &[(&str, &str)] = &[
    (r"(?i)\bJl\b\.?", "Jalan"),
    (r"(?i)\bGg\b\.?", "Gang"),
    // Kecamatan (subdistrict)
    (r"(?i)\bKec\b\.?", ""),
    // Kabupaten (regency)
    (r"(?i)\bKab(?:upaten)?\b\.?", ""),
    (r"(?i)\bKota\b", ""),
    (r"(?i)\bBar\.", "Barat"),
    (r"(?i)\bSel\.", "Selatan"),
    (r"(?i)\bUt\.", "Utara"),
    (r"(?i)\bTim\.", "Timur"),
    (r"(?i)\bRegency\b", ""),
];

static SUBSTITUTIONS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    ABBREVIATIONS
        .iter()
        .map(|(pattern, replacement)| {
            (
                Regex::new(pattern).expect("abbreviation patterns are valid"),
                *replacement,
            )
        })
        .collect()
});

static POSTCODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{5}\b").expect("postcode pattern"));
static COMMA_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*,[\s,]*").expect("comma run pattern"));
static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("space run pattern"));

/// Turns free-text venue addresses into region-biased geocoder queries.
#[derive(Clone, Debug)]
pub struct AddressNormalizer {
    region: String,
    country: String,
}

impl AddressNormalizer {
    pub fn new(profile: &RegionProfile) -> Self {
        Self {
            region: profile.region.clone(),
            country: profile.country.clone(),
        }
    }

    /// The result always names the region and the country, even for empty
    /// input.
    pub fn normalize(&self, raw: &str) -> String {
        let mut text = POSTCODE.replace_all(raw.trim(), "").into_owned();
        for (pattern, replacement) in SUBSTITUTIONS.iter() {
            text = pattern.replace_all(&text, *replacement).into_owned();
        }

        let text = COMMA_RUN.replace_all(&text, ", ");
        let text = SPACE_RUN.replace_all(&text, " ");
        let mut normalized = text
            .trim_matches(|c: char| c == ',' || c.is_whitespace())
            .to_string();

        append_if_absent(&mut normalized, &self.region);
        append_if_absent(&mut normalized, &self.country);
        normalized
    }
}

fn append_if_absent(address: &mut String, literal: &str) {
    if address.to_lowercase().contains(&literal.to_lowercase()) {
        return;
    }
    if !address.is_empty() {
        address.push_str(", ");
    }
    address.push_str(literal);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> AddressNormalizer {
        AddressNormalizer::new(&RegionProfile::bali())
    }

    #[test]
    fn expands_street_prefix_and_drops_postcode() {
        let normalized = normalizer().normalize("Jl. Tibung Sari, Denpasar, 80222");
        assert_eq!(normalized, "Jalan Tibung Sari, Denpasar, Bali, Indonesia");
    }

    #[test]
    fn removes_administrative_words_and_tidies_separators() {
        let normalized =
            normalizer().normalize("  Gg. Mawar 3 ,  Kec. Kuta Utara, Kab. Badung,, 80361 ");
        assert_eq!(normalized, "Gang Mawar 3, Kuta Utara, Badung, Bali, Indonesia");
    }

    #[test]
    fn expands_compass_abbreviations() {
        let normalized = normalizer().normalize("Jl. Gunung Soputan, Denpasar Bar.");
        assert_eq!(
            normalized,
            "Jalan Gunung Soputan, Denpasar Barat, Bali, Indonesia"
        );
    }

    #[test]
    fn compass_rules_expand_at_segment_end_and_before_words() {
        let n = normalizer();
        assert_eq!(
            n.normalize("Kec. Denpasar Sel., Kota Denpasar"),
            "Denpasar Selatan, Denpasar, Bali, Indonesia"
        );
        assert_eq!(
            n.normalize("Jl. Raya Kuta Ut. 5"),
            "Jalan Raya Kuta Utara 5, Bali, Indonesia"
        );
        // A dotted "Bar" that belongs to a name is expanded as well.
        assert_eq!(
            n.normalize("Twice Bar., Jl. Pantai Kuta"),
            "Twice Barat, Jalan Pantai Kuta, Bali, Indonesia"
        );
        assert_eq!(
            n.normalize("Twice Bar, Jl. Pantai Kuta"),
            "Twice Bar, Jalan Pantai Kuta, Bali, Indonesia"
        );
    }

    #[test]
    fn does_not_repeat_region_or_country() {
        let normalized = normalizer().normalize("Jl. Raya Ubud, Gianyar, bali, INDONESIA");
        assert_eq!(normalized, "Jalan Raya Ubud, Gianyar, bali, INDONESIA");
    }

    #[test]
    fn empty_and_abbreviation_only_input_still_carry_context() {
        assert_eq!(normalizer().normalize(""), "Bali, Indonesia");
        assert_eq!(normalizer().normalize("   "), "Bali, Indonesia");
        assert_eq!(normalizer().normalize("Kec. , Kota 80111"), "Bali, Indonesia");
    }

    #[test]
    fn keeps_longer_numbers() {
        let normalized = normalizer().normalize("Jl. Sunset Road 123456, Kuta");
        assert!(normalized.contains("123456"));
    }
}
