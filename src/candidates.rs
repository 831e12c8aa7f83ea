use crate::config::RegionProfile;

/// Upper bound on queries issued for a single address.
pub const MAX_CANDIDATES: usize = 3;

/// Fallback queries for a normalized address, most specific first.
///
/// 1. the full normalized address
/// 2. its first two comma separated segments
/// 3. its first segment followed by the region and country
///
/// Candidates that compare equal ignoring case collapse into the earlier one.
pub fn generate(normalized: &str, region: &RegionProfile) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::with_capacity(MAX_CANDIDATES);
    push_distinct(&mut candidates, normalized.to_string());

    let parts: Vec<&str> = normalized
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    if parts.len() >= 2 {
        push_distinct(&mut candidates, parts[..2].join(", "));
    }

    let first = parts.first().copied().unwrap_or_default();
    let coarse = if first.is_empty() {
        region.suffix()
    } else {
        format!("{first}, {}", region.suffix())
    };
    push_distinct(&mut candidates, coarse);

    candidates
}

fn push_distinct(candidates: &mut Vec<String>, candidate: String) {
    if candidate.trim().is_empty() || candidates.len() >= MAX_CANDIDATES {
        return;
    }
    let lowered = candidate.to_lowercase();
    if candidates.iter().any(|c| c.to_lowercase() == lowered) {
        return;
    }
    candidates.push(candidate);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bali() -> RegionProfile {
        RegionProfile::bali()
    }

    #[test]
    fn orders_candidates_from_specific_to_coarse() {
        let candidates = generate("Jalan Tibung Sari, Denpasar, Bali, Indonesia", &bali());
        assert_eq!(
            candidates,
            vec![
                "Jalan Tibung Sari, Denpasar, Bali, Indonesia".to_string(),
                "Jalan Tibung Sari, Denpasar".to_string(),
                "Jalan Tibung Sari, Bali, Indonesia".to_string(),
            ]
        );
        assert_ne!(candidates[0], candidates[1]);
    }

    #[test]
    fn skips_segment_pair_equal_to_the_full_address() {
        let candidates = generate("Canggu, Bali", &bali());
        assert_eq!(
            candidates,
            vec![
                "Canggu, Bali".to_string(),
                "Canggu, Bali, Indonesia".to_string(),
            ]
        );
    }

    #[test]
    fn merges_candidates_that_differ_only_in_case() {
        let candidates = generate("Potato Head, BALI, indonesia", &bali());
        assert_eq!(
            candidates,
            vec![
                "Potato Head, BALI, indonesia".to_string(),
                "Potato Head, BALI".to_string(),
            ]
        );
    }

    #[test]
    fn never_exceeds_the_bound() {
        let candidates = generate("A, B, C, D, E, Bali, Indonesia", &bali());
        assert!(candidates.len() <= MAX_CANDIDATES);
        assert_eq!(candidates[2], "A, Bali, Indonesia");
    }
}
