//! Regex keyword scoring of free-text symptom descriptions.

use once_cell::sync::Lazy;
use regex::Regex;

pub const PSORIASIS_LABEL: &str = "psoriasis-like pattern";

/// Condition labels and the patterns that vote for them, in priority order.
const CONDITION_KEYWORDS: &[(&str, &[&str])] = &[
    (
        PSORIASIS_LABEL,
        &[
            r"\bpsoriasis\b",
            r"\bplaque(?:s)?\b",
            r"\bscal(?:y|es|ing)\b",
            r"\bsilvery\b",
            r"\bwell[- ]?demarcated\b",
            r"\belbows?\b",
            r"\bknees?\b",
            r"\bextensor\b",
            r"\bthick\b",
        ],
    ),
    (
        "eczema-like pattern",
        &[
            r"\beczema\b",
            r"\bdermatitis\b",
            r"\bitch(?:y|ing)\b",
            r"\bxerosis\b",
            r"\bflexural\b",
            r"\bbehind the knees\b",
            r"\belbows?\b",
            r"\bpatch(?:es)?\b",
        ],
    ),
    (
        "tinea-like pattern",
        &[
            r"\btinea\b",
            r"\bfungal\b",
            r"\bringworm\b",
            r"\bannular\b",
            r"\bcentral clearing\b",
            r"\bscaly edge\b",
        ],
    ),
    (
        "acne-like pattern",
        &[
            r"\bacne\b",
            r"\bpimple(?:s)?\b",
            r"\bcomedone(?:s)?\b",
            r"\bpapule(?:s)?\b",
            r"\bpustule(?:s)?\b",
        ],
    ),
    (
        "urticaria-like pattern",
        &[
            r"\bhives\b",
            r"\burticaria\b",
            r"\bwelts?\b",
            r"\btransient\b",
            r"\bmigratory\b",
            r"\bwheal(?:s)?\b",
        ],
    ),
];

static COMPILED: Lazy<Vec<(&'static str, Vec<Regex>)>> = Lazy::new(|| {
    CONDITION_KEYWORDS
        .iter()
        .map(|(label, patterns)| {
            let regexes = patterns
                .iter()
                .map(|p| Regex::new(p).expect("condition keyword pattern"))
                .collect();
            (*label, regexes)
        })
        .collect()
});

static PSORIASIS_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bpsoriasis\b").unwrap());

/// Outcome of scoring a symptom description against the keyword table.
#[derive(Debug, Clone, PartialEq)]
pub struct TextScore {
    pub label: &'static str,
    pub confidence: f32,
    /// Pattern hits per label, in table order.
    pub hits: Vec<(&'static str, usize)>,
}

pub fn score_text_for_conditions(text: &str) -> TextScore {
    let text = text.to_lowercase();
    let mut hits = Vec::with_capacity(COMPILED.len());
    let mut best: Option<(&'static str, usize)> = None;

    for (label, patterns) in COMPILED.iter() {
        let count = patterns.iter().filter(|re| re.is_match(&text)).count();
        hits.push((*label, count));
        if best.map_or(true, |(_, n)| count > n) {
            best = Some((*label, count));
        }
    }

    let (label, best_hits) = best.unwrap_or(("", 0));
    let confidence = if best_hits == 0 {
        0.0
    } else {
        (0.25 * best_hits as f32).min(1.0)
    };

    TextScore {
        label,
        confidence,
        hits,
    }
}

/// True when the text names psoriasis outright.
pub fn mentions_psoriasis(text: &str) -> bool {
    PSORIASIS_WORD.is_match(&text.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_scores_zero_on_first_label() {
        let score = score_text_for_conditions("");
        assert_eq!(score.label, PSORIASIS_LABEL);
        assert_eq!(score.confidence, 0.0);
        assert!(score.hits.iter().all(|(_, n)| *n == 0));
        assert_eq!(score.hits.len(), 5);
    }

    #[test]
    fn psoriasis_description_wins() {
        let score = score_text_for_conditions(
            "Thick silvery plaques on my elbows and knees, very scaly",
        );
        assert_eq!(score.label, PSORIASIS_LABEL);
        // thick, silvery, plaques, elbows, knees, scaly
        assert_eq!(score.hits[0], (PSORIASIS_LABEL, 6));
        assert_eq!(score.confidence, 1.0);
    }

    #[test]
    fn case_is_ignored() {
        let score = score_text_for_conditions("HIVES and WELTS that are Migratory");
        assert_eq!(score.label, "urticaria-like pattern");
        assert_eq!(score.confidence, 0.75);
    }

    #[test]
    fn ties_keep_the_earlier_label() {
        // "elbow" votes for both psoriasis and eczema
        let score = score_text_for_conditions("a rash on my elbow");
        assert_eq!(score.label, PSORIASIS_LABEL);
        assert_eq!(score.hits[1], ("eczema-like pattern", 1));
        assert_eq!(score.confidence, 0.25);
    }

    #[test]
    fn word_boundaries_are_respected() {
        let score = score_text_for_conditions("acnes and pimplesque");
        assert_eq!(score.hits[3], ("acne-like pattern", 0));
    }

    #[test]
    fn multiword_patterns_match() {
        let score = score_text_for_conditions("ring with central clearing, maybe fungal");
        assert_eq!(score.label, "tinea-like pattern");
        assert_eq!(score.confidence, 0.5);
    }

    #[test]
    fn psoriasis_mention_is_detected() {
        assert!(mentions_psoriasis("My mom has Psoriasis too"));
        assert!(!mentions_psoriasis("psoriatic arthritis"));
    }
}
