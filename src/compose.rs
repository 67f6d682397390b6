//! Heuristic explanation: merges image cues with keyword hits and writes a
//! single non-diagnostic paragraph.

use image::DynamicImage;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ExplanationLength;
use crate::imaging::{self, Prediction, ERYTHEMA_LABEL, ERYTHEMA_THRESHOLD};
use crate::keywords::{self, PSORIASIS_LABEL};

const TEXTURE_REASON: &str = "coarse/scaly surface texture";

const MONITORING_ADVICE: &str = "Track changes over time (size, borders, color, scale, itch/pain). \
    Use gentle skincare and avoid known triggers or harsh products. \
    Seek in-person evaluation if lesions spread rapidly, bleed, become very painful, \
    or you develop fever or systemic symptoms.";

const DISCLAIMER: &str =
    "This is not a diagnosis; a clinician’s exam is required for confirmation.";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static TRAILING_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]*[.;,]+$").unwrap());

/// Normalize a model answer into one tidy sentence.
pub fn fmt_sentence(s: &str) -> String {
    let s = WHITESPACE.replace_all(s.trim(), " ");
    let s = TRAILING_PUNCT.replace(&s, "");
    let s = s.trim();

    let mut chars = s.chars();
    let mut out = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => return String::new(),
    };
    if !out.ends_with(&['.', '!', '?'][..]) {
        out.push('.');
    }
    out
}

pub fn compose_paragraph(
    diagnosis: Option<&str>,
    reasons: &[String],
    user_text: &str,
    add_safety: bool,
) -> String {
    let mut parts = Vec::new();
    if let Some(diagnosis) = diagnosis {
        parts.push(format!(
            "From the picture you uploaded, it seems like {diagnosis}."
        ));
    }
    let notes = user_text.trim();
    if !notes.is_empty() {
        parts.push(format!(
            "Considering your notes (“{notes}”), here’s a combined, non-diagnostic explanation."
        ));
    }
    if !reasons.is_empty() {
        parts.push(format!("This impression comes from {}.", reasons.join(", ")));
    }
    parts.push(MONITORING_ADVICE.to_string());
    if add_safety {
        parts.push(DISCLAIMER.to_string());
    }

    parts
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| format!("{}.", s.trim_end_matches(&[' ', '.'][..])))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Paragraph built from redness/texture cues, keyword scoring and an
/// optional classifier hint.
pub fn analyze_symptoms(
    img: Option<&DynamicImage>,
    symptom_text: &str,
    hint: Option<&Prediction>,
    length: ExplanationLength,
) -> String {
    let symptom_text = symptom_text.trim();
    let text_score = keywords::score_text_for_conditions(symptom_text);

    let mut reasons: Vec<String> = Vec::new();
    let mut img_label = None;
    if let Some(img) = img {
        let r = imaging::redness_score(img);
        let t = imaging::texture_score(img);
        if r > ERYTHEMA_THRESHOLD {
            reasons.push("prominent erythema".to_string());
        }
        if t > 0.35 {
            reasons.push(TEXTURE_REASON.to_string());
        }
        if r > ERYTHEMA_THRESHOLD && t > 0.40 {
            img_label = Some(PSORIASIS_LABEL);
        } else if r > ERYTHEMA_THRESHOLD {
            img_label = Some(ERYTHEMA_LABEL);
        }

        if let Some(hint) = hint {
            reasons.push(format!(
                "the classifier’s cue ({}, {:.0}%)",
                hint.label,
                hint.score * 100.0
            ));
        }
    }

    let mut candidates: Vec<(&str, f32)> = Vec::new();
    if text_score.confidence >= 0.5 && !text_score.label.is_empty() {
        candidates.push((text_score.label, text_score.confidence + 0.2));
    }
    if let Some(label) = img_label {
        candidates.push((label, 0.5));
    }
    if let Some(hint) = hint {
        candidates.push((hint.label.as_str(), 0.35));
    }

    let mut label = candidates
        .iter()
        .fold(None, |best: Option<(&str, f32)>, &(l, w)| match best {
            Some((_, bw)) if bw >= w => best,
            _ => Some((l, w)),
        })
        .map(|(l, _)| l);

    if keywords::mentions_psoriasis(symptom_text) {
        label = Some(PSORIASIS_LABEL);
    }

    if label == Some(PSORIASIS_LABEL) && !reasons.iter().any(|r| r == TEXTURE_REASON) {
        reasons.push("patchy scale or plaque-like texture on review".to_string());
    }

    if length == ExplanationLength::Long {
        reasons.push(
            "the overall distribution and chronic-sounding course you described".to_string(),
        );
    }

    compose_paragraph(label, &reasons, symptom_text, true)
}
