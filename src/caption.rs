//! Derm-focused captioning: ask a VQA model about the lesion crop, fall back
//! to plain captions, and drop answers that say nothing about skin.

use image::DynamicImage;
use tracing::{debug, warn};

use crate::compose::fmt_sentence;
use crate::imaging;
use crate::inference::VisionModel;

pub const LESION_QUESTION: &str =
    "In one concise, non-diagnostic clinical sentence, describe the visible skin lesion: \
     location (if visible), color (e.g., erythema), scaling/crusting, borders \
     (well-demarcated vs ill-defined), and pattern/distribution.";

const TRIVIAL: &[&str] = &[
    "no",
    "none",
    "unknown",
    "n/a",
    "na",
    "nothing",
    "cannot tell",
    "can't tell",
    "unsure",
];

const GENERIC_BAD: &[&str] = &[
    "person", "man", "woman", "boy", "girl", "towel", "hat", "phone", "bathroom", "mirror",
    "kitchen", "sofa",
];

const DERM_HINT_GOOD: &[&str] = &[
    "skin",
    "lesion",
    "rash",
    "red",
    "erythema",
    "plaque",
    "patch",
    "scaly",
    "scale",
    "flaky",
    "itch",
    "border",
    "demarcated",
    "ill-defined",
    "crust",
    "ulcer",
    "vesicle",
    "pustule",
    "papule",
    "hyperpigmented",
    "hypopigmented",
];

/// Answers shorter than this are only kept when they mention skin.
const MIN_INFORMATIVE_CHARS: usize = 20;

pub fn looks_trivial(s: &str) -> bool {
    let t = s.trim().to_lowercase();
    t.chars().count() < 4 || TRIVIAL.contains(&t.as_str())
}

pub fn is_derm_relevant(s: &str) -> bool {
    let t = s.to_lowercase();
    DERM_HINT_GOOD.iter().any(|k| t.contains(k))
}

/// Substring matching, so "woman" also counts as "man".
pub fn too_generic(s: &str) -> bool {
    let t = s.to_lowercase();
    let hits = GENERIC_BAD.iter().filter(|k| t.contains(*k)).count();
    hits >= 2 && !is_derm_relevant(s)
}

/// One sentence describing the lesion, or `None` when the models produce
/// nothing useful.
pub async fn caption_image<V: VisionModel>(model: &V, img: &DynamicImage) -> Option<String> {
    let roi = imaging::crop_lesion(img);

    match model.answer(&roi, LESION_QUESTION).await {
        Ok(answer) => {
            let answer = answer.trim();
            if !looks_trivial(answer)
                && (is_derm_relevant(answer) || answer.chars().count() >= MIN_INFORMATIVE_CHARS)
            {
                return Some(fmt_sentence(answer));
            }
            debug!(answer, "VQA answer discarded");
        }
        Err(e) => warn!("VQA model failed: {e}"),
    }

    for candidate in [&*roi, img] {
        match model.caption(candidate).await {
            Ok(caption) => {
                let caption = caption.trim();
                if !caption.is_empty() && !too_generic(caption) {
                    return Some(fmt_sentence(caption));
                }
                debug!(caption, "Caption discarded");
            }
            Err(e) => {
                warn!("Caption model failed: {e}");
                return None;
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::tests::solid;
    use crate::inference::InferenceError;
    use std::sync::Mutex;

    /// Replays canned replies and records the width of every image it saw.
    struct ScriptedVision {
        answer: Result<&'static str, ()>,
        captions: Mutex<Vec<Result<&'static str, ()>>>,
        seen: Mutex<Vec<u32>>,
    }

    impl ScriptedVision {
        fn new(answer: Result<&'static str, ()>, captions: Vec<Result<&'static str, ()>>) -> Self {
            Self {
                answer,
                captions: Mutex::new(captions),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    fn failure() -> InferenceError {
        InferenceError::Malformed("scripted failure".to_string())
    }

    impl VisionModel for ScriptedVision {
        async fn answer(&self, image: &DynamicImage, _question: &str) -> Result<String, InferenceError> {
            self.seen.lock().unwrap().push(image.width());
            self.answer.map(str::to_string).map_err(|_| failure())
        }

        async fn caption(&self, image: &DynamicImage) -> Result<String, InferenceError> {
            self.seen.lock().unwrap().push(image.width());
            let next = self.captions.lock().unwrap().remove(0);
            next.map(str::to_string).map_err(|_| failure())
        }
    }

    #[test]
    fn trivial_answers() {
        assert!(looks_trivial(""));
        assert!(looks_trivial(" no "));
        assert!(looks_trivial("Can't tell"));
        assert!(looks_trivial("red"));
        assert!(!looks_trivial("redness"));
    }

    #[test]
    fn derm_relevance_and_genericness() {
        assert!(is_derm_relevant("A Scaly patch"));
        assert!(!is_derm_relevant("a cat on a sofa"));
        assert!(too_generic("a man in a bathroom"));
        assert!(!too_generic("a man with a red rash in a bathroom"));
        assert!(!too_generic("a kitchen"));
    }

    #[tokio::test]
    async fn informative_vqa_answer_wins() {
        let vision = ScriptedVision::new(Ok("  red scaly plaque, well demarcated ; "), vec![]);
        let img = solid(50, 50, [200, 150, 150]);
        let caption = caption_image(&vision, &img).await;
        assert_eq!(caption.as_deref(), Some("Red scaly plaque, well demarcated."));
        assert_eq!(vision.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn trivial_answer_falls_back_to_caption() {
        let vision = ScriptedVision::new(Ok("unsure"), vec![Ok("a close up of an arm with spots")]);
        let img = solid(50, 50, [200, 150, 150]);
        let caption = caption_image(&vision, &img).await;
        assert_eq!(caption.as_deref(), Some("A close up of an arm with spots."));
    }

    #[tokio::test]
    async fn generic_roi_caption_retries_full_image() {
        let vision = ScriptedVision::new(
            Err(()),
            vec![Ok("a woman holding a phone"), Ok("skin with a rash")],
        );
        let img = solid(50, 50, [200, 150, 150]);
        let caption = caption_image(&vision, &img).await;
        assert_eq!(caption.as_deref(), Some("Skin with a rash."));
        assert_eq!(vision.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn caption_failure_gives_up() {
        let vision = ScriptedVision::new(Ok("no"), vec![Err(()), Ok("skin with a rash")]);
        let img = solid(50, 50, [200, 150, 150]);
        assert_eq!(caption_image(&vision, &img).await, None);
    }

    #[tokio::test]
    async fn vqa_sees_the_lesion_crop() {
        let mut img = image::RgbImage::from_pixel(200, 200, image::Rgb([180, 180, 180]));
        for y in 50..90 {
            for x in 50..90 {
                img.put_pixel(x, y, image::Rgb([255, 0, 0]));
            }
        }
        let img = DynamicImage::ImageRgb8(img);
        let vision = ScriptedVision::new(Ok("erythematous patch on the forearm"), vec![]);
        caption_image(&vision, &img).await;
        assert_eq!(vision.seen.lock().unwrap().as_slice(), &[46]);
    }
}
