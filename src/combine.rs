use crate::types::{
    round_score, AudioStageResult, Breakdown, FinalResult, TranscriptResult, VisualStageResult,
};

/// Weight of the visual score in the overall score
pub const VISUAL_WEIGHT: f64 = 0.6;
/// Weight of the audio score in the overall score
pub const AUDIO_WEIGHT: f64 = 0.4;

/// Merge the two stage results into the final result.
///
/// The overall score is `round(0.6 * visual + 0.4 * audio)`; comments are the
/// visual comments followed by the audio comments, uncapped and undeduplicated.
/// An empty transcript is dropped from the result.
pub fn combine(
    visual: &VisualStageResult,
    audio: &AudioStageResult,
    transcript: Option<&TranscriptResult>,
) -> FinalResult {
    let visual = visual.clone().clamped();
    let audio = audio.clone().clamped();

    let overall_score = round_score(VISUAL_WEIGHT * visual.score + AUDIO_WEIGHT * audio.score);
    let confidence = round_score((visual.confidence + audio.confidence) / 2.0);

    let breakdown = Breakdown {
        sharpness: visual.breakdown.sharpness,
        exposure: visual.breakdown.exposure,
        stability: visual.breakdown.stability,
        composition: visual.breakdown.composition,
        audio_clarity: audio.breakdown.audio_clarity,
        engagement: audio.breakdown.engagement,
    };

    let mut comments = visual.comments;
    comments.extend(audio.comments);

    FinalResult {
        overall_score,
        breakdown,
        comments,
        confidence,
        transcript: transcript.filter(|t| !t.is_empty()).cloned(),
        visual_score: visual.score,
        audio_score: audio.score,
    }
}
