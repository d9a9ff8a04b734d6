// Best-image selection shared by the artwork providers
// Each provider feeds its raw image lists through the same policy shape,
// parameterized by how that provider scores images.

use std::cmp::Ordering;

use crate::models::ImageCandidate;

/// How surviving backdrop candidates are ranked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackdropRanking {
    /// Highest rating then widest, among candidates with at least one vote.
    /// Falls back to widest when nothing has been voted on.
    RatingThenWidth,
    /// Widest first, likes break ties
    WidthThenLikes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackdropPolicy {
    /// Narrow to 16:9 candidates when any exist
    pub prefer_tv_ratio: bool,
    pub ranking: BackdropRanking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoPolicy {
    /// rating * 100 + vote count
    CompositeScore,
    /// Widest first, likes break ties
    WidthThenLikes,
}

/// Pick the backdrop to display from a provider's candidates.
///
/// Preference order: the pinned image (if any), then text-free images, then
/// images in `language`, then anything.
pub fn select_backdrop<'a>(
    candidates: &'a [ImageCandidate],
    policy: BackdropPolicy,
    language: &str,
    preferred_id: Option<&str>,
) -> Option<&'a ImageCandidate> {
    let usable: Vec<&ImageCandidate> = candidates.iter().filter(|c| !c.url.is_empty()).collect();
    if usable.is_empty() {
        return None;
    }

    if let Some(pinned) = find_pinned(&usable, preferred_id) {
        return Some(pinned);
    }

    let text_free: Vec<&ImageCandidate> =
        usable.iter().copied().filter(|c| c.is_text_free()).collect();
    let clean = if !text_free.is_empty() {
        tracing::debug!("Using {} text-free backdrops", text_free.len());
        text_free
    } else {
        let localized: Vec<&ImageCandidate> = usable
            .iter()
            .copied()
            .filter(|c| c.has_language(language))
            .collect();
        if !localized.is_empty() {
            tracing::debug!(
                "No text-free backdrops, falling back to {} '{}' backdrops",
                localized.len(),
                language
            );
            localized
        } else {
            usable
        }
    };

    let candidates = if policy.prefer_tv_ratio {
        let tv_ratio: Vec<&ImageCandidate> =
            clean.iter().copied().filter(|c| c.is_tv_ratio()).collect();
        if tv_ratio.is_empty() {
            clean
        } else {
            tv_ratio
        }
    } else {
        clean
    };

    let best = match policy.ranking {
        BackdropRanking::RatingThenWidth => {
            let voted: Vec<&ImageCandidate> = candidates
                .iter()
                .copied()
                .filter(|c| c.votes.unwrap_or(0) > 0)
                .collect();
            first_ranked(&voted, |a, b| {
                rating(b)
                    .total_cmp(&rating(a))
                    .then_with(|| b.width.cmp(&a.width))
            })
            .or_else(|| first_ranked(&candidates, |a, b| b.width.cmp(&a.width)))
        }
        BackdropRanking::WidthThenLikes => first_ranked(&candidates, by_width_then_likes),
    };

    if let Some(best) = best {
        tracing::debug!(
            "Selected backdrop {}x{} ({:.2}:1) rating={:?} votes={:?}",
            best.width,
            best.height,
            best.aspect_ratio(),
            best.rating,
            best.votes
        );
    }
    best
}

/// Pick the title logo from a provider's candidates.
///
/// Only logos in `language` or untagged ones qualify.
pub fn select_logo<'a>(
    candidates: &'a [ImageCandidate],
    policy: LogoPolicy,
    language: &str,
    preferred_id: Option<&str>,
) -> Option<&'a ImageCandidate> {
    let eligible: Vec<&ImageCandidate> = candidates
        .iter()
        .filter(|c| !c.url.is_empty())
        .filter(|c| c.has_language(language) || c.is_text_free())
        .collect();

    tracing::debug!(
        "{} logos total, {} eligible for '{}'",
        candidates.len(),
        eligible.len(),
        language
    );

    if let Some(pinned) = find_pinned(&eligible, preferred_id) {
        return Some(pinned);
    }

    match policy {
        LogoPolicy::CompositeScore => {
            first_ranked(&eligible, |a, b| composite_score(b).total_cmp(&composite_score(a)))
        }
        LogoPolicy::WidthThenLikes => first_ranked(&eligible, by_width_then_likes),
    }
}

fn find_pinned<'a>(
    candidates: &[&'a ImageCandidate],
    preferred_id: Option<&str>,
) -> Option<&'a ImageCandidate> {
    let preferred_id = preferred_id?;
    let found = candidates
        .iter()
        .copied()
        .find(|c| c.id.as_deref() == Some(preferred_id));
    if found.is_none() {
        tracing::warn!(
            "Preferred image {} not found, falling back to automatic selection",
            preferred_id
        );
    }
    found
}

/// Stable sort, so ties keep the provider's original order
fn first_ranked<'a, F>(candidates: &[&'a ImageCandidate], compare: F) -> Option<&'a ImageCandidate>
where
    F: Fn(&ImageCandidate, &ImageCandidate) -> Ordering,
{
    let mut ranked = candidates.to_vec();
    ranked.sort_by(|a, b| compare(a, b));
    ranked.first().copied()
}

fn by_width_then_likes(a: &ImageCandidate, b: &ImageCandidate) -> Ordering {
    b.width
        .cmp(&a.width)
        .then_with(|| b.votes.unwrap_or(0).cmp(&a.votes.unwrap_or(0)))
}

fn rating(c: &ImageCandidate) -> f64 {
    c.rating.unwrap_or(0.0)
}

fn composite_score(c: &ImageCandidate) -> f64 {
    rating(c) * 100.0 + c.votes.unwrap_or(0) as f64
}
