use std::time::Duration;

/// Timing policy for a rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub interval: Duration,
    pub crossfade: Duration,
    pub logo_fade_out: Duration,
    /// Pause between the logo disappearing and the backdrop swap
    pub logo_lead: Duration,
    /// Delay between the backdrop swap and the new logo fading in
    pub logo_reveal_delay: Duration,
    pub logo_fade_in: Duration,
    /// Pan/zoom duration as a multiple of `interval`
    pub pan_zoom_factor: f32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(10_000),
            crossfade: Duration::from_millis(2_000),
            logo_fade_out: Duration::from_millis(500),
            logo_lead: Duration::from_millis(2_000),
            logo_reveal_delay: Duration::from_millis(1_000),
            logo_fade_in: Duration::from_millis(2_000),
            pan_zoom_factor: 2.0,
        }
    }
}

impl Timing {
    pub fn pan_zoom_duration(&self) -> Duration {
        self.interval.mul_f32(self.pan_zoom_factor.max(0.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    FadeOutLogo,
    SwapBackdrop,
    RevealLogo,
}

/// A cue and its offset from the start of the transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub at: Duration,
    pub cue: Cue,
}

/// What a transition has to do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transition {
    pub fade_out_logo: bool,
    pub swap_backdrop: bool,
    pub reveal_logo: bool,
}

/// Ordered steps of one item transition.
///
/// A visible logo fades out and the lead time passes before the backdrop
/// swaps; the new logo follows the swap after the reveal delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    steps: Vec<Step>,
}

impl Timeline {
    pub fn for_transition(transition: Transition, timing: &Timing) -> Self {
        let mut steps = Vec::with_capacity(3);

        let swap_at = if transition.fade_out_logo {
            steps.push(Step {
                at: Duration::ZERO,
                cue: Cue::FadeOutLogo,
            });
            timing.logo_fade_out + timing.logo_lead
        } else {
            Duration::ZERO
        };

        if transition.swap_backdrop {
            steps.push(Step {
                at: swap_at,
                cue: Cue::SwapBackdrop,
            });
        }

        if transition.reveal_logo {
            steps.push(Step {
                at: swap_at + timing.logo_reveal_delay,
                cue: Cue::RevealLogo,
            });
        }

        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Offset of the last step
    pub fn duration(&self) -> Duration {
        self.steps.last().map(|s| s.at).unwrap_or_default()
    }
}
