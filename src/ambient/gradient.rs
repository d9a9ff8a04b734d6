use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::engine::renderer::Renderer;

pub const OPAQUE_BLACK: u32 = 0xFF00_0000;

const START_ALPHA: u32 = 0xCC00_0000;
const CENTER_ALPHA: u32 = 0x1A00_0000;

/// Per-channel linear interpolation of two ARGB colors
pub fn lerp_argb(from: u32, to: u32, t: f32) -> u32 {
    let t = t.clamp(0.0, 1.0);
    (0..4).fold(0u32, |acc, i| {
        let shift = 24 - i * 8;
        let a = ((from >> shift) & 0xFF) as f32;
        let b = ((to >> shift) & 0xFF) as f32;
        let channel = (a + (b - a) * t).round() as u32;
        acc | (channel.min(0xFF) << shift)
    })
}

/// Color stops of one ambient gradient: dense at the edge, fading out
/// towards the middle of the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradientStops {
    pub start: u32,
    pub center: u32,
    pub end: u32,
}

impl GradientStops {
    pub fn from_base(color: u32) -> Self {
        let rgb = color & 0x00FF_FFFF;
        Self {
            start: rgb | START_ALPHA,
            center: rgb | CENTER_ALPHA,
            end: 0,
        }
    }

    /// The opaque base color the stops were built from
    pub fn base(&self) -> u32 {
        (self.start & 0x00FF_FFFF) | OPAQUE_BLACK
    }
}

/// Animates the ambient gradients from their current colors to new ones.
///
/// Only one animation runs at a time: starting a new one cancels the
/// previous animation and continues from wherever it had got to.
pub struct GradientAnimator {
    renderer: Arc<dyn Renderer>,
    duration: Duration,
    frame_interval: Duration,
    current: Arc<Mutex<Vec<u32>>>,
    running: Option<(CancellationToken, JoinHandle<()>)>,
}

impl GradientAnimator {
    pub fn new(renderer: Arc<dyn Renderer>, duration: Duration, frame_interval: Duration) -> Self {
        Self {
            renderer,
            duration,
            frame_interval: frame_interval.max(Duration::from_millis(1)),
            current: Arc::new(Mutex::new(Vec::new())),
            running: None,
        }
    }

    /// Colors as of the last rendered frame
    pub fn current(&self) -> Vec<u32> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn animate_to(&mut self, target: Vec<u32>) {
        self.cancel();

        let mut from = self.current();
        from.resize(target.len(), OPAQUE_BLACK);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(animate(
            self.renderer.clone(),
            self.current.clone(),
            from,
            target,
            self.duration,
            self.frame_interval,
            cancel.clone(),
        ));
        self.running = Some((cancel, handle));
    }

    /// Stop the running animation, leaving the last frame in place
    pub fn cancel(&mut self) {
        if let Some((cancel, handle)) = self.running.take() {
            cancel.cancel();
            handle.abort();
        }
    }
}

impl Drop for GradientAnimator {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn animate(
    renderer: Arc<dyn Renderer>,
    current: Arc<Mutex<Vec<u32>>>,
    from: Vec<u32>,
    to: Vec<u32>,
    duration: Duration,
    frame_interval: Duration,
    cancel: CancellationToken,
) {
    let started = Instant::now();

    loop {
        let progress = if duration.is_zero() {
            1.0
        } else {
            (started.elapsed().as_secs_f32() / duration.as_secs_f32()).min(1.0)
        };

        let colors: Vec<u32> = from
            .iter()
            .zip(&to)
            .map(|(a, b)| lerp_argb(*a, *b, progress))
            .collect();
        let stops: Vec<GradientStops> = colors.iter().copied().map(GradientStops::from_base).collect();

        *current.lock().unwrap_or_else(PoisonError::into_inner) = colors;
        renderer.update_gradient(&stops).await;

        if progress >= 1.0 {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(frame_interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::renderer::recording::RecordingRenderer;

    #[test]
    fn test_lerp_argb() {
        assert_eq!(lerp_argb(0xFF000000, 0xFFFFFFFF, 0.0), 0xFF000000);
        assert_eq!(lerp_argb(0xFF000000, 0xFFFFFFFF, 1.0), 0xFFFFFFFF);
        assert_eq!(lerp_argb(0xFF000000, 0xFF804020, 0.5), 0xFF402010);
        assert_eq!(lerp_argb(0x00000000, 0xFF000000, 0.5), 0x80000000);
        assert_eq!(lerp_argb(0xFF102030, 0xFF000000, 2.0), 0xFF000000);
    }

    #[test]
    fn test_stops_from_base() {
        let stops = GradientStops::from_base(0xFF336699);
        assert_eq!(stops.start, 0xCC336699);
        assert_eq!(stops.center, 0x1A336699);
        assert_eq!(stops.end, 0);
        assert_eq!(stops.base(), 0xFF336699);
    }

    #[tokio::test(start_paused = true)]
    async fn test_animation_reaches_target() {
        let renderer = Arc::new(RecordingRenderer::new());
        let mut animator = GradientAnimator::new(
            renderer.clone(),
            Duration::from_millis(2000),
            Duration::from_millis(100),
        );

        animator.animate_to(vec![0xFF804020, 0xFF204080]);
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(animator.current(), vec![0xFF804020, 0xFF204080]);

        let frames = renderer.gradients();
        assert_eq!(frames.first(), Some(&vec![OPAQUE_BLACK, OPAQUE_BLACK]));
        assert_eq!(frames.last(), Some(&vec![0xFF804020, 0xFF204080]));
        assert!(frames.len() > 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_continues_from_current_color() {
        let renderer = Arc::new(RecordingRenderer::new());
        let mut animator = GradientAnimator::new(
            renderer.clone(),
            Duration::from_millis(2000),
            Duration::from_millis(100),
        );

        animator.animate_to(vec![0xFFFF0000]);
        tokio::time::sleep(Duration::from_millis(1050)).await;

        let midway = animator.current()[0];
        let red = (midway >> 16) & 0xFF;
        assert!((100..=160).contains(&red), "red channel {:#x}", red);

        renderer.clear();
        animator.animate_to(vec![0xFF0000FF]);
        tokio::time::sleep(Duration::from_millis(2500)).await;

        let frames = renderer.gradients();
        // The first frame of the new animation starts where the old one stopped
        assert_eq!(frames.first(), Some(&vec![midway]));
        assert_eq!(frames.last(), Some(&vec![0xFF0000FF]));
        // No frame from the cancelled animation heads back towards pure red
        assert!(frames.iter().all(|f| (f[0] >> 16) & 0xFF <= red));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_freezes_colors() {
        let renderer = Arc::new(RecordingRenderer::new());
        let mut animator = GradientAnimator::new(
            renderer.clone(),
            Duration::from_millis(2000),
            Duration::from_millis(100),
        );

        animator.animate_to(vec![0xFFFFFFFF]);
        tokio::time::sleep(Duration::from_millis(500)).await;
        animator.cancel();
        let frozen = animator.current();
        let frames = renderer.gradients().len();

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(animator.current(), frozen);
        assert_eq!(renderer.gradients().len(), frames);
        assert_ne!(frozen[0], 0xFFFFFFFF);
    }
}
