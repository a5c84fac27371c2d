use std::time::Duration;

use tracing::{debug, trace};

use super::floors::FloorMap;
use crate::backend::ShaderId;
use crate::world::{Position, MAX_Z};

/// Restartable stopwatch. A restart may start part-way through, which is how
/// a fade is skipped or mirrored.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FadeTimer {
    restarted_at: Duration,
    pre_elapsed: Duration,
}

impl FadeTimer {
    pub fn restart(&mut self, now: Duration, pre_elapsed: Duration) {
        self.restarted_at = now;
        self.pre_elapsed = pre_elapsed;
    }

    pub fn elapsed(&self, now: Duration) -> Duration {
        now.saturating_sub(self.restarted_at) + self.pre_elapsed
    }
}

/// One fade timer per floor, sharing a duration.
#[derive(Debug, Clone, Default)]
pub struct FloorFades {
    timers: FloorMap<FadeTimer>,
    duration: Duration,
}

impl FloorFades {
    pub fn new(duration: Duration) -> Self {
        Self {
            timers: FloorMap::default(),
            duration,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    /// Completes any fade on floors `from..=to` immediately.
    pub fn finish_range(&mut self, from: u8, to: u8, now: Duration) {
        let duration = self.duration;
        for z in from..=to.min(MAX_Z) {
            self.timers[z].restart(now, duration);
        }
    }

    /// Reverses a fade in progress on `z`, starting from the level it has
    /// reached so the floor does not pop.
    pub fn mirror(&mut self, z: u8, now: Duration) {
        let Some(timer) = self.timers.get_mut(z) else {
            return;
        };
        let shift = self.duration.saturating_sub(timer.elapsed(now));
        timer.restart(now, shift);
    }

    /// Opacity of floor `z`: floors above `first_visible` fade out, the rest
    /// fade in. Always within `[0, 1]`.
    pub fn level(&self, z: u8, first_visible: u8, now: Duration) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let Some(timer) = self.timers.get(z) else {
            return 1.0;
        };
        let progress =
            (timer.elapsed(now).as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0);
        if z < first_visible {
            1.0 - progress
        } else {
            progress
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ShaderPhase {
    Steady,
    FadingOut { next: Option<ShaderId> },
    FadingIn,
}

/// Cross-fades the map between post-processing shaders.
#[derive(Debug, Clone)]
pub struct ShaderFader {
    current: Option<ShaderId>,
    phase: ShaderPhase,
    timer: FadeTimer,
    fade_in: Duration,
    fade_out: Duration,
    anchor: Option<Position>,
}

impl ShaderFader {
    pub fn new(initial: Option<ShaderId>) -> Self {
        Self {
            current: initial,
            phase: ShaderPhase::Steady,
            timer: FadeTimer::default(),
            fade_in: Duration::ZERO,
            fade_out: Duration::ZERO,
            anchor: None,
        }
    }

    pub fn current(&self) -> Option<&ShaderId> {
        self.current.as_ref()
    }

    /// Camera position at the time the shader was requested; walk-offset
    /// uniforms are relative to it.
    pub fn anchor(&self) -> Option<Position> {
        self.anchor
    }

    pub fn is_switching(&self) -> bool {
        matches!(self.phase, ShaderPhase::FadingOut { .. })
    }

    /// Requests `shader`. Returns `false` when it is already the active one.
    pub fn request(
        &mut self,
        shader: Option<ShaderId>,
        fade_in: Duration,
        fade_out: Duration,
        camera: Option<Position>,
        now: Duration,
    ) -> bool {
        if self.current == shader && !self.is_switching() {
            return false;
        }

        if !fade_out.is_zero() && self.current.is_some() {
            debug!(next = ?shader, fade_out_ms = fade_out.as_millis() as u64, "map_shader_fade_out");
            self.phase = ShaderPhase::FadingOut {
                next: shader.clone(),
            };
        } else {
            debug!(shader = ?shader, "map_shader_swap");
            self.phase = Self::entry_phase(shader.is_some(), fade_in);
            self.current = shader.clone();
        }
        self.timer.restart(now, Duration::ZERO);
        self.fade_in = fade_in;
        self.fade_out = fade_out;
        if shader.is_some() {
            self.anchor = camera;
        }
        true
    }

    /// Steps the fade and returns the map opacity for this frame.
    pub fn advance(&mut self, now: Duration) -> f32 {
        let elapsed = self.timer.elapsed(now).as_secs_f32();
        match &mut self.phase {
            ShaderPhase::Steady => 1.0,
            ShaderPhase::FadingOut { next } => {
                let opacity = 1.0 - elapsed / self.fade_out.as_secs_f32();
                if opacity >= 0.0 {
                    return opacity;
                }
                self.current = next.take();
                self.phase = Self::entry_phase(self.current.is_some(), self.fade_in);
                self.timer.restart(now, Duration::ZERO);
                debug!(shader = ?self.current, "map_shader_swap");
                match self.phase {
                    ShaderPhase::FadingIn => 0.0,
                    _ => 1.0,
                }
            }
            ShaderPhase::FadingIn => {
                let opacity = (elapsed / self.fade_in.as_secs_f32()).min(1.0);
                if opacity >= 1.0 {
                    trace!("map_shader_fade_in_finished");
                    self.phase = ShaderPhase::Steady;
                }
                opacity
            }
        }
    }

    fn entry_phase(has_shader: bool, fade_in: Duration) -> ShaderPhase {
        if has_shader && !fade_in.is_zero() {
            ShaderPhase::FadingIn
        } else {
            ShaderPhase::Steady
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn timer_restart_counts_pre_elapsed() {
        let mut timer = FadeTimer::default();
        timer.restart(ms(1_000), ms(200));
        assert_eq!(timer.elapsed(ms(1_000)), ms(200));
        assert_eq!(timer.elapsed(ms(1_100)), ms(300));
        assert_eq!(timer.elapsed(ms(900)), ms(200));
    }

    #[test]
    fn level_is_monotonic_and_exact_at_bounds() {
        let mut fades = FloorFades::new(ms(500));
        fades.finish_range(0, MAX_Z, ms(0));
        fades.mirror(6, ms(0));
        fades.mirror(5, ms(0));

        // Floor 6 fades in (6 >= first), floor 5 fades out (5 < first).
        assert_eq!(fades.level(6, 6, ms(0)), 0.0);
        assert_eq!(fades.level(5, 6, ms(0)), 1.0);
        let mut previous = 0.0;
        for step in 0..=10 {
            let level = fades.level(6, 6, ms(step * 50));
            assert!(level >= previous);
            assert!((0.0..=1.0).contains(&level));
            previous = level;
        }
        assert_eq!(fades.level(6, 6, ms(500)), 1.0);
        assert_eq!(fades.level(5, 6, ms(500)), 0.0);
        assert_eq!(fades.level(6, 6, ms(5_000)), 1.0);
    }

    #[test]
    fn mirror_resumes_from_reached_level() {
        let mut fades = FloorFades::new(ms(500));
        fades.finish_range(0, MAX_Z, ms(0));
        fades.mirror(4, ms(0));
        // Half-way through fading in...
        assert!((fades.level(4, 4, ms(250)) - 0.5).abs() < 1e-6);
        // ...the floor gets hidden again and fades out from 0.5.
        fades.mirror(4, ms(250));
        assert!((fades.level(4, 5, ms(250)) - 0.5).abs() < 1e-6);
        assert!((fades.level(4, 5, ms(350)) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn zero_duration_disables_fading() {
        let mut fades = FloorFades::new(Duration::ZERO);
        fades.mirror(3, ms(10));
        assert_eq!(fades.level(3, 7, ms(10)), 1.0);
        assert_eq!(fades.level(3, 0, ms(10)), 1.0);
    }

    #[test]
    fn shader_without_fade_out_swaps_at_once() {
        let mut fader = ShaderFader::new(None);
        assert!(fader.request(Some(ShaderId::new("map")), ms(0), ms(400), None, ms(0)));
        assert_eq!(fader.current(), Some(&ShaderId::new("map")));
        assert_eq!(fader.advance(ms(0)), 1.0);
        assert!(!fader.request(Some(ShaderId::new("map")), ms(0), ms(0), None, ms(10)));
    }

    #[test]
    fn shader_fades_out_then_in() {
        let anchor = Position::new(100, 100, 7);
        let mut fader = ShaderFader::new(Some(ShaderId::new("default")));
        assert!(fader.request(Some(ShaderId::new("night")), ms(200), ms(400), anchor, ms(0)));
        assert_eq!(fader.anchor(), anchor);

        assert!((fader.advance(ms(100)) - 0.75).abs() < 1e-6);
        assert_eq!(fader.current(), Some(&ShaderId::new("default")));

        assert_eq!(fader.advance(ms(401)), 0.0);
        assert_eq!(fader.current(), Some(&ShaderId::new("night")));

        assert!((fader.advance(ms(501)) - 0.5).abs() < 1e-6);
        assert_eq!(fader.advance(ms(700)), 1.0);
        assert_eq!(fader.advance(ms(900)), 1.0);
    }
}
