//! Synthetic spectrum animation.  Nothing here listens to audio: band
//! levels come from layered sine waves plus a little noise, advanced by
//! wall-clock time while playing and decayed toward zero while paused.
//! The particle, starfield and rain modes move sprites in box-relative
//! coordinates so they survive resizes.

use rand::Rng;
use std::f32::consts::PI;
use std::time::Duration;

pub const BANDS: usize = 32;

const MIN_INTENSITY: f32 = 0.5;
const MAX_INTENSITY: f32 = 2.0;
/// Per-tick multiplier while paused.
const PAUSE_DECAY: f32 = 0.9;
/// Weight kept from the previous level each tick.
const SMOOTHING: f32 = 0.7;
const SILENCE: f32 = 0.01;

const MAX_PARTICLES: usize = 120;
const STARS: usize = 80;
const RAIN_DROPS: usize = 120;
/// Downward pull on particles, in box heights per second squared.
const GRAVITY: f32 = 1.5;
const RAIN_GLYPHS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789$#@%&*";
const PARTICLE_GLYPHS: [char; 7] = ['•', '·', '°', '∗', '∘', '♦', '♥'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VizMode {
    #[default]
    Bars,
    Wave,
    Particles,
    Spectrum,
    Stars,
    Matrix,
    Equalizer,
    Spiral,
}

impl VizMode {
    pub const ALL: [VizMode; 8] = [
        VizMode::Bars,
        VizMode::Wave,
        VizMode::Particles,
        VizMode::Spectrum,
        VizMode::Stars,
        VizMode::Matrix,
        VizMode::Equalizer,
        VizMode::Spiral,
    ];

    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|&m| m == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    pub fn name(self) -> &'static str {
        match self {
            VizMode::Bars => "BARS",
            VizMode::Wave => "WAVE",
            VizMode::Particles => "PARTICLES",
            VizMode::Spectrum => "SPECTRUM",
            VizMode::Stars => "STARS",
            VizMode::Matrix => "MATRIX",
            VizMode::Equalizer => "EQUALIZER",
            VizMode::Spiral => "SPIRAL",
        }
    }
}

/// A moving glyph in box-relative coordinates: `x` and `y` run over
/// `0.0..=1.0`, velocities are box sizes per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sprite {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    /// Seconds left before the sprite is dropped or respawned.
    pub life: f32,
    /// Brightness in `0.0..=1.0`.
    pub level: f32,
    pub glyph: char,
}

pub struct Visualizer {
    enabled: bool,
    mode: VizMode,
    intensity: f32,
    bands: [f32; BANDS],
    clock: f32,
    particles: Vec<Sprite>,
    stars: Vec<Sprite>,
    rain: Vec<Sprite>,
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Visualizer {
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let stars = (0..STARS)
            .map(|_| {
                let mut star = spawn_star(&mut rng);
                star.y = rng.gen();
                star
            })
            .collect();
        let rain = (0..RAIN_DROPS)
            .map(|_| {
                let mut drop = spawn_drop(&mut rng);
                drop.y = rng.gen();
                drop
            })
            .collect();
        Self {
            enabled: true,
            mode: VizMode::default(),
            intensity: 1.0,
            bands: [0.0; BANDS],
            clock: 0.0,
            particles: Vec::with_capacity(MAX_PARTICLES),
            stars,
            rain,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn mode(&self) -> VizMode {
        self.mode
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    /// Animation clock, for modes that rotate or scroll.
    pub fn phase(&self) -> f32 {
        self.clock
    }

    pub fn particles(&self) -> &[Sprite] {
        &self.particles
    }

    pub fn stars(&self) -> &[Sprite] {
        &self.stars
    }

    pub fn rain(&self) -> &[Sprite] {
        &self.rain
    }

    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        if !self.enabled {
            self.bands = [0.0; BANDS];
            self.particles.clear();
        }
        self.enabled
    }

    pub fn cycle_mode(&mut self) -> VizMode {
        self.mode = self.mode.next();
        self.mode
    }

    pub fn adjust_intensity(&mut self, delta: f32) -> f32 {
        self.intensity = (self.intensity + delta).clamp(MIN_INTENSITY, MAX_INTENSITY);
        self.intensity
    }

    /// All bands have decayed to nothing and no particle is still in flight.
    pub fn is_silent(&self) -> bool {
        self.bands.iter().all(|&b| b < SILENCE) && self.particles.is_empty()
    }

    /// Whether the next frame would differ from this one.
    pub fn is_animating(&self, paused: bool) -> bool {
        self.enabled && !(paused && self.is_silent())
    }

    /// Advance by `dt`.  While paused the bands decay, particles burn out
    /// without new ones, and stars and rain hold still.
    pub fn tick(&mut self, dt: Duration, paused: bool) {
        if !self.enabled {
            return;
        }
        let secs = dt.as_secs_f32();
        let mut rng = rand::thread_rng();
        if paused {
            for band in &mut self.bands {
                *band *= PAUSE_DECAY;
                if *band < SILENCE {
                    *band = 0.0;
                }
            }
            self.move_particles(secs * 0.1);
            return;
        }

        self.clock += secs * 2.0;
        self.advance_bands(&mut rng);
        match self.mode {
            VizMode::Particles => {
                self.spawn_particles(&mut rng);
                self.move_particles(secs);
            }
            VizMode::Stars => {
                for star in &mut self.stars {
                    star.y += star.vy * secs;
                    if star.y > 1.0 {
                        *star = spawn_star(&mut rng);
                    }
                }
            }
            VizMode::Matrix => {
                for drop in &mut self.rain {
                    drop.y += drop.vy * secs;
                    drop.life -= secs;
                    if drop.y > 1.0 || drop.life <= 0.0 {
                        *drop = spawn_drop(&mut rng);
                    }
                }
            }
            _ => self.move_particles(secs),
        }
    }

    fn advance_bands(&mut self, rng: &mut impl Rng) {
        let t = self.clock;
        let bass = layered(t, [(0.3, 0.4), (0.7, 0.3), (1.2, 0.2)]) + rng.gen::<f32>() * 0.10;
        let mid = layered(t, [(2.0, 0.3), (3.5, 0.25), (5.2, 0.15)]) + rng.gen::<f32>() * 0.08;
        let treble = layered(t, [(8.0, 0.25), (12.5, 0.2), (18.3, 0.15)]) + rng.gen::<f32>() * 0.06;
        let (bass, mid, treble) = (bass.min(1.0), mid.min(1.0), treble.min(1.0));

        for (i, band) in self.bands.iter_mut().enumerate() {
            let pos = i as f32 / BANDS as f32;
            let target = if pos < 0.1 {
                bass * (1.0 - pos / 0.1) * 1.2 + bass * 0.3
            } else if pos < 0.3 {
                mid * (1.0 - ((pos - 0.2) / 0.1).abs()) * 1.1
            } else if pos < 0.6 {
                mid * (1.0 - ((pos - 0.45) / 0.15).abs()) * 0.9
            } else {
                treble * (1.0 - (pos - 0.6) / 0.4) * 0.8
            };
            let jitter = (rng.gen::<f32>() - 0.5) * 0.05;
            let target = ((target + jitter) * self.intensity).clamp(0.0, 1.0);
            *band = *band * SMOOTHING + target * (1.0 - SMOOTHING);
        }
    }

    /// Launch particles from the bottom edge above loud bands.
    fn spawn_particles(&mut self, rng: &mut impl Rng) {
        if self.particles.len() >= MAX_PARTICLES || !rng.gen_bool(0.5) {
            return;
        }
        let x: f32 = rng.gen();
        let level = self.sample(x);
        if level <= 0.2 {
            return;
        }
        self.particles.push(Sprite {
            x,
            y: 1.0,
            vx: (rng.gen::<f32>() - 0.5) * 0.4,
            vy: -(0.6 + rng.gen::<f32>() * level),
            life: 1.0 + rng.gen::<f32>() * 2.0,
            level,
            glyph: PARTICLE_GLYPHS[rng.gen_range(0..PARTICLE_GLYPHS.len())],
        });
    }

    fn move_particles(&mut self, secs: f32) {
        self.particles.retain_mut(|p| {
            p.x += p.vx * secs;
            p.y += p.vy * secs;
            p.vy += GRAVITY * secs;
            p.life -= secs;
            p.life > 0.0 && (0.0..=1.0).contains(&p.x) && p.y <= 1.0
        });
    }

    /// Band level at a fractional position in `0.0..=1.0`, linearly
    /// interpolated, for drawing at arbitrary widths.
    pub fn sample(&self, pos: f32) -> f32 {
        let x = pos.clamp(0.0, 1.0) * (BANDS - 1) as f32;
        let lo = x.floor() as usize;
        let hi = (lo + 1).min(BANDS - 1);
        let frac = x - lo as f32;
        self.bands[lo] * (1.0 - frac) + self.bands[hi] * frac
    }

    /// Small travelling ripple added on top of the bands in wave mode.
    pub fn ripple(&self, pos: f32) -> f32 {
        (self.clock * 4.0 + pos * 2.0 * PI * 3.0).sin() * 0.05
    }

    #[cfg(test)]
    pub fn set_levels(&mut self, level: f32) {
        self.bands = [level; BANDS];
    }
}

fn spawn_star(rng: &mut impl Rng) -> Sprite {
    let level = rng.gen::<f32>();
    Sprite {
        x: rng.gen(),
        y: 0.0,
        vx: 0.0,
        vy: 0.2 + rng.gen::<f32>() * 1.0,
        life: f32::INFINITY,
        level,
        glyph: if level > 0.7 {
            '★'
        } else if level > 0.4 {
            '✦'
        } else {
            '•'
        },
    }
}

fn spawn_drop(rng: &mut impl Rng) -> Sprite {
    Sprite {
        x: rng.gen(),
        y: 0.0,
        vx: 0.0,
        vy: 0.5 + rng.gen::<f32>() * 1.5,
        life: 0.5 + rng.gen::<f32>() * 2.5,
        level: rng.gen(),
        glyph: RAIN_GLYPHS[rng.gen_range(0..RAIN_GLYPHS.len())] as char,
    }
}

fn layered(t: f32, waves: [(f32, f32); 3]) -> f32 {
    waves
        .iter()
        .map(|&(freq, amp)| (t * freq).sin() * amp)
        .sum::<f32>()
        .abs()
}
