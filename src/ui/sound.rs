/// Sound engine: procedural sound effects via rodio, driven by game events.
///
/// Every effect is synthesized once at startup into a WAV buffer, then
/// played through a detached rodio `Sink` so a tick never waits on audio.
///
/// Compile without the "sound" feature to disable audio entirely
/// (the stub SoundEngine does nothing).

use crate::sim::event::GameEvent;

/// One sound effect per kind of audible event.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Sfx {
    Shot,
    Hit,
    Deflect,
    Kill,
    Hurt,
    Reload,
    Mode,
    Wave,
    Victory,
    GameOver,
}

impl Sfx {
    #[cfg_attr(not(feature = "sound"), allow(dead_code))]
    const ALL: [Sfx; 10] = [
        Sfx::Shot, Sfx::Hit, Sfx::Deflect, Sfx::Kill, Sfx::Hurt,
        Sfx::Reload, Sfx::Mode, Sfx::Wave, Sfx::Victory, Sfx::GameOver,
    ];
}

/// Which effect (if any) an event makes.
pub fn sfx_for(event: &GameEvent) -> Option<Sfx> {
    match event {
        GameEvent::BulletFired { .. } => Some(Sfx::Shot),
        GameEvent::EnemyHit { .. } => Some(Sfx::Hit),
        GameEvent::BulletDeflected { .. } => Some(Sfx::Deflect),
        GameEvent::EnemyKilled { .. } => Some(Sfx::Kill),
        GameEvent::PlayerHurt { .. } => Some(Sfx::Hurt),
        GameEvent::Reloaded => Some(Sfx::Reload),
        GameEvent::ModeChanged(_) => Some(Sfx::Mode),
        GameEvent::WaveStarted { .. } | GameEvent::ObjectiveComplete { .. } => Some(Sfx::Wave),
        GameEvent::Victory => Some(Sfx::Victory),
        GameEvent::PlayerKilled | GameEvent::ObjectiveFailed => Some(Sfx::GameOver),
        GameEvent::BulletBlocked
        | GameEvent::ActorsRemoved(_)
        | GameEvent::EnemyAttacked { .. }
        | GameEvent::Status(_) => None,
    }
}

#[cfg(feature = "sound")]
mod inner {
    use std::f32::consts::TAU;
    use std::io::Cursor;
    use std::sync::Arc;

    use rodio::{OutputStream, OutputStreamHandle, Sink};

    use super::Sfx;

    const SAMPLE_RATE: u32 = 22050;

    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        /// Indexed by `Sfx as usize`.
        buffers: Vec<Arc<Vec<u8>>>,
    }

    impl SoundEngine {
        pub fn new() -> Option<Self> {
            let (stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    log::warn!("no audio output, sound disabled: {e}");
                    return None;
                }
            };
            let buffers = Sfx::ALL.iter()
                .map(|&s| Arc::new(make_wav(&generate(s))))
                .collect();
            Some(SoundEngine { _stream: stream, handle, buffers })
        }

        pub fn play(&self, sfx: Sfx) {
            let Some(buf) = self.buffers.get(sfx as usize) else { return };
            if let Ok(sink) = Sink::try_new(&self.handle) {
                let cursor = Cursor::new(buf.as_ref().clone());
                if let Ok(src) = rodio::Decoder::new(cursor) {
                    sink.append(src);
                    sink.detach();
                }
            }
        }
    }

    // ════════════════════════════════════════════════════════════
    //  Waveform generators, all mono f32 samples
    // ════════════════════════════════════════════════════════════

    fn generate(sfx: Sfx) -> Vec<f32> {
        match sfx {
            Sfx::Shot => gen_sweep(1400.0, 500.0, 0.07, 0.25),
            Sfx::Hit => gen_noise_tone(320.0, 0.09, 0.3),
            Sfx::Deflect => gen_notes(&[(2093.0, 0.03), (1568.0, 0.04)], 0.15),
            Sfx::Kill => gen_notes(&[(523.0, 0.05), (784.0, 0.05), (1047.0, 0.08)], 0.25),
            Sfx::Hurt => gen_sweep(300.0, 120.0, 0.18, 0.3),
            Sfx::Reload => gen_notes(&[(660.0, 0.03), (0.0, 0.04), (880.0, 0.03)], 0.2),
            Sfx::Mode => gen_notes(&[(988.0, 0.035)], 0.2),
            Sfx::Wave => gen_notes(&[(392.0, 0.08), (523.0, 0.08), (659.0, 0.12)], 0.25),
            Sfx::Victory => gen_notes(
                &[(523.0, 0.1), (659.0, 0.1), (784.0, 0.1), (1047.0, 0.3)],
                0.3,
            ),
            Sfx::GameOver => gen_notes(
                &[(440.0, 0.12), (370.0, 0.12), (311.0, 0.12), (261.0, 0.3)],
                0.3,
            ),
        }
    }

    fn tone(t: f32, freq: f32) -> f32 {
        let w = TAU * freq * t;
        w.sin() * 0.7 + (2.0 * w).sin() * 0.3
    }

    fn sample_count(secs: f32) -> usize {
        (SAMPLE_RATE as f32 * secs) as usize
    }

    /// Note sequence; a frequency of 0 is a rest.
    fn gen_notes(notes: &[(f32, f32)], volume: f32) -> Vec<f32> {
        notes.iter()
            .flat_map(|&(freq, secs)| {
                let n = sample_count(secs);
                (0..n).map(move |i| {
                    let decay = 1.0 - (i as f32 / n as f32).sqrt();
                    tone(i as f32 / SAMPLE_RATE as f32, freq) * decay * volume
                })
            })
            .collect()
    }

    /// Linear pitch sweep with a fading envelope.
    fn gen_sweep(from: f32, to: f32, secs: f32, volume: f32) -> Vec<f32> {
        let n = sample_count(secs);
        let mut phase = 0.0_f32;
        (0..n)
            .map(|i| {
                let k = i as f32 / n as f32;
                phase += (from + (to - from) * k) / SAMPLE_RATE as f32;
                (TAU * phase).sin() * (1.0 - k).powf(0.7) * volume
            })
            .collect()
    }

    /// Short noise burst over a low tone. The noise is a fixed LCG so every
    /// run sounds the same.
    fn gen_noise_tone(freq: f32, secs: f32, volume: f32) -> Vec<f32> {
        let n = sample_count(secs);
        let mut lcg: u32 = 0x3039;
        (0..n)
            .map(|i| {
                lcg = lcg.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                let noise = lcg as f32 / u32::MAX as f32 * 2.0 - 1.0;
                let body = (TAU * freq * i as f32 / SAMPLE_RATE as f32).sin();
                (body + noise) * 0.5 * (1.0 - i as f32 / n as f32) * volume
            })
            .collect()
    }

    // ════════════════════════════════════════════════════════════
    //  WAV container
    // ════════════════════════════════════════════════════════════

    /// 16-bit mono PCM in a RIFF container, ready for `rodio::Decoder`.
    fn make_wav(samples: &[f32]) -> Vec<u8> {
        const CHANNELS: u16 = 1;
        const BITS: u16 = 16;
        let block = CHANNELS * BITS / 8;
        let data_len = samples.len() as u32 * block as u32;

        let mut wav = Vec::with_capacity(44 + data_len as usize);
        wav.extend(*b"RIFF");
        wav.extend((36 + data_len).to_le_bytes());
        wav.extend(*b"WAVE");
        wav.extend(*b"fmt ");
        wav.extend(16u32.to_le_bytes());
        wav.extend(1u16.to_le_bytes()); // PCM
        wav.extend(CHANNELS.to_le_bytes());
        wav.extend(SAMPLE_RATE.to_le_bytes());
        wav.extend((SAMPLE_RATE * block as u32).to_le_bytes());
        wav.extend(block.to_le_bytes());
        wav.extend(BITS.to_le_bytes());
        wav.extend(*b"data");
        wav.extend(data_len.to_le_bytes());
        wav.extend(samples.iter().flat_map(|s| ((s.clamp(-1.0, 1.0) * 32767.0) as i16).to_le_bytes()));
        wav
    }

}

// ════════════════════════════════════════════════════════════
//  Public API: compiles to no-ops when the sound feature is off
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> { Some(SoundEngine) }
    pub fn play(&self, _sfx: Sfx) {}
}

impl SoundEngine {
    /// Play the effect for each audible event, at most once per effect.
    pub fn play_events(&self, events: &[GameEvent]) {
        let mut played: Vec<Sfx> = Vec::new();
        for sfx in events.iter().filter_map(sfx_for) {
            if played.contains(&sfx) { continue; }
            played.push(sfx);
            self.play(sfx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::AmmoKind;

    #[test]
    fn events_map_to_effects() {
        assert_eq!(sfx_for(&GameEvent::BulletFired { mode: AmmoKind::Gold }), Some(Sfx::Shot));
        assert_eq!(sfx_for(&GameEvent::Victory), Some(Sfx::Victory));
        assert_eq!(sfx_for(&GameEvent::BulletBlocked), None);
        assert_eq!(sfx_for(&GameEvent::ActorsRemoved(vec![3])), None);
    }
}
