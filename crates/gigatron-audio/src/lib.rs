//! PCM sampling of the Gigatron's 4-bit audio DAC (the OUTX register).

mod ring;

use gigatron_cpu::Cpu;
use ring::RingBuffer;

const ALPHA: f32 = 0.99;

/// Default ring buffer sizing: `bufferSize * numBuffers`.
const DEFAULT_BUFFER_SIZE: usize = 2048;
const DEFAULT_NUM_BUFFERS: usize = 4;

/// Audio sampler configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub ring_capacity: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            ring_capacity: DEFAULT_BUFFER_SIZE * DEFAULT_NUM_BUFFERS,
        }
    }
}

/// Derives PCM samples from `Cpu::outx` at a configurable rate via a
/// phase accumulator, DC-blocks them, and hands them to a lock-free ring
/// buffer for a separate audio-callback thread to drain.
pub struct Audio {
    config: AudioConfig,
    cpu_hz: u64,
    cycle_counter: u64,
    bias: f32,
    volume: f32,
    mute: bool,
    ring: RingBuffer,
}

impl Audio {
    #[must_use]
    pub fn new(config: AudioConfig, cpu: &Cpu) -> Self {
        Self {
            config,
            cpu_hz: cpu.hz(),
            cycle_counter: 0,
            bias: 0.0,
            volume: 1.0,
            mute: false,
            ring: RingBuffer::with_capacity(config.ring_capacity),
        }
    }

    /// Clears the ring buffer and DC-blocker state. Volume and mute are
    /// user settings, not sampler state, and survive a reset.
    pub fn reset(&mut self) {
        self.cycle_counter = 0;
        self.bias = 0.0;
        self.ring.clear();
    }

    /// Advance the phase accumulator by one CPU tick, emitting zero or
    /// more samples depending on how many sample periods elapsed.
    pub fn tick(&mut self, cpu: &Cpu) {
        self.cycle_counter += u64::from(self.config.sample_rate);
        while self.cycle_counter >= self.cpu_hz {
            self.cycle_counter -= self.cpu_hz;

            let raw = f32::from(cpu.outx() >> 4) / 8.0;
            self.bias = ALPHA * self.bias + (1.0 - ALPHA) * raw;
            let mut sample = raw - self.bias;
            sample *= self.volume;
            sample = sample.clamp(-1.0, 1.0);
            if self.mute {
                sample = 0.0;
            }
            self.ring.push(sample);
        }
    }

    /// Dequeue up to `out.len()` samples; returns the count read.
    pub fn read_samples(&self, out: &mut [f32]) -> usize {
        self.ring.pop_into(out)
    }

    #[must_use]
    pub fn available_samples(&self) -> usize {
        self.ring.available()
    }

    #[must_use]
    pub fn ring_capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn set_mute(&mut self, mute: bool) {
        self.mute = mute;
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gigatron_cpu::{Cpu, CpuConfig};

    fn cpu_with_outx(value: u8) -> Cpu {
        let mut cpu = Cpu::new(CpuConfig::default());
        // LD D,OUT with D chosen so bit 6 is set post-write (rising edge
        // latches AC into OUTX), then a second identical instruction with
        // AC set to `value` so the latch captures it.
        cpu.set_input(0);
        let word_set_ac = Cpu::encode(0, 0, 0, value); // LD #value -> AC
        let word_latch = Cpu::encode(0, 6, 0, 0x40); // LD D=0x40,OUT -> OUT rises bit6
        cpu.load_rom_bytes(&[
            (word_set_ac >> 8) as u8,
            (word_set_ac & 0xFF) as u8,
            (word_latch >> 8) as u8,
            (word_latch & 0xFF) as u8,
        ]);
        cpu.tick();
        cpu.tick();
        assert_eq!(cpu.outx(), value);
        cpu
    }

    #[test]
    fn dc_blocker_converges_to_zero_under_constant_input() {
        let cpu = cpu_with_outx(0xF0);
        let mut audio = Audio::new(AudioConfig::default(), &cpu);
        let mut last = 0.0f32;
        for _ in 0..200_000 {
            audio.tick(&cpu);
        }
        let mut buf = [0.0f32; 4096];
        loop {
            let n = audio.read_samples(&mut buf);
            if n == 0 {
                break;
            }
            last = buf[n - 1];
        }
        assert!(last.abs() < 0.01, "DC-blocked sample should settle near 0, got {last}");
    }

    #[test]
    fn mute_forces_silence() {
        let cpu = cpu_with_outx(0xF0);
        let mut audio = Audio::new(AudioConfig::default(), &cpu);
        audio.set_mute(true);
        for _ in 0..1000 {
            audio.tick(&cpu);
        }
        let mut buf = [1.0f32; 16];
        let n = audio.read_samples(&mut buf);
        assert!(n > 0);
        assert!(buf[..n].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn available_samples_never_exceeds_capacity_minus_one() {
        let cpu = cpu_with_outx(0x80);
        let mut audio = Audio::new(
            AudioConfig {
                sample_rate: 44_100,
                ring_capacity: 8,
            },
            &cpu,
        );
        for _ in 0..500_000 {
            audio.tick(&cpu);
            assert!(audio.available_samples() <= 7);
        }
    }
}
