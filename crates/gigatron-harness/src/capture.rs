//! Headless capture: PNG screenshots and WAV audio dumps.

use std::error::Error;
use std::fs;
use std::path::Path;

use gigatron_machine::Gigatron;
use gigatron_vga::{HEIGHT, WIDTH};

/// Save the current framebuffer as a PNG file. The framebuffer is
/// already RGBA8, so this is a direct write, not a conversion.
pub fn save_screenshot(machine: &Gigatron, path: &Path) -> Result<(), Box<dyn Error>> {
    let file = fs::File::create(path)?;
    let w = std::io::BufWriter::new(file);
    let mut encoder = png::Encoder::new(w, WIDTH as u32, HEIGHT as u32);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(machine.vga().framebuffer())?;
    Ok(())
}

/// Save audio samples as a WAV file (mono, 16-bit PCM, at the sampler's
/// configured rate). Input samples are f32 in the range -1.0 to +1.0.
pub fn save_audio(samples: &[f32], sample_rate: u32, path: &Path) -> Result<(), Box<dyn Error>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let scaled = (clamped * f32::from(i16::MAX)) as i16;
        writer.write_sample(scaled)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Drain every sample currently buffered in the machine's audio sampler.
pub fn drain_audio(machine: &Gigatron) -> Vec<f32> {
    let mut samples = Vec::new();
    let mut chunk = [0.0f32; 4096];
    loop {
        let n = machine.audio().read_samples(&mut chunk);
        if n == 0 {
            break;
        }
        samples.extend_from_slice(&chunk[..n]);
    }
    samples
}
