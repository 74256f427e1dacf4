//! Headless Gigatron driver.
//!
//! Loads a ROM (and optionally a GT1 program), runs a requested number
//! of frames, and can dump a PNG screenshot and a WAV of the audio
//! produced during the run. No window, no gamepad capture, no ROM
//! chooser — this is a test/demonstration driver, not the shell.

mod capture;

use std::path::PathBuf;
use std::process;

use gigatron_loader::parse_gt1;
use gigatron_machine::{Gigatron, GigatronConfig};

struct CliArgs {
    rom_path: Option<PathBuf>,
    gt1_path: Option<PathBuf>,
    frames: u32,
    screenshot_path: Option<PathBuf>,
    audio_path: Option<PathBuf>,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        rom_path: None,
        gt1_path: None,
        frames: 60,
        screenshot_path: None,
        audio_path: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--rom" => {
                i += 1;
                cli.rom_path = args.get(i).map(PathBuf::from);
            }
            "--gt1" => {
                i += 1;
                cli.gt1_path = args.get(i).map(PathBuf::from);
            }
            "--frames" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    cli.frames = s.parse().unwrap_or(60);
                }
            }
            "--screenshot" => {
                i += 1;
                cli.screenshot_path = args.get(i).map(PathBuf::from);
            }
            "--audio" => {
                i += 1;
                cli.audio_path = args.get(i).map(PathBuf::from);
            }
            "--help" | "-h" => {
                eprintln!("Usage: gigatron-harness --rom <file> [OPTIONS]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --rom <file>         ROM image to load (required)");
                eprintln!("  --gt1 <file>         GT1 program to stream in after reset");
                eprintln!("  --frames <n>         Number of frames to run [default: 60]");
                eprintln!("  --screenshot <file>  Save a PNG of the final framebuffer");
                eprintln!("  --audio <file>       Save a WAV of the audio produced during the run");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn main() {
    let cli = parse_args();

    let Some(rom_path) = &cli.rom_path else {
        eprintln!("error: --rom is required (see --help)");
        process::exit(1);
    };

    let mut machine = Gigatron::new(GigatronConfig::default());
    if let Err(e) = machine.load_rom_file(rom_path) {
        eprintln!("ROM load error: {e}");
        process::exit(1);
    }

    if let Some(gt1_path) = &cli.gt1_path {
        let bytes = match std::fs::read(gt1_path) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("GT1 read error: {e}");
                process::exit(1);
            }
        };
        let Some(program) = parse_gt1(&bytes) else {
            eprintln!("GT1 parse error: malformed file");
            process::exit(1);
        };
        machine.start_loader(program);
    }

    for _ in 0..cli.frames {
        machine.run_frame();
    }

    if let Some(path) = &cli.screenshot_path {
        if let Err(e) = capture::save_screenshot(&machine, path) {
            eprintln!("Screenshot error: {e}");
            process::exit(1);
        }
        eprintln!("Screenshot saved to {}", path.display());
    }

    if let Some(path) = &cli.audio_path {
        let samples = capture::drain_audio(&machine);
        if let Err(e) = capture::save_audio(&samples, machine.audio().sample_rate(), path) {
            eprintln!("Audio error: {e}");
            process::exit(1);
        }
        eprintln!("Audio saved to {}", path.display());
    }

    eprintln!("Ran {} frames, {} cycles", cli.frames, machine.cpu().cycles());
}
