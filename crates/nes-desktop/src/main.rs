//! NES Desktop - Desktop NES emulator with minifb rendering
//!
//! The emulator runs on its own thread at roughly 60 frames per second and
//! publishes each finished frame into a [`SharedFrame`]. The window loop only
//! copies the latest frame out and blits it, so a slow frame on either side
//! never tears the picture.

use clap::Parser;
use minifb::{Key, Window, WindowOptions};
use nes_core::{Emulator, Framebuffer, SharedFrame, SCREEN_HEIGHT, SCREEN_WIDTH};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// NTSC frame period
const FRAME_TIME: Duration = Duration::from_nanos(16_639_267);

/// NES Emulator Desktop App
#[derive(Parser, Debug)]
#[command(name = "nes-desktop")]
#[command(about = "A NES emulator desktop app", long_about = None)]
struct Args {
    /// Path to the iNES ROM file
    #[arg(short, long)]
    rom: PathBuf,

    /// Screen scale factor (1-4)
    #[arg(short, long, default_value = "2", value_parser = clap::value_parser!(u8).range(1..=4))]
    scale: u8,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    // Load ROM file
    let rom_data = match fs::read(&args.rom) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Failed to read ROM file {}: {}", args.rom.display(), e);
            std::process::exit(1);
        }
    };

    let emulator = match Emulator::load(&rom_data) {
        Ok(emulator) => emulator,
        Err(e) => {
            eprintln!("Failed to load ROM: {}", e);
            std::process::exit(1);
        }
    };

    let scale = usize::from(args.scale);
    let window_width = SCREEN_WIDTH * scale;
    let window_height = SCREEN_HEIGHT * scale;

    let mut window = match Window::new(
        "NES Emulator",
        window_width,
        window_height,
        WindowOptions {
            resize: false,
            ..WindowOptions::default()
        },
    ) {
        Ok(window) => window,
        Err(e) => {
            eprintln!("Failed to create window: {}", e);
            std::process::exit(1);
        }
    };
    window.set_target_fps(60);

    let shared = SharedFrame::new();
    let running = Arc::new(AtomicBool::new(true));
    let worker = spawn_emulation(emulator, shared.clone(), Arc::clone(&running));

    let mut buffer = vec![0u32; window_width * window_height];

    log::info!("Starting NES emulation, press ESC or close the window to exit");

    while window.is_open() && !window.is_key_down(Key::Escape) {
        upscale(&shared.snapshot(), scale, &mut buffer);
        if let Err(e) = window.update_with_buffer(&buffer, window_width, window_height) {
            log::error!("Failed to update window: {}", e);
            break;
        }
    }

    running.store(false, Ordering::Relaxed);
    if worker.join().is_err() {
        log::error!("Emulation thread panicked");
    }

    log::info!("Emulator closed");
}

/// Run frames until `running` is cleared or the emulator halts
fn spawn_emulation(
    mut emulator: Emulator,
    shared: SharedFrame,
    running: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut next_frame = Instant::now();
        while running.load(Ordering::Relaxed) {
            if let Err(e) = emulator.run_frame() {
                log::error!("Emulation stopped: {}", e);
                break;
            }
            shared.publish(emulator.frame());

            next_frame += FRAME_TIME;
            let now = Instant::now();
            if next_frame > now {
                thread::sleep(next_frame - now);
            } else {
                // Fell behind; don't try to catch up
                next_frame = now;
            }
        }
        log::debug!("Emulation thread exiting after {} frames", emulator.frame_count());
    })
}

/// Nearest-neighbour scale into a 0x00RRGGBB window buffer
fn upscale(frame: &Framebuffer, scale: usize, out: &mut [u32]) {
    let pixels = frame.to_rgb32();
    let width = SCREEN_WIDTH * scale;
    for (y, row) in out.chunks_exact_mut(width).enumerate() {
        let src = &pixels[(y / scale) * SCREEN_WIDTH..][..SCREEN_WIDTH];
        for (x, pixel) in row.iter_mut().enumerate() {
            *pixel = src[x / scale];
        }
    }
}
