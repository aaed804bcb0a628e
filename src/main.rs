extern crate sdl2;

use sdl2::event::Event;
use sdl2::keyboard::{Keycode, Scancode};
use sdl2::pixels::{Color, PixelFormatEnum};
use std::env;
use std::error::Error;
use std::time::{Duration, Instant};
use log::{info, warn};

use daisynes::emulator::famicom::bus::Bus;
use daisynes::emulator::famicom::joypad::Joypad;
use daisynes::emulator::famicom::ppu::{HEIGHT, WIDTH};
use daisynes::emulator::rom::cartridge::Cartridge;

const KEY_MAP: [(Scancode, u8); 14] = [
    (Scancode::X, Joypad::BUTTON_A),
    (Scancode::Z, Joypad::BUTTON_B),
    (Scancode::LShift, Joypad::BUTTON_SELECT),
    (Scancode::RShift, Joypad::BUTTON_SELECT),
    (Scancode::Return, Joypad::BUTTON_START),
    (Scancode::Space, Joypad::BUTTON_START),
    (Scancode::Up, Joypad::BUTTON_UP),
    (Scancode::W, Joypad::BUTTON_UP),
    (Scancode::Down, Joypad::BUTTON_DOWN),
    (Scancode::S, Joypad::BUTTON_DOWN),
    (Scancode::Left, Joypad::BUTTON_LEFT),
    (Scancode::A, Joypad::BUTTON_LEFT),
    (Scancode::Right, Joypad::BUTTON_RIGHT),
    (Scancode::D, Joypad::BUTTON_RIGHT),
];

pub fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let rom_path = args.next().ok_or("usage: daisynes <rom.nes> [scale]")?;
    let scale: u32 = match args.next() {
        Some(s) => s.parse()?,
        None => 2,
    };

    let cartridge = Cartridge::from_file(&rom_path)?;
    let mut bus = Bus::new(cartridge);
    bus.reset();
    info!("Booting {} at ${:04X}", rom_path, bus.cpu().pc);

    let sdl_context = sdl2::init()?;
    let video_subsystem = sdl_context.video()?;

    let window = video_subsystem.window("Daisy NES", WIDTH as u32 * scale, HEIGHT as u32 * scale)
        .position_centered()
        .build()?;

    let mut canvas = window.into_canvas().build()?;
    canvas.set_draw_color(Color::RGB(0, 0, 0));
    canvas.clear();
    canvas.present();

    let texture_creator = canvas.texture_creator();
    // ABGR8888 is R, G, B, A in memory on little endian hosts
    let mut texture = texture_creator.create_texture_streaming(PixelFormatEnum::ABGR8888, WIDTH as u32, HEIGHT as u32)?;

    let mut event_pump = sdl_context.event_pump()?;
    let duration_per_frame = Duration::new(0, 1_000_000_000 / 60);

    'running: loop {
        let frame_start_instant = Instant::now();
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. } |
                Event::KeyDown { keycode: Some(Keycode::Escape), .. } => {
                    break 'running;
                }
                Event::KeyDown { keycode: Some(Keycode::R), .. } => {
                    bus.reset();
                }
                _ => {}
            }
        }

        let keyboard = event_pump.keyboard_state();
        let buttons = KEY_MAP.iter()
            .filter(|(scancode, _)| keyboard.is_scancode_pressed(*scancode))
            .fold(0u8, |acc, (_, button)| acc | button);
        bus.joypads_mut()[0].set(buttons);

        bus.run_frame();

        texture.update(None, bus.ppu().display(), WIDTH * 4)?;
        canvas.copy(&texture, None, None)?;
        canvas.present();

        let elapsed = frame_start_instant.elapsed();
        if elapsed < duration_per_frame {
            ::std::thread::sleep(duration_per_frame - elapsed);
        } else {
            warn!("Frame took {}ms, budget is {}ms", elapsed.as_millis(), duration_per_frame.as_millis());
        }
    }
    Ok(())
}
