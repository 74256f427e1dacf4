//! Serial-protocol GT1 loader.
//!
//! Impersonates a gamepad: drives the CPU's input register one bit at a
//! time in cadence with HSYNC, resynchronizing the on-target loader with
//! a deliberately bad-checksum sync frame before streaming real payload
//! frames, each bit shifted out MSB-first immediately on the clocking
//! edge rather than held for the next one.

use gigatron_cpu::{Cpu, HSYNC_BIT, VSYNC_BIT};

use crate::gt1::Gt1Program;

const BUTTON_A_UP_TIME: u32 = 60;
const RESET_WAIT_FRAMES: u32 = 100;
const MENU_DONE_FRAME: u32 = 11 + BUTTON_A_UP_TIME; // 71, per the chosen reading of the spec's "≥71" note
const LOADER_START_OF_FRAME: u8 = 0x4C;
const LOADER_INIT_CHECKSUM: u8 = 0x67;
const PAYLOAD_SIZE: usize = 60;

const BTN_A: u8 = 0x80;
const BTN_DOWN: u8 = 0x04;

/// Top-level loader state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Idle,
    ResetWait,
    MenuNav,
    SyncFrame,
    Sending,
    StartCmd,
    Complete,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    WaitVSyncNeg,
    WaitHSync1,
    WaitHSync2,
    SendFirstByte,
    SendLength,
    SendAddrLow,
    SendAddrHigh,
    SendPayload,
    SendChecksum,
    FrameDone,
}

fn menu_button_byte(vsync_count: u32) -> u8 {
    match vsync_count {
        1..=9 if vsync_count % 2 == 1 => BTN_DOWN ^ 0xFF,
        11 => BTN_A ^ 0xFF,
        _ => 0xFF,
    }
}

/// Drives a CPU's input register to stream a [`Gt1Program`] into a
/// running (just-reset) Gigatron.
pub struct Loader {
    program: Option<Gt1Program>,
    state: LoaderState,
    frame_state: FrameState,
    error: &'static str,

    first_byte: u8,
    length: u8,
    addr: u16,
    payload: [u8; PAYLOAD_SIZE],
    current_byte: u8,
    bits_remaining: u8,
    payload_index: usize,

    current_segment: usize,
    segment_offset: usize,

    vsync_count: u32,
    checksum: u8,
    prev_out: u8,
}

impl Loader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: None,
            state: LoaderState::Idle,
            frame_state: FrameState::WaitVSyncNeg,
            error: "",
            first_byte: 0,
            length: 0,
            addr: 0,
            payload: [0; PAYLOAD_SIZE],
            current_byte: 0,
            bits_remaining: 0,
            payload_index: 0,
            current_segment: 0,
            segment_offset: 0,
            vsync_count: 0,
            checksum: 0,
            prev_out: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> LoaderState {
        self.state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self.state, LoaderState::Idle | LoaderState::Complete | LoaderState::Error)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state == LoaderState::Complete
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.state == LoaderState::Error
    }

    #[must_use]
    pub fn error(&self) -> &'static str {
        self.error
    }

    /// Progress through the current program, 0..1. Exact during
    /// `Sending` (fraction of segments dispatched); coarse elsewhere.
    #[must_use]
    pub fn progress(&self) -> f32 {
        match self.state {
            LoaderState::StartCmd | LoaderState::Complete => 1.0,
            LoaderState::Sending => {
                let Some(program) = &self.program else { return 0.0 };
                if program.segments.is_empty() {
                    1.0
                } else {
                    self.current_segment as f32 / program.segments.len() as f32
                }
            }
            _ => 0.0,
        }
    }

    /// Begin loading `program`, resetting the CPU first. Fails
    /// immediately (transitioning to `Error`) if `program` is `None`.
    pub fn start(&mut self, program: Option<Gt1Program>, cpu: &mut Cpu) -> bool {
        let Some(program) = program else {
            self.state = LoaderState::Error;
            self.error = "cannot start with no program";
            return false;
        };
        cpu.reset();
        self.program = Some(program);
        self.state = LoaderState::ResetWait;
        self.vsync_count = 0;
        self.current_segment = 0;
        self.segment_offset = 0;
        self.checksum = 0;
        self.error = "";
        self.prev_out = cpu.out();
        true
    }

    /// Unconditionally return to `Idle` and release the input register.
    pub fn reset(&mut self, cpu: &mut Cpu) {
        self.program = None;
        self.state = LoaderState::Idle;
        self.frame_state = FrameState::WaitVSyncNeg;
        self.error = "";
        cpu.set_input(0xFF);
    }

    pub fn tick(&mut self, cpu: &mut Cpu) {
        let out = cpu.out();
        let vsync_rising = self.prev_out & VSYNC_BIT == 0 && out & VSYNC_BIT != 0;

        match self.state {
            LoaderState::Idle | LoaderState::Error => {}
            LoaderState::ResetWait => {
                if vsync_rising {
                    self.vsync_count += 1;
                    if self.vsync_count >= RESET_WAIT_FRAMES {
                        self.state = LoaderState::MenuNav;
                        self.vsync_count = 0;
                    }
                }
            }
            LoaderState::MenuNav => {
                if vsync_rising {
                    self.vsync_count += 1;
                    if self.vsync_count >= MENU_DONE_FRAME {
                        self.checksum = 0;
                        self.begin_sync_frame();
                        self.prev_out = out;
                        return;
                    }
                }
                cpu.set_input(menu_button_byte(self.vsync_count));
            }
            LoaderState::SyncFrame | LoaderState::Sending | LoaderState::StartCmd => {
                if self.frame_tick(cpu, out) {
                    self.on_frame_done(cpu);
                }
            }
            LoaderState::Complete => {
                cpu.set_input(0xFF);
            }
        }

        self.prev_out = out;
    }

    fn begin_sync_frame(&mut self) {
        self.first_byte = 0xFF;
        self.addr = 0;
        self.length = 0;
        self.payload = [0; PAYLOAD_SIZE];
        self.frame_state = FrameState::WaitVSyncNeg;
        self.state = LoaderState::SyncFrame;
    }

    fn on_frame_done(&mut self, cpu: &mut Cpu) {
        match self.state {
            LoaderState::SyncFrame => {
                self.checksum = LOADER_INIT_CHECKSUM;
                self.begin_next_frame(cpu);
            }
            LoaderState::Sending => {
                self.advance_segment_cursor();
                self.begin_next_frame(cpu);
            }
            LoaderState::StartCmd => {
                self.state = LoaderState::Complete;
                cpu.set_input(0xFF);
            }
            _ => unreachable!("frame_tick only runs in SyncFrame/Sending/StartCmd"),
        }
    }

    fn advance_segment_cursor(&mut self) {
        let Some(program) = &self.program else { return };
        self.segment_offset += usize::from(self.length);
        if self.current_segment < program.segments.len()
            && self.segment_offset >= program.segments[self.current_segment].data.len()
        {
            self.current_segment += 1;
            self.segment_offset = 0;
        }
    }

    fn begin_next_frame(&mut self, cpu: &mut Cpu) {
        let Some(program) = self.program.clone() else {
            self.state = LoaderState::Complete;
            cpu.set_input(0xFF);
            return;
        };

        if self.current_segment < program.segments.len() {
            let seg = &program.segments[self.current_segment];
            let remaining = seg.data.len() - self.segment_offset;
            let len = remaining.min(PAYLOAD_SIZE);
            let mut payload = [0u8; PAYLOAD_SIZE];
            payload[..len].copy_from_slice(&seg.data[self.segment_offset..self.segment_offset + len]);

            self.first_byte = LOADER_START_OF_FRAME;
            self.addr = seg.address.wrapping_add(self.segment_offset as u16);
            self.length = len as u8;
            self.payload = payload;
            self.frame_state = FrameState::WaitVSyncNeg;
            self.state = LoaderState::Sending;
        } else if program.has_start_address {
            self.first_byte = LOADER_START_OF_FRAME;
            self.addr = program.start_address;
            self.length = 0;
            self.payload = [0; PAYLOAD_SIZE];
            self.frame_state = FrameState::WaitVSyncNeg;
            self.state = LoaderState::StartCmd;
        } else {
            self.state = LoaderState::Complete;
            cpu.set_input(0xFF);
        }
    }

    /// Run one tick of the bit-banging frame sub-machine. Returns `true`
    /// the tick `FrameDone` is reached.
    fn frame_tick(&mut self, cpu: &mut Cpu, out: u8) -> bool {
        let vsync_falling = self.prev_out & VSYNC_BIT != 0 && out & VSYNC_BIT == 0;
        let hsync_rising = self.prev_out & HSYNC_BIT == 0 && out & HSYNC_BIT != 0;

        match self.frame_state {
            FrameState::WaitVSyncNeg => {
                if vsync_falling {
                    self.frame_state = FrameState::WaitHSync1;
                }
            }
            FrameState::WaitHSync1 => {
                if hsync_rising {
                    self.frame_state = FrameState::WaitHSync2;
                }
            }
            FrameState::WaitHSync2 => {
                if hsync_rising {
                    self.checksum = self.checksum.wrapping_add(self.first_byte);
                    self.current_byte = self.first_byte;
                    self.bits_remaining = 8;
                    self.frame_state = FrameState::SendFirstByte;
                    self.shift_one_bit(cpu);
                }
            }
            FrameState::SendFirstByte
            | FrameState::SendLength
            | FrameState::SendAddrLow
            | FrameState::SendAddrHigh
            | FrameState::SendPayload
            | FrameState::SendChecksum => {
                if hsync_rising {
                    if self.bits_remaining > 0 {
                        self.shift_one_bit(cpu);
                    } else {
                        self.advance_send_phase(cpu);
                    }
                }
            }
            FrameState::FrameDone => return true,
        }
        false
    }

    fn shift_one_bit(&mut self, cpu: &mut Cpu) {
        let bit = self.current_byte & 0x80 != 0;
        self.current_byte <<= 1;
        self.bits_remaining -= 1;
        let shifted = (cpu.in_reg() << 1) | u8::from(bit);
        cpu.set_input(shifted);
    }

    fn advance_send_phase(&mut self, cpu: &mut Cpu) {
        match self.frame_state {
            FrameState::SendFirstByte => {
                self.checksum = self.checksum.wrapping_add(self.first_byte << 6);
                self.checksum = self.checksum.wrapping_add(self.length);
                self.current_byte = self.length << 2;
                self.bits_remaining = 6;
                self.frame_state = FrameState::SendLength;
                self.shift_one_bit(cpu);
            }
            FrameState::SendLength => {
                let lo = (self.addr & 0xFF) as u8;
                self.checksum = self.checksum.wrapping_add(lo);
                self.current_byte = lo;
                self.bits_remaining = 8;
                self.frame_state = FrameState::SendAddrLow;
                self.shift_one_bit(cpu);
            }
            FrameState::SendAddrLow => {
                let hi = (self.addr >> 8) as u8;
                self.checksum = self.checksum.wrapping_add(hi);
                self.current_byte = hi;
                self.bits_remaining = 8;
                self.frame_state = FrameState::SendAddrHigh;
                self.shift_one_bit(cpu);
            }
            FrameState::SendAddrHigh => {
                let byte = self.payload[0];
                self.checksum = self.checksum.wrapping_add(byte);
                self.current_byte = byte;
                self.bits_remaining = 8;
                self.payload_index = 1;
                self.frame_state = FrameState::SendPayload;
                self.shift_one_bit(cpu);
            }
            FrameState::SendPayload => {
                if self.payload_index < PAYLOAD_SIZE {
                    let byte = self.payload[self.payload_index];
                    self.checksum = self.checksum.wrapping_add(byte);
                    self.current_byte = byte;
                    self.bits_remaining = 8;
                    self.payload_index += 1;
                } else {
                    let negated = (!self.checksum).wrapping_add(1);
                    self.checksum = negated;
                    self.current_byte = negated;
                    self.bits_remaining = 8;
                    self.frame_state = FrameState::SendChecksum;
                }
                self.shift_one_bit(cpu);
            }
            FrameState::SendChecksum => {
                self.frame_state = FrameState::FrameDone;
            }
            FrameState::WaitVSyncNeg | FrameState::WaitHSync1 | FrameState::WaitHSync2 | FrameState::FrameDone => {
                unreachable!("advance_send_phase only called once a Send* phase is exhausted")
            }
        }
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gt1::Gt1Segment;
    use gigatron_cpu::CpuConfig;

    /// Drive a CPU through a fixed sequence of OUT-pin values, one per
    /// tick, by programming a ROM of `LD #v,OUT` instructions — no real
    /// raster timing, just the edges the loader cares about.
    fn cpu_from_out_sequence(sequence: &[u8]) -> Cpu {
        let mut cpu = Cpu::new(CpuConfig::default());
        let mut bytes = Vec::with_capacity(sequence.len() * 2);
        for &v in sequence {
            let word = Cpu::encode(0, 6, 0, v); // LD D=v,OUT
            bytes.push((word >> 8) as u8);
            bytes.push((word & 0xFF) as u8);
        }
        cpu.load_rom_bytes(&bytes);
        cpu
    }

    const HI: u8 = HSYNC_BIT | VSYNC_BIT;

    fn push_vsync_rising(seq: &mut Vec<u8>) {
        seq.push(HSYNC_BIT); // VSYNC low
        seq.push(HI); // VSYNC high: rising edge
    }

    fn push_hsync_rising(seq: &mut Vec<u8>) {
        seq.push(VSYNC_BIT); // HSYNC low
        seq.push(HI); // HSYNC high: rising edge
    }

    fn push_vsync_falling(seq: &mut Vec<u8>) {
        seq.push(HI); // VSYNC high
        seq.push(HSYNC_BIT); // VSYNC low: falling edge
    }

    #[test]
    fn reset_wait_completes_after_100_vsyncs() {
        let mut seq = vec![HI];
        for _ in 0..100 {
            push_vsync_rising(&mut seq);
        }
        let mut cpu = cpu_from_out_sequence(&seq);
        let mut loader = Loader::new();
        assert!(loader.start(Some(trivial_program()), &mut cpu));
        cpu.tick(); // consume the seed instruction, matches loader.prev_out below
        loader.prev_out = cpu.out();

        for _ in 0..200 {
            if loader.state() == LoaderState::MenuNav {
                break;
            }
            cpu.tick();
            loader.tick(&mut cpu);
        }
        assert_eq!(loader.state(), LoaderState::MenuNav);
    }

    #[test]
    fn menu_nav_schedule_presses_down_then_a() {
        assert_eq!(menu_button_byte(1), BTN_DOWN ^ 0xFF, "odd frame presses DOWN");
        assert_eq!(menu_button_byte(2), 0xFF, "even frame releases");
        assert_eq!(menu_button_byte(9), BTN_DOWN ^ 0xFF);
        assert_eq!(menu_button_byte(10), 0xFF);
        assert_eq!(menu_button_byte(11), BTN_A ^ 0xFF, "frame 11 presses A");
        assert_eq!(menu_button_byte(12), 0xFF, "frame 12 releases A");
        assert_eq!(menu_button_byte(70), 0xFF);
    }

    fn trivial_program() -> Gt1Program {
        Gt1Program {
            segments: vec![Gt1Segment {
                address: 0x0200,
                data: vec![0; 3],
            }],
            start_address: 0,
            has_start_address: false,
        }
    }

    /// Build a full frame's OUT sequence and run it through `frame_tick`,
    /// returning the loader's checksum once `FrameDone` is reached.
    fn run_one_frame(loader: &mut Loader, cpu: &mut Cpu) {
        let mut seq = vec![HI];
        push_vsync_falling(&mut seq);
        // One edge into WaitHSync2, then a generous surplus of HSYNC
        // edges — enough for every Send* phase (8+6+8+8+8*60+8 = 518)
        // plus the WaitHSync1 edge and the final FrameDone transition
        // edge that consumes no bits.
        for _ in 0..(8 + 6 + 8 + 8 + 8 * PAYLOAD_SIZE + 8 + 16) {
            push_hsync_rising(&mut seq);
        }
        *cpu = cpu_from_out_sequence(&seq);
        cpu.tick();
        loader.prev_out = cpu.out();
        for _ in 0..seq.len() - 1 {
            cpu.tick();
            loader.tick(cpu);
            if loader.frame_state == FrameState::FrameDone {
                break;
            }
        }
    }

    #[test]
    fn sync_frame_checksum_matches_formula() {
        let mut cpu = Cpu::new(CpuConfig::default());
        let mut loader = Loader::new();
        loader.begin_sync_frame();
        loader.checksum = 0;

        run_one_frame(&mut loader, &mut cpu);

        let expected = (!(0xFFu8.wrapping_add(0xFFu8 << 6))).wrapping_add(1);
        assert_eq!(loader.checksum, expected);
        assert_eq!(loader.frame_state, FrameState::FrameDone);

        loader.on_frame_done(&mut cpu);
        assert_eq!(loader.checksum, LOADER_INIT_CHECKSUM);
    }

    #[test]
    fn checksum_persists_across_data_frames() {
        let mut cpu = Cpu::new(CpuConfig::default());
        let mut loader = Loader::new();
        loader.program = Some(Gt1Program {
            segments: vec![Gt1Segment {
                address: 0x0200,
                data: vec![0x11; 3],
            }],
            start_address: 0,
            has_start_address: false,
        });
        loader.checksum = LOADER_INIT_CHECKSUM;
        loader.current_segment = 0;
        loader.segment_offset = 0;
        loader.begin_next_frame(&mut cpu);
        assert_eq!(loader.state, LoaderState::Sending);

        run_one_frame(&mut loader, &mut cpu);
        let checksum_after_frame_one = loader.checksum;
        loader.on_frame_done(&mut cpu);

        // Second frame must continue accumulating from the first frame's
        // persisted (negated) checksum, not reset to a fresh baseline.
        assert_ne!(loader.checksum, LOADER_INIT_CHECKSUM);
        assert_eq!(loader.checksum, checksum_after_frame_one, "checksum carries into the next frame's setup");
    }
}
