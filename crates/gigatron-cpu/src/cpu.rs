//! The Gigatron CPU core.
//!
//! A single-chip-free, 8-bit Harvard CPU built from counters, a register
//! file, and an ALU wired directly to the instruction decoder — there is
//! no microcode. Every tick fetches one instruction and fully executes it;
//! there is no overlapped pipeline beyond the `pc`/`next_pc` prefetch
//! register pair.

use rand::Rng;

use crate::config::CpuConfig;
use crate::error::CpuError;
use crate::registers::RegisterSnapshot;

/// Bit 7 of the OUT register: VSYNC, active low.
pub const VSYNC_BIT: u8 = 0x80;
/// Bit 6 of the OUT register: HSYNC, active low.
pub const HSYNC_BIT: u8 = 0x40;
/// Mask of the 6-bit RRGGBB color field in OUT.
pub const COLOR_MASK: u8 = 0x3F;

const OP_LD: u8 = 0;
const OP_AND: u8 = 1;
const OP_OR: u8 = 2;
const OP_XOR: u8 = 3;
const OP_ADD: u8 = 4;
const OP_SUB: u8 = 5;
const OP_ST: u8 = 6;
const OP_BR: u8 = 7;

/// The Gigatron CPU: ROM, RAM, registers, and the extended-memory side
/// channel (CTRL/bank/MISO).
pub struct Cpu {
    config: CpuConfig,

    rom: Vec<u16>,
    rom_mask: u16,

    ram: Vec<u8>,
    ram_mask: u32,
    extended: bool,

    pc: u16,
    next_pc: u16,
    ac: u8,
    x: u8,
    y: u8,
    out: u8,
    outx: u8,
    in_reg: u8,

    ctrl: u16,
    bank: u32,
    prev_ctrl: i32,
    miso: u8,

    cycles: u64,
}

impl Cpu {
    /// Build a fresh CPU: zeroed ROM, randomized RAM (power-on noise,
    /// seeded once — never re-randomized by [`Cpu::reset`]), registers at
    /// their reset values.
    #[must_use]
    pub fn new(config: CpuConfig) -> Self {
        let rom_size = 1usize << config.rom_addr_width;
        let ram_size = 1usize << config.ram_addr_width;

        let mut ram = vec![0u8; ram_size];
        rand::thread_rng().fill(ram.as_mut_slice());

        let mut cpu = Self {
            config,
            rom: vec![0u16; rom_size],
            rom_mask: (rom_size - 1) as u16,
            ram,
            ram_mask: (ram_size - 1) as u32,
            extended: ram_size > 65536,
            pc: 0,
            next_pc: 0,
            ac: 0,
            x: 0,
            y: 0,
            out: 0,
            outx: 0,
            in_reg: 0,
            ctrl: 0,
            bank: 0,
            prev_ctrl: -1,
            miso: 0xFF,
            cycles: 0,
        };
        cpu.reset();
        cpu
    }

    /// Reset registers to their power-on values. RAM and ROM are left
    /// untouched — only [`Cpu::new`] randomizes RAM.
    pub fn reset(&mut self) {
        self.pc = 0;
        self.next_pc = self.pc.wrapping_add(1) & self.rom_mask;
        self.ac = 0;
        self.x = 0;
        self.y = 0;
        self.out = 0;
        self.outx = 0;
        self.in_reg = 0;
        self.ctrl = 0x7C;
        self.bank = 0;
        self.prev_ctrl = -1;
        self.cycles = 0;
    }

    /// Load a ROM image: big-endian 16-bit words. Up to `rom_size` words
    /// are stored; excess bytes are ignored; a short image leaves the
    /// remainder at zero.
    pub fn load_rom_bytes(&mut self, bytes: &[u8]) {
        for (i, word) in self.rom.iter_mut().enumerate() {
            let hi = bytes.get(i * 2).copied();
            let lo = bytes.get(i * 2 + 1).copied();
            let (Some(hi), Some(lo)) = (hi, lo) else {
                break;
            };
            *word = (u16::from(hi) << 8) | u16::from(lo);
        }
    }

    /// Load a ROM image from a file on disk.
    pub fn load_rom_file(&mut self, path: &std::path::Path) -> Result<(), CpuError> {
        let bytes = std::fs::read(path)?;
        self.load_rom_bytes(&bytes);
        Ok(())
    }

    /// Drive the input register. Must not be called while a loader is
    /// active (see `gigatron-loader`); the CPU itself has no notion of
    /// who owns `in_reg`.
    pub fn set_input(&mut self, value: u8) {
        self.in_reg = value;
    }

    /// Drive the SPI MISO latch, read back by ALU ops when `ctrl & 1` is set.
    pub fn set_miso(&mut self, value: u8) {
        self.miso = value;
    }

    #[must_use]
    pub fn pc(&self) -> u16 {
        self.pc
    }

    #[must_use]
    pub fn out(&self) -> u8 {
        self.out
    }

    #[must_use]
    pub fn in_reg(&self) -> u8 {
        self.in_reg
    }

    #[must_use]
    pub fn outx(&self) -> u8 {
        self.outx
    }

    #[must_use]
    pub fn hsync(&self) -> bool {
        self.out & HSYNC_BIT != 0
    }

    #[must_use]
    pub fn vsync(&self) -> bool {
        self.out & VSYNC_BIT != 0
    }

    #[must_use]
    pub fn color(&self) -> u8 {
        self.out & COLOR_MASK
    }

    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    #[must_use]
    pub fn hz(&self) -> u64 {
        self.config.hz
    }

    #[must_use]
    pub fn ctrl(&self) -> u16 {
        self.ctrl
    }

    #[must_use]
    pub fn bank(&self) -> u32 {
        self.bank
    }

    #[must_use]
    pub fn registers_snapshot(&self) -> RegisterSnapshot {
        RegisterSnapshot {
            pc: self.pc,
            next_pc: self.next_pc,
            ac: self.ac,
            x: self.x,
            y: self.y,
            out: self.out,
            outx: self.outx,
            in_reg: self.in_reg,
            ctrl: self.ctrl,
            bank: self.bank,
            cycles: self.cycles,
        }
    }

    /// Advance by `n` clock ticks.
    pub fn run(&mut self, n: u64) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// Translate a CPU-visible 16-bit address into a RAM index.
    ///
    /// On extended-memory builds, addresses with bit 15 set are XORed
    /// with the current bank before masking; otherwise the address is
    /// only masked.
    fn translate(&self, addr: u16) -> usize {
        let addr = u32::from(addr);
        let physical = if self.extended && addr & 0x8000 != 0 {
            addr ^ self.bank
        } else {
            addr
        };
        (physical & self.ram_mask) as usize
    }

    fn ram_read(&self, addr: u16) -> u8 {
        self.ram[self.translate(addr)]
    }

    fn ram_write(&mut self, addr: u16, value: u8) {
        let idx = self.translate(addr);
        self.ram[idx] = value;
    }

    /// Address computed from MODE, per the shared address-source table
    /// (spec.md §4.1). Returns `(address, post_increment_x)`.
    fn mode_address(mode: u8, x: u8, y: u8, d: u8) -> (u16, bool) {
        match mode {
            0 | 4 | 5 | 6 => (u16::from(d), false),
            1 => (u16::from(x), false),
            2 => ((u16::from(y) << 8) | u16::from(d), false),
            3 => ((u16::from(y) << 8) | u16::from(x), false),
            7 => ((u16::from(y) << 8) | u16::from(x), true),
            _ => unreachable!("mode is a 3-bit field"),
        }
    }

    /// Read the BUS-selected operand for an ALU op. BUS=RAM reads MISO
    /// instead of RAM whenever `ctrl & 1` is set on extended builds.
    fn alu_operand(&self, bus: u8, addr: u16, d: u8) -> u8 {
        match bus {
            0 => d,
            1 => {
                if self.extended && self.ctrl & 1 != 0 {
                    self.miso
                } else {
                    self.ram_read(addr)
                }
            }
            2 => self.ac,
            3 => self.in_reg,
            _ => unreachable!("bus is a 2-bit field"),
        }
    }

    fn execute_alu(&mut self, op: u8, mode: u8, bus: u8, d: u8) {
        let (addr, post_inc) = Self::mode_address(mode, self.x, self.y, d);
        let operand = self.alu_operand(bus, addr, d);
        let result = match op {
            OP_LD => operand,
            OP_AND => self.ac & operand,
            OP_OR => self.ac | operand,
            OP_XOR => self.ac ^ operand,
            OP_ADD => self.ac.wrapping_add(operand),
            OP_SUB => self.ac.wrapping_sub(operand),
            _ => unreachable!("alu op is one of LD/AND/OR/XOR/ADD/SUB"),
        };

        let prev_out = self.out;
        match mode {
            0..=3 => self.ac = result,
            4 => self.x = result,
            5 => self.y = result,
            6 | 7 => self.out = result,
            _ => unreachable!(),
        }
        if post_inc {
            self.x = self.x.wrapping_add(1);
        }
        if matches!(mode, 6 | 7) {
            let risen = !prev_out & self.out;
            if risen & HSYNC_BIT != 0 {
                self.outx = self.ac;
            }
        }
    }

    fn execute_st(&mut self, mode: u8, bus: u8, d: u8) {
        let (addr, post_inc) = Self::mode_address(mode, self.x, self.y, d);
        match bus {
            0 => self.ram_write(addr, d),
            1 => {
                if self.extended {
                    self.prev_ctrl = i32::from(self.ctrl);
                    self.ctrl = addr & 0x80FD;
                    self.bank = ((u32::from(self.ctrl) & 0xC0) << 9) ^ 0x8000;
                } else {
                    self.ram_write(addr, 0);
                }
            }
            2 => self.ram_write(addr, self.ac),
            3 => self.ram_write(addr, self.in_reg),
            _ => unreachable!("bus is a 2-bit field"),
        }
        if post_inc {
            self.x = self.x.wrapping_add(1);
        }
        match mode {
            4 => self.x = self.ac,
            5 => self.y = self.ac,
            _ => {}
        }
    }

    /// `BUS=RAM` for a branch offset has no MODE-derived address (MODE
    /// encodes the condition instead), so it reads the immediate `D` byte
    /// as the address — the only addressing submode that survives once
    /// MODE is spent on the condition.
    fn branch_operand(&self, bus: u8, d: u8) -> u8 {
        match bus {
            0 => d,
            1 => {
                if self.extended && self.ctrl & 1 != 0 {
                    self.miso
                } else {
                    self.ram_read(u16::from(d))
                }
            }
            2 => self.ac,
            3 => self.in_reg,
            _ => unreachable!("bus is a 2-bit field"),
        }
    }

    fn execute_br(&mut self, mode: u8, bus: u8, d: u8, captured_pc: u16) {
        let signed_ac = self.ac as i8;
        let taken = match mode {
            0 => true,
            1 => signed_ac > 0,
            2 => signed_ac < 0,
            3 => self.ac != 0,
            4 => self.ac == 0,
            5 => signed_ac >= 0,
            6 => signed_ac <= 0,
            7 => true,
            _ => unreachable!(),
        };
        if !taken {
            return;
        }
        let offset = u16::from(self.branch_operand(bus, d));
        let base = if mode == 0 {
            u16::from(self.y) << 8
        } else {
            captured_pc & 0xFF00
        };
        self.next_pc = (base | offset) & self.rom_mask;
    }

    /// Advance by one clock tick: fetch the instruction at `pc`, advance
    /// the prefetch pair, execute, count the cycle.
    pub fn tick(&mut self) {
        self.prev_ctrl = -1;

        let captured_pc = self.pc;
        self.pc = self.next_pc;
        self.next_pc = self.pc.wrapping_add(1) & self.rom_mask;

        let word = self.rom[usize::from(captured_pc & self.rom_mask)];
        let op = ((word >> 13) & 0x7) as u8;
        let mode = ((word >> 10) & 0x7) as u8;
        let bus = ((word >> 8) & 0x3) as u8;
        let d = (word & 0xFF) as u8;

        match op {
            OP_LD | OP_AND | OP_OR | OP_XOR | OP_ADD | OP_SUB => self.execute_alu(op, mode, bus, d),
            OP_ST => self.execute_st(mode, bus, d),
            OP_BR => self.execute_br(mode, bus, d, captured_pc),
            _ => unreachable!("op is a 3-bit field"),
        }

        self.cycles += 1;
    }

    /// Encode an instruction word from its fields. A small convenience
    /// for building test programs and for `gigatron-loader`'s GT1
    /// round-trip tests, not used by `tick` itself.
    #[must_use]
    pub const fn encode(op: u8, mode: u8, bus: u8, d: u8) -> u16 {
        ((op as u16 & 0x7) << 13) | ((mode as u16 & 0x7) << 10) | ((bus as u16 & 0x3) << 8) | d as u16
    }
}
