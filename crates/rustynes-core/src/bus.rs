//! NES System Bus Implementation.
//!
//! The bus connects the CPU to all other components:
//! - PPU registers ($2000-$2007, mirrored every 8 bytes to $3FFF)
//! - APU/IO registers ($4000-$4017)
//! - Cartridge space ($4020-$FFFF)
//! - Internal RAM ($0000-$07FF, mirrored to $1FFF)

use rustynes_apu::Apu;
use rustynes_cpu::Bus;
use rustynes_mappers::{CartridgeMapper, Mapper, Mirroring};
use rustynes_ppu::{Mirroring as PpuMirroring, Ppu};

/// Translate the cartridge mapper's mirroring mode into the PPU crate's own
/// `Mirroring` type. The two crates define independent enums (the PPU
/// doesn't otherwise depend on `rustynes-mappers`) with identical variants.
fn to_ppu_mirroring(mirroring: Mirroring) -> PpuMirroring {
    match mirroring {
        Mirroring::Horizontal => PpuMirroring::Horizontal,
        Mirroring::Vertical => PpuMirroring::Vertical,
        Mirroring::SingleScreenLower => PpuMirroring::SingleScreenLower,
        Mirroring::SingleScreenUpper => PpuMirroring::SingleScreenUpper,
        Mirroring::FourScreen => PpuMirroring::FourScreen,
    }
}

/// Controller input state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerState {
    /// Button states: A, B, Select, Start, Up, Down, Left, Right
    pub buttons: u8,
}

impl ControllerState {
    /// A button mask.
    pub const A: u8 = 0x01;
    /// B button mask.
    pub const B: u8 = 0x02;
    /// Select button mask.
    pub const SELECT: u8 = 0x04;
    /// Start button mask.
    pub const START: u8 = 0x08;
    /// Up button mask.
    pub const UP: u8 = 0x10;
    /// Down button mask.
    pub const DOWN: u8 = 0x20;
    /// Left button mask.
    pub const LEFT: u8 = 0x40;
    /// Right button mask.
    pub const RIGHT: u8 = 0x80;
}

/// Translate a PPU nametable address ($2000-$3EFF) into a CIRAM offset,
/// applying the cartridge's current mirroring mode.
fn ciram_addr(mirroring: Mirroring, addr: u16) -> usize {
    let addr = addr & 0x0FFF;

    match mirroring {
        Mirroring::Horizontal => {
            let nametable = (addr >> 11) & 1;
            let offset = addr & 0x03FF;
            (nametable * 0x400 + offset) as usize
        }
        Mirroring::Vertical => {
            let nametable = (addr >> 10) & 1;
            let offset = addr & 0x03FF;
            (nametable * 0x400 + offset) as usize
        }
        Mirroring::SingleScreenLower => (addr & 0x03FF) as usize,
        Mirroring::SingleScreenUpper => ((addr & 0x03FF) + 0x400) as usize,
        Mirroring::FourScreen => {
            // Four-screen boards carry their own extra CIRAM; until that's
            // wired up this falls back to vertical mirroring.
            let nametable = (addr >> 10) & 1;
            let offset = addr & 0x03FF;
            (nametable * 0x400 + offset) as usize
        }
    }
}

/// Read PPU-space memory below $2000 (CHR) or $2000-$3FFF (CIRAM), tracking
/// the PPU A12 address line so the mapper can be notified of rising edges.
///
/// Real MMC3/MMC6/VRC4 boards watch A12 on the physical PPU address bus,
/// which toggles on every CHR pattern-table fetch and also (more rarely) on
/// CPU-driven $2007 accesses. This models both the same way: any CHR address
/// probe (read or write) below $2000 updates the latched A12 level, and a
/// 0->1 transition notifies the mapper exactly once. No additional deglitch
/// gate is needed on the mapper side: every CHR probe the PPU issues already
/// corresponds to a genuine address-bus change (at most one rising edge per
/// visible scanline), not a sub-dot glitch, so the mapper clocks its IRQ
/// counter on every notified edge.
fn probe_a12(mapper: &mut CartridgeMapper, last_a12: &mut bool, pre_render: bool, addr: u16) {
    if addr >= 0x2000 {
        return;
    }
    let a12 = addr & 0x1000 != 0;
    if a12 && !*last_a12 {
        mapper.notify_a12_rise(pre_render);
    }
    *last_a12 = a12;
}

/// NES system bus connecting all components.
pub struct NesBus {
    /// Internal RAM (2KB, mirrored 4 times).
    pub ram: [u8; 2048],
    /// PPU internal VRAM (CIRAM, 2KB) for nametables.
    pub ciram: [u8; 2048],
    /// PPU (Picture Processing Unit).
    pub ppu: Ppu,
    /// APU (Audio Processing Unit).
    pub apu: Apu,
    /// Cartridge mapper.
    pub mapper: CartridgeMapper,
    /// Controller 1 state.
    pub controller1: ControllerState,
    /// Controller 2 state.
    pub controller2: ControllerState,
    /// Controller 1 shift register.
    controller1_shift: u8,
    /// Controller 2 shift register.
    controller2_shift: u8,
    /// Controller strobe latch.
    controller_strobe: bool,
    /// OAM DMA page.
    oam_dma_page: Option<u8>,
    /// CPU cycle counter for DMA timing.
    cpu_cycles: u64,
    /// DMC DMA stall cycles.
    dmc_stall_cycles: u8,
    /// Last value on the data bus (for open bus behavior).
    last_bus_value: u8,
    /// Latched state of the PPU A12 address line, for mapper IRQ clocking.
    last_a12: bool,
    /// NMI pending from PPU.
    nmi_pending: bool,
    /// CPU cycles elapsed within the current downsampling window.
    sample_cycle: u32,
    /// Set when the PPU completed a frame during the most recent `step_ppu`.
    frame_complete: bool,
}

impl NesBus {
    /// CPU cycles per audio sample (at 44100 Hz).
    const CYCLES_PER_SAMPLE: u32 = 40; // ~1789773 / 44100

    /// Create a new NES bus with the given mapper.
    pub fn new(mapper: CartridgeMapper) -> Self {
        let mirroring = mapper.mirroring();
        Self {
            ram: [0; 2048],
            ciram: [0; 2048],
            ppu: Ppu::new(to_ppu_mirroring(mirroring)),
            apu: Apu::new(),
            mapper,
            controller1: ControllerState::default(),
            controller2: ControllerState::default(),
            controller1_shift: 0,
            controller2_shift: 0,
            controller_strobe: false,
            oam_dma_page: None,
            cpu_cycles: 0,
            dmc_stall_cycles: 0,
            last_bus_value: 0,
            last_a12: false,
            nmi_pending: false,
            sample_cycle: 0,
            frame_complete: false,
        }
    }

    /// Reset the bus and all components.
    pub fn reset(&mut self) {
        self.ram.fill(0);
        self.ciram.fill(0);
        self.ppu.reset();
        self.ppu.set_mirroring(to_ppu_mirroring(self.mapper.mirroring()));
        self.apu.reset();
        self.mapper.reset();
        self.controller1_shift = 0;
        self.controller2_shift = 0;
        self.controller_strobe = false;
        self.oam_dma_page = None;
        self.cpu_cycles = 0;
        self.dmc_stall_cycles = 0;
        self.last_bus_value = 0;
        self.last_a12 = false;
        self.nmi_pending = false;
        self.sample_cycle = 0;
        self.frame_complete = false;
    }

    /// Check if OAM DMA is pending.
    #[must_use]
    pub fn oam_dma_pending(&self) -> bool {
        self.oam_dma_page.is_some()
    }

    /// Execute OAM DMA transfer.
    ///
    /// Returns the number of CPU cycles consumed.
    pub fn execute_oam_dma(&mut self) -> u16 {
        if let Some(page) = self.oam_dma_page.take() {
            let base = u16::from(page) << 8;

            let mut data = [0u8; 256];
            for (i, slot) in data.iter_mut().enumerate() {
                *slot = self.cpu_read(base.wrapping_add(i as u16));
            }
            self.ppu.oam_dma(&data);

            // DMA takes 513 or 514 cycles depending on CPU cycle parity
            let cycles = if self.cpu_cycles % 2 == 1 { 514 } else { 513 };
            self.cpu_cycles += u64::from(cycles);
            cycles
        } else {
            0
        }
    }

    /// Internal CPU read without updating bus state (for DMA).
    fn cpu_read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            0x8000..=0xFFFF => self.mapper.read_prg(addr),
            _ => 0,
        }
    }

    /// Step the PPU by 3 dots (one CPU cycle worth).
    ///
    /// Returns true if NMI should be triggered.
    pub fn step_ppu(&mut self) -> bool {
        let mut nmi = false;

        for _ in 0..3 {
            let pre_render = self.ppu.scanline() == 261;
            let mapper = &mut self.mapper;
            let ciram = &mut self.ciram;
            let last_a12 = &mut self.last_a12;
            let mirroring = mapper.mirroring();

            let (dot_frame_complete, dot_nmi) = self.ppu.step_with_chr(|addr| {
                probe_a12(mapper, last_a12, pre_render, addr);
                if addr < 0x2000 {
                    mapper.observe_chr_read(addr);
                    mapper.read_chr(addr)
                } else {
                    ciram[ciram_addr(mirroring, addr)]
                }
            });

            if dot_frame_complete {
                self.frame_complete = true;
            }
            if dot_nmi {
                nmi = true;
            }
        }

        // Clock the mapper for each CPU cycle
        self.mapper.clock(1);

        if nmi {
            self.nmi_pending = true;
        }

        nmi
    }

    /// Drain the frame-complete flag raised by `step_ppu` when the PPU
    /// finished a frame since the last call.
    pub fn take_frame_complete(&mut self) -> bool {
        core::mem::take(&mut self.frame_complete)
    }

    /// Step the APU by one CPU cycle.
    ///
    /// Returns audio sample if available.
    pub fn step_apu(&mut self) -> Option<f32> {
        self.apu.clock();

        // Handle DMC sample fetch through the cartridge mapper, then collect
        // whatever CPU stall that fetch owes.
        if self.apu.dmc_needs_sample() {
            let addr = self.apu.dmc_sample_addr();
            let sample = self.mapper.read_prg(addr);
            self.apu.dmc_fill_sample(sample);
        }
        self.dmc_stall_cycles = self
            .dmc_stall_cycles
            .saturating_add(self.apu.consume_dmc_stall_cycles());

        self.sample_cycle += 1;

        if self.sample_cycle >= Self::CYCLES_PER_SAMPLE {
            self.sample_cycle = 0;
            // mix_sample_blep low-pass filters the mixer output across the
            // downsampling window instead of averaging raw per-cycle output,
            // then we undo its u8-PCM centering to keep this accessor's
            // existing 0.0-1.0 contract.
            let pcm = self.apu.mix_sample_blep(self.cpu_cycles, Self::CYCLES_PER_SAMPLE);
            Some((f32::from(pcm) - 128.0) / 127.0)
        } else {
            None
        }
    }

    /// Check if NMI is pending.
    #[must_use]
    pub fn nmi_pending(&self) -> bool {
        self.nmi_pending
    }

    /// Acknowledge NMI.
    pub fn acknowledge_nmi(&mut self) {
        self.nmi_pending = false;
    }

    /// Check if IRQ is pending (mapper or APU frame/DMC IRQ, OR'd together
    /// on the shared cartridge IRQ line).
    #[must_use]
    pub fn irq_pending(&self) -> bool {
        self.mapper.irq_pending() || self.apu.irq_pending()
    }

    /// Acknowledge mapper IRQ.
    pub fn acknowledge_mapper_irq(&mut self) {
        self.mapper.irq_acknowledge();
    }

    /// Get the current CPU cycle count.
    #[must_use]
    pub fn cpu_cycles(&self) -> u64 {
        self.cpu_cycles
    }

    /// Increment CPU cycle count.
    pub fn add_cpu_cycles(&mut self, cycles: u8) {
        self.cpu_cycles += u64::from(cycles);
    }

    /// Read controller register.
    fn read_controller(&mut self, port: u8) -> u8 {
        let shift = if port == 0 {
            &mut self.controller1_shift
        } else {
            &mut self.controller2_shift
        };

        // Open bus behavior: bits 5-7 come from last bus value
        let open_bus = self.last_bus_value & 0xE0;

        // Read bit 0 from shift register
        let data = (*shift & 1) | open_bus;
        *shift >>= 1;
        *shift |= 0x80; // Shift in 1s after all buttons read

        data
    }

    /// Write controller strobe.
    fn write_controller_strobe(&mut self, val: u8) {
        let new_strobe = val & 1 != 0;

        // On falling edge (strobe 1->0), latch controller state
        if self.controller_strobe && !new_strobe {
            self.controller1_shift = self.controller1.buttons;
            self.controller2_shift = self.controller2.buttons;
        }

        self.controller_strobe = new_strobe;

        // While strobe is high, continuously reload
        if self.controller_strobe {
            self.controller1_shift = self.controller1.buttons;
            self.controller2_shift = self.controller2.buttons;
        }
    }

    /// Check if DMC stall is active.
    #[must_use]
    pub fn dmc_stall_active(&self) -> bool {
        self.dmc_stall_cycles > 0
    }

    /// Decrement DMC stall counter.
    pub fn decrement_dmc_stall(&mut self) {
        if self.dmc_stall_cycles > 0 {
            self.dmc_stall_cycles -= 1;
        }
    }

    /// Peek at memory without side effects.
    ///
    /// This is useful for debugging/display purposes where we don't want
    /// to trigger PPU register side effects or mapper state changes.
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        match addr {
            // Internal RAM (mirrored every 2KB)
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],

            // PPU registers - return last bus value to avoid side effects
            0x2000..=0x3FFF => self.last_bus_value,

            // APU and I/O registers
            0x4000..=0x4017 => match addr {
                0x4015 => self.apu.peek_status(),
                0x4016 | 0x4017 => self.last_bus_value,
                _ => self.last_bus_value,
            },

            // APU test mode
            0x4018..=0x401F => self.last_bus_value,

            // Cartridge space
            0x4020..=0xFFFF => self.mapper.read_prg(addr),
        }
    }
}

/// CPU bus implementation.
impl Bus for NesBus {
    fn read(&mut self, addr: u16) -> u8 {
        let value = match addr {
            // Internal RAM (mirrored every 2KB)
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],

            // PPU registers (mirrored every 8 bytes)
            0x2000..=0x3FFF => {
                let pre_render = self.ppu.scanline() == 261;
                let mapper = &mut self.mapper;
                let ciram = &mut self.ciram;
                let last_a12 = &mut self.last_a12;
                let mirroring = mapper.mirroring();

                self.ppu.read_register(addr, |chr_addr| {
                    probe_a12(mapper, last_a12, pre_render, chr_addr);
                    if chr_addr < 0x2000 {
                        mapper.read_chr(chr_addr)
                    } else {
                        ciram[ciram_addr(mirroring, chr_addr)]
                    }
                })
            }

            // APU and I/O registers
            0x4000..=0x4017 => match addr {
                0x4015 => self.apu.read_status(),
                0x4016 => self.read_controller(0),
                0x4017 => self.read_controller(1),
                _ => self.last_bus_value, // Write-only registers
            },

            // APU test mode (normally disabled)
            0x4018..=0x401F => self.last_bus_value,

            // Cartridge space
            0x4020..=0xFFFF => self.mapper.read_prg(addr),
        };

        self.last_bus_value = value;
        value
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.last_bus_value = val;

        match addr {
            // Internal RAM (mirrored every 2KB)
            0x0000..=0x1FFF => {
                self.ram[(addr & 0x07FF) as usize] = val;
            }

            // PPU registers (mirrored every 8 bytes)
            0x2000..=0x3FFF => {
                let pre_render = self.ppu.scanline() == 261;
                let mapper = &mut self.mapper;
                let ciram = &mut self.ciram;
                let last_a12 = &mut self.last_a12;
                let mirroring = mapper.mirroring();

                self.ppu.write_register(addr, val, |chr_addr, chr_val| {
                    probe_a12(mapper, last_a12, pre_render, chr_addr);
                    if chr_addr < 0x2000 {
                        mapper.write_chr(chr_addr, chr_val);
                    } else {
                        ciram[ciram_addr(mirroring, chr_addr)] = chr_val;
                    }
                });
            }

            // APU and I/O registers
            0x4000..=0x4017 => match addr {
                0x4000..=0x4013 | 0x4015 | 0x4017 => {
                    self.apu.write(addr, val);
                }
                0x4014 => {
                    // OAM DMA
                    self.oam_dma_page = Some(val);
                }
                0x4016 => {
                    self.write_controller_strobe(val);
                }
                _ => {}
            },

            // APU test mode (normally disabled)
            0x4018..=0x401F => {}

            // Cartridge space
            0x4020..=0xFFFF => {
                self.mapper.write_prg(addr, val);
            }
        }
    }
}
