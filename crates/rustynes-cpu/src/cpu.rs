//! CPU register file, operand decode, and interrupt sequencing.
//!
//! Instruction bodies live in [`crate::instructions`]; this module owns the
//! registers, the bus-facing cycle-accounting primitives those bodies call
//! (`read_byte`, `write_byte`, `push_byte`, `pop_byte`, `push_word`,
//! `pop_word`, `tick`), operand-address resolution per [`AddrMode`], and
//! NMI/IRQ/BRK sequencing.

use crate::addressing::{AddrMode, ADDR_MODE_TABLE};
use crate::instructions::{is_jam_opcode, opcode_name, OPCODE_TABLE};
use crate::status::Status;
use crate::vectors;

/// Bus the CPU reads and writes through.
///
/// Each call models one CPU cycle's worth of bus activity; callers that want
/// to interleave PPU/APU ticking per CPU cycle should do so from within
/// these methods, or via [`Cpu::set_cycle_hook`].
pub trait Bus {
    /// Read a byte from the given address.
    fn read(&mut self, addr: u16) -> u8;
    /// Write a byte to the given address.
    fn write(&mut self, addr: u16, value: u8);
}

/// How the CPU behaves when it decodes a KIL/JAM opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IllegalMode {
    /// JAM opcodes behave as the unofficial-opcode table already does: a
    /// self-re-executing two-cycle instruction that never advances past it.
    #[default]
    Lenient,
    /// The first JAM opcode raises a [`CpuFault`] and permanently halts the
    /// CPU; subsequent `step()` calls are no-ops (cycle stasis).
    Strict,
}

/// Which return address `BRK` pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrkReturnMode {
    /// Skip the padding byte following the `BRK` opcode (PC+2). Standard.
    #[default]
    PcPlusTwo,
    /// Do not skip the padding byte (PC+1).
    PcPlusOne,
}

/// CLI/PLP one-instruction IRQ-polling delay state machine.
///
/// `CLI`/`PLP` clearing the I flag does not affect IRQ servicing until after
/// the *next* instruction completes. `SEI` (and RTI, which has its own
/// cancellation rule) are not subject to this delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterruptDelay {
    /// IRQ polling uses the current I flag and IRQ line directly.
    #[default]
    Normal,
    /// The instruction about to run must not service a pending IRQ, even if
    /// the line is asserted and I is clear.
    DelayOneInstruction,
    /// The instruction about to run must service a pending IRQ if the line
    /// is asserted, without re-checking I (the flag is already known clear).
    FireNextRegardlessOfI,
}

/// Diagnostic snapshot raised when the CPU hits an unrecoverable condition.
///
/// Currently only raised by a `KIL`/`JAM` opcode under
/// [`IllegalMode::Strict`]; the opcode table itself has no undefined
/// encodings, every byte decodes to *some* instruction.
#[derive(Debug, Clone, thiserror::Error)]
#[error("CPU fault at pc=0x{pc:04X}: opcode 0x{opcode:02X} ({})", opcode_name(*opcode))]
pub struct CpuFault {
    /// Program counter at the moment of the fault.
    pub pc: u16,
    /// The faulting opcode byte.
    pub opcode: u8,
    /// The opcode byte and the three bytes following it in memory.
    pub bytes: [u8; 4],
    /// Eight bytes of the stack page centered on the current stack pointer.
    pub stack_window: [u8; 8],
    /// The eight most recently fetched instruction addresses, oldest first.
    pub recent_pc: [u16; 8],
}

/// Cycle-accurate MOS 6502 CPU core.
pub struct Cpu {
    pub(crate) a: u8,
    pub(crate) x: u8,
    pub(crate) y: u8,
    pub(crate) pc: u16,
    pub(crate) sp: u8,
    pub(crate) status: Status,

    pub(crate) operand_addr: u16,
    pub(crate) operand_value: u8,

    cycles: u64,
    jammed: bool,

    pub(crate) irq_line: bool,
    pub(crate) nmi_pending: bool,
    pub(crate) nmi_triggered: bool,

    pub(crate) interrupt_delay: InterruptDelay,
    illegal_mode: IllegalMode,
    pub(crate) brk_skip_padding: bool,

    /// Used by `branch()` to reproduce the (benign, at instruction-boundary
    /// granularity) IRQ-edge bookkeeping the kept instruction bodies expect;
    /// see the module docs on interrupt polling granularity.
    pub(crate) run_irq: bool,
    pub(crate) prev_run_irq: bool,

    recent_pc: [u16; 8],
    recent_pc_idx: usize,

    cycle_hook: Option<Box<dyn FnMut()>>,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// Creates a new CPU with registers zeroed. Call [`Cpu::reset`] before
    /// stepping to load the reset vector and establish power-on state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            pc: 0,
            sp: 0xFD,
            status: Status::POWER_ON,
            operand_addr: 0,
            operand_value: 0,
            cycles: 0,
            jammed: false,
            irq_line: false,
            nmi_pending: false,
            nmi_triggered: false,
            interrupt_delay: InterruptDelay::Normal,
            illegal_mode: IllegalMode::Lenient,
            brk_skip_padding: true,
            run_irq: false,
            prev_run_irq: false,
            recent_pc: [0; 8],
            recent_pc_idx: 0,
            cycle_hook: None,
        }
    }

    /// Performs the 6502 reset sequence: five internal cycles, then loads
    /// PC from the reset vector. Establishes the documented post-reset
    /// register state (SP = 0xFD, I and U set).
    pub fn reset(&mut self, bus: &mut dyn Bus) {
        self.sp = 0xFD;
        self.status = Status::POWER_ON;
        for _ in 0..5 {
            self.tick(bus);
        }
        let lo = self.read_byte(bus, vectors::RESET);
        let hi = self.read_byte(bus, vectors::RESET.wrapping_add(1));
        self.pc = u16::from_le_bytes([lo, hi]);
        self.jammed = false;
        self.interrupt_delay = InterruptDelay::Normal;
        self.irq_line = false;
        self.nmi_pending = false;
        self.nmi_triggered = false;
    }

    /// Latches a non-maskable interrupt. The NMI is edge-triggered: callers
    /// must invoke this exactly once per rising edge observed on the line.
    pub fn request_nmi(&mut self) {
        self.nmi_pending = true;
        self.nmi_triggered = true;
    }

    /// Sets the level of the (maskable) IRQ line. Mappers and the APU frame
    /// sequencer hold this asserted for as long as their condition persists.
    pub fn set_irq_line(&mut self, level: bool) {
        self.irq_line = level;
    }

    /// Selects how `KIL`/`JAM` opcodes are handled.
    pub fn set_illegal_mode(&mut self, mode: IllegalMode) {
        self.illegal_mode = mode;
    }

    /// Selects which address `BRK` pushes as the return address.
    pub fn set_brk_return_mode(&mut self, mode: BrkReturnMode) {
        self.brk_skip_padding = matches!(mode, BrkReturnMode::PcPlusTwo);
    }

    /// Installs a callback invoked once per CPU cycle (i.e. once per bus
    /// access, including the idle/dummy cycles internal to an instruction).
    /// The bundled `rustynes-core` scheduler does not use this; it advances
    /// PPU/APU in a batch after `step()` returns, using the cycle-count
    /// delta, which is behaviorally equivalent since nothing inside a single
    /// instruction observes intermediate PPU/APU state. This hook exists for
    /// hosts that need true per-cycle interleaving (e.g. a cycle-stepped
    /// debugger).
    pub fn set_cycle_hook(&mut self, hook: impl FnMut() + 'static) {
        self.cycle_hook = Some(Box::new(hook));
    }

    /// Removes any installed cycle hook.
    pub fn clear_cycle_hook(&mut self) {
        self.cycle_hook = None;
    }

    /// Executes exactly one instruction (or services one pending interrupt),
    /// returning the number of cycles consumed.
    ///
    /// # Errors
    ///
    /// Returns [`CpuFault`] the first time a `KIL`/`JAM` opcode is decoded
    /// under [`IllegalMode::Strict`]. After that, the CPU is jammed and
    /// every subsequent call returns `Ok(0)` without touching the bus.
    pub fn step(&mut self, bus: &mut dyn Bus) -> Result<u8, CpuFault> {
        if self.jammed {
            return Ok(0);
        }

        let start_cycles = self.cycles;

        if self.nmi_pending {
            self.nmi_pending = false;
            self.nmi_triggered = false;
            self.service_interrupt(bus, vectors::NMI);
            return Ok((self.cycles - start_cycles) as u8);
        }

        let service_irq = match self.interrupt_delay {
            InterruptDelay::Normal => self.irq_line && !self.status.contains(Status::I),
            InterruptDelay::DelayOneInstruction => {
                self.interrupt_delay = InterruptDelay::FireNextRegardlessOfI;
                false
            }
            InterruptDelay::FireNextRegardlessOfI => {
                self.interrupt_delay = InterruptDelay::Normal;
                self.irq_line
            }
        };
        if service_irq {
            self.service_interrupt(bus, vectors::IRQ);
            return Ok((self.cycles - start_cycles) as u8);
        }

        let fetch_pc = self.pc;
        self.recent_pc[self.recent_pc_idx] = fetch_pc;
        self.recent_pc_idx = (self.recent_pc_idx + 1) % self.recent_pc.len();

        let opcode = self.fetch_opcode(bus);

        if self.illegal_mode == IllegalMode::Strict && is_jam_opcode(opcode) {
            let fault = self.capture_fault(bus, fetch_pc, opcode);
            self.jammed = true;
            return Err(fault);
        }

        let mode = ADDR_MODE_TABLE[opcode as usize];
        self.decode_operand(bus, mode);

        let prev_i = self.status.contains(Status::I);
        OPCODE_TABLE[opcode as usize](self, bus);

        if opcode == 0x40 {
            // RTI: cancel any pending delay if I was restored to 1.
            if self.status.contains(Status::I) {
                self.interrupt_delay = InterruptDelay::Normal;
            }
        } else if prev_i
            && !self.status.contains(Status::I)
            && self.interrupt_delay == InterruptDelay::Normal
        {
            // CLI, or PLP that cleared I.
            self.interrupt_delay = InterruptDelay::DelayOneInstruction;
        }

        Ok((self.cycles - start_cycles) as u8)
    }

    fn capture_fault(&self, bus: &mut dyn Bus, pc: u16, opcode: u8) -> CpuFault {
        let mut bytes = [0u8; 4];
        bytes[0] = opcode;
        for (i, b) in bytes.iter_mut().enumerate().skip(1) {
            *b = bus.read(pc.wrapping_add(i as u16));
        }

        let mut stack_window = [0u8; 8];
        for (i, b) in stack_window.iter_mut().enumerate() {
            let offset = i as i16 - 4;
            let addr = 0x0100u16.wrapping_add(u16::from(self.sp.wrapping_add(offset as u8)));
            *b = bus.read(addr);
        }

        let mut recent_pc = [0u16; 8];
        for (i, slot) in recent_pc.iter_mut().enumerate() {
            *slot = self.recent_pc[(self.recent_pc_idx + i) % self.recent_pc.len()];
        }

        CpuFault { pc, opcode, bytes, stack_window, recent_pc }
    }

    fn service_interrupt(&mut self, bus: &mut dyn Bus, vector: u16) {
        self.tick(bus);
        self.tick(bus);
        self.push_word(bus, self.pc);
        let status_byte = self.status.to_stack_byte(false);
        self.push_byte(bus, status_byte);
        self.status.set_flag(Status::I, true);
        let lo = self.read_byte(bus, vector);
        let hi = self.read_byte(bus, vector.wrapping_add(1));
        self.pc = u16::from_le_bytes([lo, hi]);
    }

    fn decode_operand(&mut self, bus: &mut dyn Bus, mode: AddrMode) {
        match mode {
            AddrMode::Imp | AddrMode::Acc => {
                // Mandatory idle cycle: the bus is driven at PC without
                // consuming a byte.
                self.read_byte(bus, self.pc);
            }
            AddrMode::Imm => {
                self.operand_addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
            }
            AddrMode::Zp0 => {
                self.operand_addr = u16::from(self.fetch_pc_byte(bus));
            }
            AddrMode::Zpx => {
                let base = self.fetch_pc_byte(bus);
                self.read_byte(bus, u16::from(base));
                self.operand_addr = u16::from(base.wrapping_add(self.x));
            }
            AddrMode::Zpy => {
                let base = self.fetch_pc_byte(bus);
                self.read_byte(bus, u16::from(base));
                self.operand_addr = u16::from(base.wrapping_add(self.y));
            }
            AddrMode::Rel => {
                self.operand_value = self.fetch_pc_byte(bus);
            }
            AddrMode::Abs => {
                let lo = self.fetch_pc_byte(bus);
                let hi = self.fetch_pc_byte(bus);
                self.operand_addr = u16::from_le_bytes([lo, hi]);
            }
            AddrMode::Abx | AddrMode::Aby => {
                let lo = self.fetch_pc_byte(bus);
                let hi = self.fetch_pc_byte(bus);
                let base = u16::from_le_bytes([lo, hi]);
                let index = if mode == AddrMode::Abx { self.x } else { self.y };
                let effective = base.wrapping_add(u16::from(index));
                if (base & 0xFF00) != (effective & 0xFF00) {
                    let wrong = (base & 0xFF00) | (effective & 0x00FF);
                    self.read_byte(bus, wrong);
                }
                self.operand_addr = effective;
            }
            AddrMode::AbxW | AddrMode::AbyW => {
                let lo = self.fetch_pc_byte(bus);
                let hi = self.fetch_pc_byte(bus);
                let base = u16::from_le_bytes([lo, hi]);
                let index = if mode == AddrMode::AbxW { self.x } else { self.y };
                let effective = base.wrapping_add(u16::from(index));
                let wrong = (base & 0xFF00) | (effective & 0x00FF);
                self.read_byte(bus, wrong);
                self.operand_addr = effective;
            }
            AddrMode::Ind => {
                let lo = self.fetch_pc_byte(bus);
                let hi = self.fetch_pc_byte(bus);
                let ptr = u16::from_le_bytes([lo, hi]);
                let target_lo = self.read_byte(bus, ptr);
                // JMP (indirect) page-wrap bug: the high byte is fetched
                // from the same page as the pointer, not the next page.
                let ptr_hi_addr = (ptr & 0xFF00) | u16::from((ptr as u8).wrapping_add(1));
                let target_hi = self.read_byte(bus, ptr_hi_addr);
                self.operand_addr = u16::from_le_bytes([target_lo, target_hi]);
            }
            AddrMode::Idx => {
                let base = self.fetch_pc_byte(bus);
                self.read_byte(bus, u16::from(base));
                let ptr = base.wrapping_add(self.x);
                let lo = self.read_byte(bus, u16::from(ptr));
                let hi = self.read_byte(bus, u16::from(ptr.wrapping_add(1)));
                self.operand_addr = u16::from_le_bytes([lo, hi]);
            }
            AddrMode::Idy => {
                let zp = self.fetch_pc_byte(bus);
                let lo = self.read_byte(bus, u16::from(zp));
                let hi = self.read_byte(bus, u16::from(zp.wrapping_add(1)));
                let base = u16::from_le_bytes([lo, hi]);
                let effective = base.wrapping_add(u16::from(self.y));
                if (base & 0xFF00) != (effective & 0xFF00) {
                    let wrong = (base & 0xFF00) | (effective & 0x00FF);
                    self.read_byte(bus, wrong);
                }
                self.operand_addr = effective;
            }
            AddrMode::IdyW => {
                let zp = self.fetch_pc_byte(bus);
                let lo = self.read_byte(bus, u16::from(zp));
                let hi = self.read_byte(bus, u16::from(zp.wrapping_add(1)));
                let base = u16::from_le_bytes([lo, hi]);
                let effective = base.wrapping_add(u16::from(self.y));
                let wrong = (base & 0xFF00) | (effective & 0x00FF);
                self.read_byte(bus, wrong);
                self.operand_addr = effective;
            }
        }
    }

    fn fetch_opcode(&mut self, bus: &mut dyn Bus) -> u8 {
        self.fetch_pc_byte(bus)
    }

    fn fetch_pc_byte(&mut self, bus: &mut dyn Bus) -> u8 {
        let value = self.read_byte(bus, self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    fn account_cycle(&mut self) {
        self.cycles += 1;
        self.prev_run_irq = self.run_irq;
        self.run_irq = self.irq_line && !self.status.contains(Status::I);
        if let Some(hook) = &mut self.cycle_hook {
            hook();
        }
    }

    /// Reads a byte from the bus, consuming one cycle.
    pub(crate) fn read_byte(&mut self, bus: &mut dyn Bus, addr: u16) -> u8 {
        let value = bus.read(addr);
        self.account_cycle();
        value
    }

    /// Writes a byte to the bus, consuming one cycle.
    pub(crate) fn write_byte(&mut self, bus: &mut dyn Bus, addr: u16, value: u8) {
        bus.write(addr, value);
        self.account_cycle();
    }

    /// Consumes one idle bus cycle (the CPU still drives the address bus,
    /// at the current PC, but the byte read is discarded).
    pub(crate) fn tick(&mut self, bus: &mut dyn Bus) {
        bus.read(self.pc);
        self.account_cycle();
    }

    pub(crate) fn push_byte(&mut self, bus: &mut dyn Bus, value: u8) {
        let addr = 0x0100u16 | u16::from(self.sp);
        self.write_byte(bus, addr, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    pub(crate) fn pop_byte(&mut self, bus: &mut dyn Bus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        let addr = 0x0100u16 | u16::from(self.sp);
        self.read_byte(bus, addr)
    }

    pub(crate) fn push_word(&mut self, bus: &mut dyn Bus, value: u16) {
        self.push_byte(bus, (value >> 8) as u8);
        self.push_byte(bus, value as u8);
    }

    pub(crate) fn pop_word(&mut self, bus: &mut dyn Bus) -> u16 {
        let lo = self.pop_byte(bus);
        let hi = self.pop_byte(bus);
        u16::from_le_bytes([lo, hi])
    }

    /// Returns the operand address resolved by the current instruction's
    /// addressing mode.
    #[must_use]
    pub(crate) fn operand_addr(&self) -> u16 {
        self.operand_addr
    }

    pub(crate) fn set_zn(&mut self, value: u8) {
        self.status.set_zn(value);
    }

    /// Accumulator.
    #[must_use]
    pub fn a(&self) -> u8 {
        self.a
    }

    /// X index register.
    #[must_use]
    pub fn x(&self) -> u8 {
        self.x
    }

    /// Y index register.
    #[must_use]
    pub fn y(&self) -> u8 {
        self.y
    }

    /// Program counter.
    #[must_use]
    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Stack pointer.
    #[must_use]
    pub fn sp(&self) -> u8 {
        self.sp
    }

    /// Processor status flags.
    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    /// Total CPU cycles elapsed since construction.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Whether the CPU has permanently halted on a `KIL`/`JAM` opcode under
    /// [`IllegalMode::Strict`].
    #[must_use]
    pub fn jammed(&self) -> bool {
        self.jammed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlatBus {
        mem: [u8; 65536],
    }

    impl FlatBus {
        fn new() -> Self {
            Self { mem: [0; 65536] }
        }

        fn load(&mut self, addr: u16, program: &[u8]) {
            for (i, &b) in program.iter().enumerate() {
                self.mem[addr as usize + i] = b;
            }
        }

        fn with_reset_vector(addr: u16) -> Self {
            let mut bus = Self::new();
            bus.mem[0xFFFC] = addr as u8;
            bus.mem[0xFFFD] = (addr >> 8) as u8;
            bus
        }
    }

    impl Bus for FlatBus {
        fn read(&mut self, addr: u16) -> u8 {
            self.mem[addr as usize]
        }

        fn write(&mut self, addr: u16, value: u8) {
            self.mem[addr as usize] = value;
        }
    }

    #[test]
    fn abx_page_cross_costs_extra_cycle() {
        let mut bus = FlatBus::with_reset_vector(0x8000);
        // LDA $80FF,X with X=1 crosses into page $81.
        bus.load(0x8000, &[0xBD, 0xFF, 0x80]);
        bus.mem[0x8100] = 0x55;
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        cpu.x = 1;
        let cycles = cpu.step(&mut bus).unwrap();
        assert_eq!(cycles, 5);
        assert_eq!(cpu.a(), 0x55);
    }

    #[test]
    fn abx_no_page_cross_is_four_cycles() {
        let mut bus = FlatBus::with_reset_vector(0x8000);
        bus.load(0x8000, &[0xBD, 0x00, 0x80]);
        bus.mem[0x8001] = 0x42;
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        cpu.x = 1;
        let cycles = cpu.step(&mut bus).unwrap();
        assert_eq!(cycles, 4);
        assert_eq!(cpu.a(), 0x42);
    }

    #[test]
    fn absolute_indexed_write_always_pays_extra_cycle() {
        let mut bus = FlatBus::with_reset_vector(0x8000);
        // STA $2000,X (0x9D) never takes the fast path, even without a
        // page cross.
        bus.load(0x8000, &[0x9D, 0x00, 0x20]);
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        cpu.x = 1;
        cpu.a = 0x99;
        let cycles = cpu.step(&mut bus).unwrap();
        assert_eq!(cycles, 5);
        assert_eq!(bus.mem[0x2001], 0x99);
    }

    #[test]
    fn jmp_indirect_page_wrap_bug() {
        let mut bus = FlatBus::with_reset_vector(0x8000);
        bus.load(0x8000, &[0x6C, 0xFF, 0x02]);
        bus.mem[0x02FF] = 0x34;
        bus.mem[0x0200] = 0x12; // wraps within page $02, not $0300
        bus.mem[0x0300] = 0x99;
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        let cycles = cpu.step(&mut bus).unwrap();
        assert_eq!(cycles, 5);
        assert_eq!(cpu.pc(), 0x1234);
    }

    #[test]
    fn nmi_is_serviced_at_next_boundary() {
        let mut bus = FlatBus::with_reset_vector(0x8000);
        bus.load(0x8000, &[0xEA]); // NOP
        bus.mem[0xFFFA] = 0x00;
        bus.mem[0xFFFB] = 0x90;
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        cpu.request_nmi();
        let cycles = cpu.step(&mut bus).unwrap();
        assert_eq!(cycles, 7);
        assert_eq!(cpu.pc(), 0x9000);
    }

    #[test]
    fn cli_delays_irq_by_one_instruction() {
        let mut bus = FlatBus::with_reset_vector(0x8000);
        // SEI, CLI, NOP, NOP
        bus.load(0x8000, &[0x78, 0x58, 0xEA, 0xEA]);
        bus.mem[0xFFFE] = 0x00;
        bus.mem[0xFFFF] = 0xA0;
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        cpu.set_irq_line(true);

        cpu.step(&mut bus).unwrap(); // SEI
        cpu.step(&mut bus).unwrap(); // CLI, arms delay
        assert_eq!(cpu.pc(), 0x8002);

        cpu.step(&mut bus).unwrap(); // first NOP after CLI: IRQ suppressed
        assert_eq!(cpu.pc(), 0x8003);

        cpu.step(&mut bus).unwrap(); // IRQ now serviced instead of the 2nd NOP
        assert_eq!(cpu.pc(), 0xA000);
    }

    #[test]
    fn strict_jam_raises_fault_then_stays_jammed() {
        let mut bus = FlatBus::with_reset_vector(0x8000);
        bus.load(0x8000, &[0x02]); // JAM
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        cpu.set_illegal_mode(IllegalMode::Strict);

        let err = cpu.step(&mut bus).unwrap_err();
        assert_eq!(err.opcode, 0x02);
        assert!(cpu.jammed());

        let cycles = cpu.step(&mut bus).unwrap();
        assert_eq!(cycles, 0);
    }

    #[test]
    fn lenient_jam_loops_forever() {
        let mut bus = FlatBus::with_reset_vector(0x8000);
        bus.load(0x8000, &[0x02]);
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.pc(), 0x8000);
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.pc(), 0x8000);
    }

    #[test]
    fn brk_return_mode_controls_padding_skip() {
        let mut bus = FlatBus::with_reset_vector(0x8000);
        bus.load(0x8000, &[0x00, 0xFF]); // BRK, padding byte
        bus.mem[0xFFFE] = 0x00;
        bus.mem[0xFFFF] = 0x90;
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        cpu.set_brk_return_mode(BrkReturnMode::PcPlusOne);
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.pc(), 0x9000);
        let pushed_pc = u16::from(bus.mem[0x01FD]) << 8 | u16::from(bus.mem[0x01FC]);
        assert_eq!(pushed_pc, 0x8001);
    }

    #[test]
    fn cycle_hook_fires_once_per_cycle() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut bus = FlatBus::with_reset_vector(0x8000);
        bus.load(0x8000, &[0xA9, 0x42]); // LDA #$42, 2 cycles
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);

        let count = Rc::new(Cell::new(0u32));
        let count_clone = count.clone();
        cpu.set_cycle_hook(move || count_clone.set(count_clone.get() + 1));

        cpu.step(&mut bus).unwrap();
        assert_eq!(count.get(), 2);
    }
}
