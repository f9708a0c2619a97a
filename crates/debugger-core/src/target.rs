//! Contract between the debugger and the emulation core it observes.

use std::ops::Range;

use crate::{DebugState, InstructionSet, MemorySpace};

/// Interrupt sources reported in trace events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum InterruptKind {
    /// Non-maskable interrupt.
    Nmi,
    /// Maskable interrupt request.
    Irq,
    /// Reset sequence.
    Reset,
}

impl InterruptKind {
    /// Upper-case label used in trace output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Nmi => "NMI",
            Self::Irq => "IRQ",
            Self::Reset => "RESET",
        }
    }
}

/// Hardware events emitted by the target while it advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceEvent {
    /// Data read on the CPU bus. Opcode and operand fetches are not reported.
    MemoryRead {
        /// CPU address.
        address: u32,
        /// Value observed.
        value: u8,
    },
    /// Write on the CPU bus.
    MemoryWrite {
        /// CPU address.
        address: u32,
        /// Value written.
        value: u8,
    },
    /// Write that landed on a memory-mapped hardware register.
    RegisterWrite {
        /// CPU address of the register.
        address: u32,
        /// Value written.
        value: u8,
    },
    /// Interrupt handler entry.
    Interrupt {
        /// Interrupt source.
        kind: InterruptKind,
        /// Program counter pushed as the return address.
        return_address: u32,
        /// Handler address loaded from the vector.
        handler: u32,
    },
}

/// Sink for target events, fed in execution order.
pub trait TraceSink {
    /// Records an event in execution order.
    fn on_event(&mut self, event: TraceEvent);
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn on_event(&mut self, _event: TraceEvent) {}
}

impl TraceSink for Vec<TraceEvent> {
    fn on_event(&mut self, event: TraceEvent) {
        self.push(event);
    }
}

/// Result of asking the target to execute one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepOutcome {
    /// The instruction at `pc` retired after `cycles` CPU cycles.
    Retired {
        /// Address of the retired instruction.
        pc: u32,
        /// CPU cycles consumed, including hardware time charged alongside it.
        cycles: u16,
    },
    /// The CPU cannot make progress past `pc`.
    Jammed {
        /// Address of the opcode that jammed the CPU.
        pc: u32,
    },
}

/// Emulation core observed and driven by a [`crate::Debugger`].
pub trait DebugTarget: Sized + 'static {
    /// Addressing-mode table for the CPU's instruction set.
    fn instruction_set(&self) -> &'static dyn InstructionSet;

    /// Address of the next instruction to execute.
    fn program_counter(&self) -> u32;

    /// CPU address range disassembled by default.
    fn code_range(&self) -> Range<u32>;

    /// Returns `true` when code can execute from the CPU address.
    fn is_executable(&self, address: u32) -> bool;

    /// Calls `visit` with every CPU address that shows the same byte as
    /// `address`, `address` itself included.
    ///
    /// Targets with mirrored memory override this so a patch through one
    /// mirror invalidates the disassembly of all the others.
    fn code_aliases(&self, address: u32, visit: &mut dyn FnMut(u32)) {
        visit(address);
    }

    /// Enters any pending interrupt handler before the next instruction.
    fn service_interrupts(&mut self, sink: &mut dyn TraceSink);

    /// Executes exactly one instruction and advances dependent hardware.
    fn execute_instruction(&mut self, sink: &mut dyn TraceSink) -> StepOutcome;

    /// Current machine snapshot.
    fn debug_state(&self) -> DebugState;

    /// Memory spaces exposed to the memory dumper.
    fn memory_spaces(&self) -> &'static [MemorySpace<Self>];
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::{DebugTarget, InterruptKind, NullSink, TraceEvent, TraceSink};
    use crate::machine::ReferenceMachine;

    fn erase<T: DebugTarget>(target: T) -> Box<dyn Any> {
        Box::new(target)
    }

    #[test]
    fn vec_sink_preserves_event_order() {
        let mut sink = Vec::new();
        sink.on_event(TraceEvent::MemoryWrite {
            address: 0x10,
            value: 1,
        });
        sink.on_event(TraceEvent::MemoryRead {
            address: 0x11,
            value: 2,
        });
        assert_eq!(
            sink,
            vec![
                TraceEvent::MemoryWrite {
                    address: 0x10,
                    value: 1
                },
                TraceEvent::MemoryRead {
                    address: 0x11,
                    value: 2
                },
            ]
        );
        NullSink.on_event(sink[0]);
    }

    #[test]
    fn targets_can_be_type_erased() {
        let erased = erase(ReferenceMachine::with_program(&[0xEA]));
        let machine = erased.downcast_ref::<ReferenceMachine>().unwrap();
        assert_eq!(machine.program_counter(), 0x8000);
    }

    #[test]
    fn interrupt_labels_are_upper_case() {
        assert_eq!(InterruptKind::Nmi.label(), "NMI");
        assert_eq!(InterruptKind::Reset.label(), "RESET");
    }
}
