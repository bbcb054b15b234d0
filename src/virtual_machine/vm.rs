//! Core virtual machine implementation.
//!
//! The VM runs a fetch-decode-execute loop over a caller-owned memory buffer.
//! Each step reads the instruction word at the instruction pointer, decodes
//! the opcode and parameter modes, resolves the operands, executes the
//! handler and advances the pointer unless the handler jumped. Arithmetic
//! uses wrapping semantics to prevent overflow panics.
//!
//! Execution stops when the program halts, faults, or executes `store` with
//! nothing to read. The last case is a suspension: the instruction pointer
//! stays on the `store` and a later [`Vm::run`] picks up from there.

mod memory;
mod trace;


pub use memory::Memory;
pub use trace::Instruction;

use crate::virtual_machine::errors::{Fault, VMError};
use crate::virtual_machine::io::{ChannelInput, Input, Output};
use crate::virtual_machine::isa::{Opcode, split_word};
use crate::virtual_machine::operand::{self, Operand};
use crate::{debug, trace};

/// Why [`Vm::run`] returned without faulting.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Exit {
    /// Opcode 99 was executed; the VM will not run again.
    Halted,
    /// A `store` found its input empty; run again once input is available.
    AwaitingInput,
}

/// Result of executing a single instruction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Step {
    Executed,
    Halted,
    AwaitingInput,
}

/// What a handler asks the run loop to do with the instruction pointer.
enum Control {
    Advance,
    Jump(usize),
    Await,
    Halt,
}

#[derive(Clone, Debug)]
enum Status {
    Running,
    Halted,
    Faulted(VMError),
}

/// Intcode virtual machine.
///
/// Borrows the program memory for its whole life and owns its input and
/// output endpoints. Pass `&mut` queues to keep access to them from outside.
pub struct Vm<'m, I, O> {
    memory: Memory<'m>,
    /// Instruction pointer.
    ip: usize,
    input: I,
    output: O,
    /// Executed instructions, oldest first.
    trace: Vec<Instruction>,
    status: Status,
    steps: usize,
}

impl<'m, I: Input, O: Output> Vm<'m, I, O> {
    /// Creates a VM over `memory` starting at address 0.
    pub fn new(memory: &'m mut [i64], input: I, output: O) -> Self {
        Self {
            memory: Memory::new(memory),
            ip: 0,
            input,
            output,
            trace: Vec::new(),
            status: Status::Running,
            steps: 0,
        }
    }

    /// Starts execution at `position` instead of 0.
    pub fn with_start(mut self, position: usize) -> Self {
        self.ip = position;
        self
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn memory(&self) -> &[i64] {
        self.memory.as_slice()
    }

    pub fn trace(&self) -> &[Instruction] {
        &self.trace
    }

    /// Number of instructions executed so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.status, Status::Halted)
    }

    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    /// Releases the memory borrow and returns the endpoints and the trace.
    pub fn into_parts(self) -> (I, O, Vec<Instruction>) {
        (self.input, self.output, self.trace)
    }

    /// Runs until the program halts or waits for input.
    pub fn run(&mut self) -> Result<Exit, Fault> {
        self.run_limited(None)
    }

    /// Like [`Vm::run`], but faults with [`VMError::StepLimitExceeded`] once
    /// `limit` instructions have been executed in total.
    pub fn run_limited(&mut self, limit: Option<usize>) -> Result<Exit, Fault> {
        loop {
            if let Some(limit) = limit
                && self.steps >= limit
                && !self.is_halted()
            {
                return Err(self.fault(VMError::StepLimitExceeded { limit }));
            }
            match self.step()? {
                Step::Executed => continue,
                Step::Halted => return Ok(Exit::Halted),
                Step::AwaitingInput => return Ok(Exit::AwaitingInput),
            }
        }
    }

    /// Executes one instruction.
    ///
    /// A halted VM keeps reporting [`Step::Halted`]; a faulted VM keeps
    /// returning its fault.
    pub fn step(&mut self) -> Result<Step, Fault> {
        match &self.status {
            Status::Running => {}
            Status::Halted => return Ok(Step::Halted),
            Status::Faulted(error) => return Err(Fault::new(error.clone(), self.trace.clone())),
        }
        match self.execute() {
            Ok(step) => Ok(step),
            Err(error) => Err(self.fault(error)),
        }
    }

    /// Marks the VM as faulted and pairs `error` with the trace so far.
    fn fault(&mut self, error: VMError) -> Fault {
        self.status = Status::Faulted(error.clone());
        Fault::new(error, self.trace.clone())
    }

    fn execute(&mut self) -> Result<Step, VMError> {
        let position = self.ip;
        let word = self.memory.read(position, position)?;
        let (code, mode) = split_word(word);
        let opcode = Opcode::try_from(code)
            .map_err(|_| VMError::UnknownOpcode { opcode: code, position })?;
        let operands = operand::resolve(
            &self.memory,
            position,
            position + 1,
            mode,
            opcode.param_count(),
        )?;

        let (control, detail) = self.dispatch(opcode, position, &operands)?;
        match control {
            Control::Await => {
                debug!("{} at {position} waiting for input", opcode.mnemonic());
                return Ok(Step::AwaitingInput);
            }
            Control::Jump(target) => self.ip = target,
            Control::Advance | Control::Halt => self.ip = position + 1 + opcode.param_count(),
        }

        let instruction = Instruction {
            position,
            opcode: code,
            mode,
            mnemonic: opcode.mnemonic(),
            detail,
        };
        trace!("{instruction}");
        self.trace.push(instruction);
        self.steps += 1;

        if let Control::Halt = control {
            debug!("halted at {position} after {} instructions", self.steps);
            self.status = Status::Halted;
            return Ok(Step::Halted);
        }
        Ok(Step::Executed)
    }

    fn dispatch(
        &mut self,
        opcode: Opcode,
        position: usize,
        ops: &[Operand],
    ) -> Result<(Control, String), VMError> {
        match opcode {
            Opcode::Add => self.op_add(position, &ops[0], &ops[1], &ops[2]),
            Opcode::Multiply => self.op_multiply(position, &ops[0], &ops[1], &ops[2]),
            Opcode::Store => self.op_store(position, &ops[0]),
            Opcode::Output => self.op_output(&ops[0]),
            Opcode::JumpIfTrue => self.op_jump_if(position, true, &ops[0], &ops[1]),
            Opcode::JumpIfFalse => self.op_jump_if(position, false, &ops[0], &ops[1]),
            Opcode::LessThan => self.op_less_than(position, &ops[0], &ops[1], &ops[2]),
            Opcode::Equals => self.op_equals(position, &ops[0], &ops[1], &ops[2]),
            Opcode::Halt => Ok((Control::Halt, String::new())),
        }
    }

    /// Writes `value` through the write-target operand `dst`.
    fn write(&mut self, position: usize, dst: &Operand, value: i64) -> Result<usize, VMError> {
        let address = dst.target(position)?;
        self.memory.write(address, value, position)?;
        Ok(address)
    }

    fn op_add(
        &mut self,
        position: usize,
        a: &Operand,
        b: &Operand,
        dst: &Operand,
    ) -> Result<(Control, String), VMError> {
        let result = a.value().wrapping_add(b.value());
        let address = self.write(position, dst, result)?;
        Ok((Control::Advance, format!("{a} + {b} = {result} -> @{address}")))
    }

    fn op_multiply(
        &mut self,
        position: usize,
        a: &Operand,
        b: &Operand,
        dst: &Operand,
    ) -> Result<(Control, String), VMError> {
        let result = a.value().wrapping_mul(b.value());
        let address = self.write(position, dst, result)?;
        Ok((Control::Advance, format!("{a} * {b} = {result} -> @{address}")))
    }

    fn op_store(&mut self, position: usize, dst: &Operand) -> Result<(Control, String), VMError> {
        // Reject a bad target before consuming input.
        dst.target(position)?;
        let Some(value) = self.input.pop() else {
            return Ok((Control::Await, String::new()));
        };
        let address = self.write(position, dst, value)?;
        Ok((Control::Advance, format!("input {value} -> @{address}")))
    }

    fn op_output(&mut self, a: &Operand) -> Result<(Control, String), VMError> {
        self.output.push(a.value());
        Ok((Control::Advance, format!("{a} -> output")))
    }

    fn op_jump_if(
        &mut self,
        position: usize,
        expect: bool,
        cond: &Operand,
        target: &Operand,
    ) -> Result<(Control, String), VMError> {
        let truthy = cond.value() != 0;
        let test = if truthy { "!= 0" } else { "== 0" };
        if truthy != expect {
            return Ok((Control::Advance, format!("{cond} {test}, no jump")));
        }
        let address = self.memory.address(target.value(), position)?;
        Ok((
            Control::Jump(address),
            format!("{cond} {test}, jump to {target}"),
        ))
    }

    fn op_less_than(
        &mut self,
        position: usize,
        a: &Operand,
        b: &Operand,
        dst: &Operand,
    ) -> Result<(Control, String), VMError> {
        let result = i64::from(a.value() < b.value());
        let address = self.write(position, dst, result)?;
        Ok((Control::Advance, format!("{a} < {b} = {result} -> @{address}")))
    }

    fn op_equals(
        &mut self,
        position: usize,
        a: &Operand,
        b: &Operand,
        dst: &Operand,
    ) -> Result<(Control, String), VMError> {
        let result = i64::from(a.value() == b.value());
        let address = self.write(position, dst, result)?;
        Ok((Control::Advance, format!("{a} == {b} = {result} -> @{address}")))
    }
}

impl<'m, O: Output> Vm<'m, ChannelInput, O> {
    /// Runs a piped instance to completion.
    ///
    /// Each suspension on `store` parks the task until the upstream channel
    /// has a value, letting other instances on the same scheduler make
    /// progress. Faults with [`VMError::InputClosed`] when input is needed
    /// but every producer is gone.
    pub async fn run_async(&mut self) -> Result<(), Fault> {
        loop {
            match self.run()? {
                Exit::Halted => return Ok(()),
                Exit::AwaitingInput => {
                    if !self.input.ready().await {
                        return Err(self.fault(VMError::InputClosed { position: self.ip }));
                    }
                }
            }
        }
    }
}

/// Runs `memory` from `start` until it halts and returns the trace.
///
/// `memory` is modified in place and `output` keeps every value pushed. This
/// is the single-shot entry point: nothing else can feed `input`, so running
/// out of input is a [`VMError::InputExhausted`] fault.
pub fn run<I: Input, O: Output>(
    memory: &mut [i64],
    start: usize,
    input: I,
    output: O,
) -> Result<Vec<Instruction>, Fault> {
    run_limited(memory, start, input, output, None)
}

/// [`run`] with an optional cap on the number of executed instructions.
pub fn run_limited<I: Input, O: Output>(
    memory: &mut [i64],
    start: usize,
    input: I,
    output: O,
    limit: Option<usize>,
) -> Result<Vec<Instruction>, Fault> {
    let mut vm = Vm::new(memory, input, output).with_start(start);
    match vm.run_limited(limit)? {
        Exit::Halted => Ok(vm.into_parts().2),
        Exit::AwaitingInput => {
            let position = vm.ip();
            Err(vm.fault(VMError::InputExhausted { position }))
        }
    }
}
