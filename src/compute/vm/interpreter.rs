//! Instruction interpreter with call frames and a tick budget.

use std::collections::BTreeMap;

use crate::schema::VmOptions;

use super::opcode::{Opcode, function_letter, scan_functions};
use super::{
    ExitStatus, FUNCTION_MEMORY_SIZE, Fault, MAX_CALL_DEPTH, MEMORY_SIZE, WORK_LIMIT_FACTOR,
    function_memory_start,
};

/// Input callback, invoked by `,` in the main program.
pub type InputFn<'a> = Box<dyn FnMut() -> u8 + 'a>;

/// Output callback, invoked by `.`.
pub type OutputFn<'a> = Box<dyn FnMut(u8) + 'a>;

/// Function call notification, invoked with the called letter.
pub type CallFn<'a> = Box<dyn FnMut(char) + 'a>;

/// Caller context saved on function entry.
#[derive(Debug)]
struct CallFrame {
    ip: usize,
    dp: isize,
    loop_stack: Vec<usize>,
    skip: Option<usize>,
    ticks: u32,
    storage: u8,
    return_value: Option<u8>,
    input_cursor: isize,
}

/// What the main loop does after an instruction.
enum Flow {
    Next,
    Jump(usize),
    Halt,
}

/// A single-use BrainPlus interpreter.
///
/// Each instance owns its memory; instances share nothing.
pub struct Interpreter<'a> {
    program: Vec<Opcode>,
    /// Body offset per function letter.
    functions: Vec<usize>,
    memory: Vec<u8>,
    ip: usize,
    dp: isize,
    loop_stack: Vec<usize>,
    /// Position of the `[` whose body is being skipped.
    skip: Option<usize>,
    frames: Vec<CallFrame>,
    ticks: u32,
    executed: u64,
    storage: u8,
    return_value: Option<u8>,
    /// Read position in the caller's memory for `,` inside a function.
    input_cursor: isize,
    options: VmOptions,
    executed_functions: BTreeMap<char, u32>,
    input: InputFn<'a>,
    output: OutputFn<'a>,
    on_call: Option<CallFn<'a>>,
}

impl<'a> Interpreter<'a> {
    /// Create an interpreter for `source`.
    ///
    /// Function bodies are located once here.
    pub fn new(
        source: &str,
        input: impl FnMut() -> u8 + 'a,
        output: impl FnMut(u8) + 'a,
        options: VmOptions,
    ) -> Self {
        let program = Opcode::decode_source(source);
        let functions = scan_functions(&program);

        Self {
            program,
            functions,
            memory: vec![0; MEMORY_SIZE],
            ip: 0,
            dp: 0,
            loop_stack: Vec::new(),
            skip: None,
            frames: Vec::new(),
            ticks: 0,
            executed: 0,
            storage: 0,
            return_value: None,
            input_cursor: 0,
            options,
            executed_functions: BTreeMap::new(),
            input: Box::new(input),
            output: Box::new(output),
            on_call: None,
        }
    }

    /// Register a callback fired on every function call.
    pub fn on_function_call(mut self, callback: impl FnMut(char) + 'a) -> Self {
        self.on_call = Some(Box::new(callback));
        self
    }

    /// Run until the program ends, halts, faults or exhausts the budget.
    ///
    /// `max_instructions == 0` runs without a budget. Inside a function an
    /// exhausted budget forces a return and the caller continues.
    pub fn run(&mut self, max_instructions: u32) -> Result<ExitStatus, Fault> {
        self.ticks = 0;
        let work_limit = max_instructions as u64 * WORK_LIMIT_FACTOR;

        loop {
            if self.ip >= self.program.len() {
                return Ok(ExitStatus::Completed);
            }

            if max_instructions > 0 {
                if self.executed >= work_limit {
                    return Ok(ExitStatus::BudgetExhausted);
                }
                if self.ticks >= max_instructions {
                    if self.frames.is_empty() {
                        return Ok(ExitStatus::BudgetExhausted);
                    }
                    self.ip = self.return_from_function();
                    self.ticks = self.ticks.saturating_add(1);
                    continue;
                }
            }

            let op = self.program[self.ip];
            let flow = self.execute(op)?;
            self.ticks = self.ticks.saturating_add(1);
            self.executed += 1;

            match flow {
                Flow::Next => self.ip += 1,
                Flow::Jump(target) => self.ip = target,
                Flow::Halt => return Ok(ExitStatus::Halted),
            }
        }
    }

    /// Instructions counted against the budget of the active frame.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Full VM memory.
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn data_pointer(&self) -> isize {
        self.dp
    }

    pub fn instruction_pointer(&self) -> usize {
        self.ip
    }

    /// Global storage register.
    pub fn storage(&self) -> u8 {
        self.storage
    }

    /// Number of functions defined in the source.
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Calls made from the main program, per function letter.
    pub fn executed_functions(&self) -> &BTreeMap<char, u32> {
        &self.executed_functions
    }

    /// Consume the interpreter, keeping the call histogram.
    pub fn into_executed_functions(self) -> BTreeMap<char, u32> {
        self.executed_functions
    }

    fn execute(&mut self, op: Opcode) -> Result<Flow, Fault> {
        if let Some(skip_from) = self.skip {
            // Only bracket nesting and returns are tracked while skipping
            match op {
                Opcode::LoopStart => self.loop_stack.push(self.ip),
                Opcode::LoopEnd => {
                    let start = self.pop_loop()?;
                    if start == skip_from {
                        self.skip = None;
                    }
                }
                Opcode::Return => return Ok(self.return_or_halt()),
                _ => {}
            }
            return Ok(Flow::Next);
        }

        match op {
            Opcode::IncPtr => self.dp += 1,
            Opcode::DecPtr => self.dp -= 1,
            Opcode::Inc => {
                let cell = self.cell_mut()?;
                *cell = cell.wrapping_add(1);
            }
            Opcode::Dec => {
                let cell = self.cell_mut()?;
                *cell = cell.wrapping_sub(1);
            }
            Opcode::Output => {
                let value = self.cell()?;
                (self.output)(value);
            }
            Opcode::Input => {
                let value = if self.frames.is_empty() {
                    (self.input)()
                } else {
                    let value = self.read(self.input_cursor)?;
                    self.input_cursor += 1;
                    value
                };
                *self.cell_mut()? = value;
            }
            Opcode::LoopStart => {
                if self.cell()? == 0 {
                    self.skip = Some(self.ip);
                }
                self.loop_stack.push(self.ip);
            }
            Opcode::LoopEnd => {
                let start = self.pop_loop()?;
                if self.cell()? != 0 {
                    return Ok(Flow::Jump(start));
                }
            }
            Opcode::Return => return Ok(self.return_or_halt()),
            Opcode::Store => {
                let value = self.cell()?;
                let returns_next = self.program.get(self.ip + 1) == Some(&Opcode::Return);
                if !self.frames.is_empty() && returns_next {
                    self.return_value = Some(value);
                } else {
                    self.storage = value;
                }
            }
            Opcode::Recall => *self.cell_mut()? = self.storage,
            Opcode::ReturnValue => self.return_value = Some(self.cell()?),
            Opcode::SetConst(value) => *self.cell_mut()? = value,
            Opcode::Call(index) => return self.call(index),
            Opcode::Nop => {}
        }

        Ok(Flow::Next)
    }

    fn call(&mut self, index: u8) -> Result<Flow, Fault> {
        let letter = function_letter(index);
        let body = *self
            .functions
            .get(index as usize)
            .ok_or(Fault::UndefinedFunction { letter })?;

        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(Fault::CallDepthExceeded);
        }

        if self.frames.is_empty() {
            *self.executed_functions.entry(letter).or_insert(0) += 1;
        }
        if let Some(on_call) = self.on_call.as_mut() {
            on_call(letter);
        }

        self.frames.push(CallFrame {
            ip: self.ip,
            dp: self.dp,
            loop_stack: std::mem::take(&mut self.loop_stack),
            skip: self.skip.take(),
            ticks: self.ticks,
            storage: self.storage,
            return_value: self.return_value.take(),
            input_cursor: self.input_cursor,
        });

        self.storage = 0;
        self.input_cursor = if self.options.read_function_input_at_start {
            0
        } else {
            self.dp
        };

        let start = function_memory_start(index);
        self.memory[start..start + FUNCTION_MEMORY_SIZE].fill(0);
        self.dp = start as isize;
        // Incremented to 1 by the main loop
        self.ticks = 0;

        Ok(Flow::Jump(body))
    }

    fn return_or_halt(&mut self) -> Flow {
        if self.frames.is_empty() {
            Flow::Halt
        } else {
            Flow::Jump(self.return_from_function())
        }
    }

    /// Restore the caller and return the instruction after the call site.
    fn return_from_function(&mut self) -> usize {
        let Some(frame) = self.frames.pop() else {
            return self.ip + 1;
        };

        self.dp = frame.dp;
        self.loop_stack = frame.loop_stack;
        self.skip = frame.skip;
        self.ticks = frame.ticks;
        self.storage = self.return_value.unwrap_or(frame.storage);
        self.return_value = frame.return_value;
        self.input_cursor = frame.input_cursor;

        frame.ip + 1
    }

    fn pop_loop(&mut self) -> Result<usize, Fault> {
        self.loop_stack
            .pop()
            .ok_or(Fault::UnbalancedLoop { position: self.ip })
    }

    #[inline]
    fn read(&self, address: isize) -> Result<u8, Fault> {
        usize::try_from(address)
            .ok()
            .and_then(|a| self.memory.get(a).copied())
            .ok_or(Fault::MemoryOutOfBounds { address })
    }

    #[inline]
    fn cell(&self) -> Result<u8, Fault> {
        self.read(self.dp)
    }

    #[inline]
    fn cell_mut(&mut self) -> Result<&mut u8, Fault> {
        let address = self.dp;
        usize::try_from(address)
            .ok()
            .and_then(|a| self.memory.get_mut(a))
            .ok_or(Fault::MemoryOutOfBounds { address })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Run `source` with a fixed input sequence, returning status, output and ticks.
    fn run_program(
        source: &str,
        input: &[u8],
        max_instructions: u32,
    ) -> (Result<ExitStatus, Fault>, Vec<u8>, u32) {
        let mut inputs = input.iter().copied();
        let mut output = Vec::new();
        let (result, ticks) = {
            let mut vm = Interpreter::new(
                source,
                move || inputs.next().unwrap_or(0),
                |b| output.push(b),
                VmOptions::default(),
            );
            let result = vm.run(max_instructions);
            (result, vm.ticks())
        };
        (result, output, ticks)
    }

    #[test]
    fn test_hello_cells() {
        let (result, output, _) = run_program("++++++++[>++++++++<-]>+.+.", &[], 10_000);
        assert_eq!(result, Ok(ExitStatus::Completed));
        assert_eq!(output, b"AB");
    }

    #[test]
    fn test_zero_input_skips_loop() {
        let (result, output, _) = run_program(",[-].", &[0], 10_000);
        assert_eq!(result, Ok(ExitStatus::Completed));
        assert_eq!(output, vec![0]);
    }

    #[test]
    fn test_nested_skip() {
        // Outer loop skipped; inner brackets must not end skip mode early
        let (result, output, _) = run_program("[+[+]+.]+.", &[], 10_000);
        assert_eq!(result, Ok(ExitStatus::Completed));
        assert_eq!(output, vec![1]);
    }

    #[test]
    fn test_wrapping_cells() {
        let (_, output, _) = run_program("-.+.", &[], 100);
        assert_eq!(output, vec![255, 0]);
    }

    #[test]
    fn test_constants_and_storage() {
        let (_, output, _) = run_program("4+$0.!.", &[], 100);
        assert_eq!(output, vec![0, 65]);
    }

    #[test]
    fn test_unbalanced_loop_faults() {
        let (result, output, _) = run_program("+.]", &[], 100);
        assert_eq!(result, Err(Fault::UnbalancedLoop { position: 2 }));
        assert_eq!(output, vec![1]);
    }

    #[test]
    fn test_undefined_function_faults() {
        let (result, _, _) = run_program("+b", &[], 100);
        assert_eq!(result, Err(Fault::UndefinedFunction { letter: 'b' }));
    }

    #[test]
    fn test_negative_pointer_faults_on_access() {
        // Moving below zero is fine; touching the cell is not
        let (result, _, _) = run_program("<>+.", &[], 100);
        assert_eq!(result, Ok(ExitStatus::Completed));

        let (result, _, _) = run_program("<+", &[], 100);
        assert_eq!(result, Err(Fault::MemoryOutOfBounds { address: -1 }));
    }

    #[test]
    fn test_infinite_loop_stops_at_budget() {
        let (result, _, ticks) = run_program("+[]", &[], 1000);
        assert_eq!(result, Ok(ExitStatus::BudgetExhausted));
        assert_eq!(ticks, 1000);
    }

    #[test]
    fn test_top_level_separator_halts() {
        let (result, output, _) = run_program("+.@+.", &[], 100);
        assert_eq!(result, Ok(ExitStatus::Halted));
        assert_eq!(output, vec![1]);
    }

    #[test]
    fn test_function_return_through_storage() {
        let mut vm = Interpreter::new("a!@+++++$@", || 0, |_| {}, VmOptions::default());
        assert_eq!(vm.run(1000), Ok(ExitStatus::Halted));

        let memory = vm.memory();
        assert_eq!(memory[0], 5);
        assert!(memory[1..FUNCTION_MEMORY_SIZE].iter().all(|&c| c == 0));
        assert_eq!(vm.data_pointer(), 0);
        // Halted on the main program's separator
        assert_eq!(vm.instruction_pointer(), 2);
        assert_eq!(vm.executed_functions().get(&'a'), Some(&1));
    }

    #[test]
    fn test_function_memory_isolated() {
        // Function writes five into its own slice without a return value
        let mut vm = Interpreter::new(">+<a@>+++++@", || 0, |_| {}, VmOptions::default());
        assert_eq!(vm.run(1000), Ok(ExitStatus::Halted));

        let memory = vm.memory();
        assert_eq!(&memory[0..3], &[0, 1, 0]);
        assert_eq!(memory[function_memory_start(0) + 1], 5);
        assert_eq!(vm.storage(), 0);
    }

    #[test]
    fn test_function_reads_caller_memory() {
        let source = "++>++++>+<<a!.@,>,-[-<+>]<+$@";
        let mut output = Vec::new();
        let options = VmOptions {
            read_function_input_at_start: true,
        };
        let mut vm = Interpreter::new(source, || 0, |b| output.push(b), options);
        assert_eq!(vm.run(1000), Ok(ExitStatus::Halted));
        assert_eq!(&vm.memory()[0..3], &[6, 4, 1]);
        drop(vm);
        assert_eq!(output, vec![6]);
    }

    #[test]
    fn test_function_input_starts_at_data_pointer() {
        // Cursor starts at the caller's cell 1, so the function sees 4 then 1
        let source = "++>++++>+<a!.@,>,[-<+>]<$@";
        let mut output = Vec::new();
        let mut vm = Interpreter::new(source, || 0, |b| output.push(b), VmOptions::default());
        assert_eq!(vm.run(1000), Ok(ExitStatus::Halted));
        drop(vm);
        assert_eq!(output, vec![5]);
    }

    #[test]
    fn test_budget_forces_function_return() {
        let (result, output, _) = run_program("a.@+[]", &[], 1000);
        assert_eq!(result, Ok(ExitStatus::Halted));
        assert_eq!(output, vec![0]);
    }

    #[test]
    fn test_return_value_instruction() {
        let (result, output, _) = run_program("a!.@+++*@", &[], 1000);
        assert_eq!(result, Ok(ExitStatus::Halted));
        assert_eq!(output, vec![3]);
    }

    #[test]
    fn test_separator_returns_while_skipping() {
        // Loop is skipped in `a`; the separator inside it still returns
        let (result, output, _) = run_program("a!.@[+*@]+++@", &[], 1000);
        assert_eq!(result, Ok(ExitStatus::Halted));
        assert_eq!(output, vec![0]);
    }

    #[test]
    fn test_work_cap_stops_nested_calls() {
        // Every level loops on a call to the next; the innermost never ends
        let source = "a@+[b]@+[c]@+[d]@+[]";
        let mut vm = Interpreter::new(source, || 0, |_| {}, VmOptions::default());
        assert_eq!(vm.run(100), Ok(ExitStatus::BudgetExhausted));
        // Stopped inside a function: ticks belong to that frame
        assert!(vm.data_pointer() >= FUNCTION_MEMORY_SIZE as isize);
        assert!(vm.ticks() <= 100);
    }

    #[test]
    fn test_runaway_recursion_faults() {
        let (result, _, _) = run_program("a@a", &[], 1000);
        assert_eq!(result, Err(Fault::CallDepthExceeded));
    }

    #[test]
    fn test_call_notifications() {
        let calls = RefCell::new(Vec::new());
        let mut vm = Interpreter::new("aba@b@+@", || 0, |_| {}, VmOptions::default())
            .on_function_call(|c| calls.borrow_mut().push(c));
        assert_eq!(vm.run(1000), Ok(ExitStatus::Halted));
        // Nested call from `a` is notified but not counted in the histogram
        assert_eq!(vm.executed_functions().get(&'a'), Some(&2));
        assert_eq!(vm.executed_functions().get(&'b'), Some(&1));
        drop(vm);
        assert_eq!(calls.into_inner(), vec!['a', 'b', 'b', 'a', 'b']);
    }

    #[test]
    fn test_unlimited_run() {
        let (result, output, ticks) = run_program("++++++++[>++++++++<-]>.", &[], 0);
        assert_eq!(result, Ok(ExitStatus::Completed));
        assert_eq!(output, vec![64]);
        assert!(ticks > 100);
    }

    #[test]
    fn test_deterministic_across_instances() {
        let source = ",>,[-<+>]<.[>+<-]+[]";
        let first = run_program(source, &[7, 9], 500);
        let second = run_program(source, &[7, 9], 500);
        assert_eq!(first, second);
        assert_eq!(first.1, vec![16]);
    }
}
