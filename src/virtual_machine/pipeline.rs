//! Multi-instance pipelines.
//!
//! A [`Pipeline`] wires several VM instances output-to-input with unbounded
//! channels. Stage *i*'s output channel is stage *i+1*'s input channel; in
//! feedback mode the last stage feeds the first one again. Each stage runs as
//! a task on the current tokio runtime and parks on `store` until its
//! upstream produces a value, so a current-thread runtime multiplexes all
//! stages cooperatively on one thread.
//!
//! The pipeline finishes once every stage has halted or faulted.

use crate::debug;
use crate::virtual_machine::errors::{Fault, VMError};
use crate::virtual_machine::io::{ChannelInput, Output};
use crate::virtual_machine::vm::{Instruction, Vm};
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tokio::task::JoinError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline has no stages")]
    Empty,
    #[error("stage {stage} faulted: {fault}")]
    Stage {
        stage: usize,
        #[source]
        fault: Fault,
    },
    #[error("stage {stage} task failed: {source}")]
    Join {
        stage: usize,
        #[source]
        source: JoinError,
    },
    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// One VM instance of a pipeline.
#[derive(Clone, Debug)]
pub struct Stage {
    program: Vec<i64>,
    /// Values queued on the stage's input before anything runs.
    seed: Vec<i64>,
    start: usize,
}

impl Stage {
    pub fn new(program: Vec<i64>, seed: Vec<i64>) -> Self {
        Self {
            program,
            seed,
            start: 0,
        }
    }

    pub fn with_start(mut self, position: usize) -> Self {
        self.start = position;
        self
    }
}

/// Everything a finished pipeline leaves behind.
#[derive(Debug, Default)]
pub struct PipelineOutput {
    /// Contents of the result queue: the last stage's output, or in feedback
    /// mode whatever the last stage sent back to the halted first stage.
    pub values: Vec<i64>,
    /// Per-stage instruction traces, in stage order.
    pub traces: Vec<Vec<Instruction>>,
    /// Per-stage final memory, in stage order.
    pub memories: Vec<Vec<i64>>,
}

impl PipelineOutput {
    /// Returns the last value of the result queue.
    pub fn last(&self) -> Option<i64> {
        self.values.last().copied()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
    signal: Vec<i64>,
    feedback: bool,
}

/// What a stage task hands back when it ends.
struct StageReport {
    result: Result<Vec<Instruction>, Fault>,
    /// Kept undrained: upstream stages may still be sending.
    input: ChannelInput,
    memory: Vec<i64>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an amplifier chain: one stage per phase setting, each running
    /// its own copy of `program` with the phase as its first input.
    pub fn amplifiers(program: &[i64], phases: &[i64]) -> Self {
        phases.iter().fold(Self::new(), |pipeline, &phase| {
            pipeline.stage(Stage::new(program.to_vec(), vec![phase]))
        })
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Values queued on the first stage's input after its seed.
    pub fn signal(mut self, values: impl IntoIterator<Item = i64>) -> Self {
        self.signal.extend(values);
        self
    }

    /// Wires the last stage's output back into the first stage's input.
    pub fn feedback(mut self, enabled: bool) -> Self {
        self.feedback = enabled;
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs every stage to completion on the current runtime.
    ///
    /// If several stages fault, the first one in stage order whose error is
    /// not a closed input is reported, since closed inputs are usually the
    /// knock-on effect of another stage going down.
    pub async fn run(self) -> Result<PipelineOutput, PipelineError> {
        if self.stages.is_empty() {
            return Err(PipelineError::Empty);
        }
        let count = self.stages.len();

        let mut senders = Vec::with_capacity(count);
        let mut inputs = Vec::with_capacity(count);
        for stage in &self.stages {
            let (mut tx, rx) = unbounded_channel::<i64>();
            for &value in &stage.seed {
                tx.push(value);
            }
            senders.push(tx);
            inputs.push(ChannelInput::new(rx));
        }
        for &value in &self.signal {
            senders[0].push(value);
        }

        // Stage i writes into channel i + 1; the last stage writes into a
        // sink, or into channel 0 when looping back.
        let mut senders = senders.into_iter();
        let first: Option<UnboundedSender<i64>> = senders.next();
        let mut outputs: Vec<UnboundedSender<i64>> = senders.collect();
        let (sink_tx, mut sink_rx) = unbounded_channel::<i64>();
        // Without feedback nothing may keep channel 0 open, or a starved
        // first stage would wait forever.
        match (first, self.feedback) {
            (Some(first), true) => outputs.push(first),
            _ => outputs.push(sink_tx),
        }

        let mut handles = Vec::with_capacity(count);
        for (index, ((stage, input), output)) in self
            .stages
            .into_iter()
            .zip(inputs)
            .zip(outputs)
            .enumerate()
        {
            handles.push(tokio::spawn(run_stage(index, stage, input, output)));
        }

        let mut output = PipelineOutput::default();
        let mut faults = Vec::new();
        let mut first_input = None;
        for (stage, handle) in handles.into_iter().enumerate() {
            let report = handle
                .await
                .map_err(|source| PipelineError::Join { stage, source })?;
            if stage == 0 {
                first_input = Some(report.input);
            }
            output.memories.push(report.memory);
            match report.result {
                Ok(trace) => output.traces.push(trace),
                Err(fault) => {
                    output.traces.push(fault.trace.clone());
                    faults.push((stage, fault));
                }
            }
        }

        if let Some(index) = faults
            .iter()
            .position(|(_, fault)| !matches!(fault.error, VMError::InputClosed { .. }))
            .or(if faults.is_empty() { None } else { Some(0) })
        {
            let (stage, fault) = faults.swap_remove(index);
            return Err(PipelineError::Stage { stage, fault });
        }

        // Every sender is gone now, so draining sees all values ever sent.
        output.values = if self.feedback {
            first_input.map(|mut input| input.drain()).unwrap_or_default()
        } else {
            let mut values = Vec::new();
            while let Ok(value) = sink_rx.try_recv() {
                values.push(value);
            }
            values
        };
        Ok(output)
    }

    /// Runs the pipeline on a fresh single-threaded runtime.
    pub fn run_blocking(self) -> Result<PipelineOutput, PipelineError> {
        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        runtime.block_on(self.run())
    }
}

async fn run_stage(
    index: usize,
    stage: Stage,
    input: ChannelInput,
    output: UnboundedSender<i64>,
) -> StageReport {
    debug!("stage {index} starting at {}", stage.start);
    let mut memory = stage.program;
    let mut vm = Vm::new(&mut memory, input, output).with_start(stage.start);
    let result = vm.run_async().await;
    let (input, _output, trace) = vm.into_parts();
    match &result {
        Ok(()) => debug!("stage {index} halted after {} instructions", trace.len()),
        Err(fault) => debug!("stage {index} faulted: {fault}"),
    }
    StageReport {
        result: result.map(|()| trace),
        input,
        memory,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AMPLIFIER: [i64; 17] = [3, 15, 3, 16, 1002, 16, 10, 16, 1, 16, 15, 15, 4, 15, 99, 0, 0];

    const FEEDBACK_AMPLIFIER: [i64; 29] = [
        3, 26, 1001, 26, -4, 26, 3, 27, 1002, 27, 2, 27, 1, 27, 26, 27, 4, 27, 1001, 28, -1, 28,
        1005, 28, 6, 99, 0, 0, 5,
    ];

    /// Outputs 10, 20, 30 and halts.
    const EMIT: [i64; 7] = [104, 10, 104, 20, 104, 30, 99];

    /// Outputs 30, 20, 10 and halts.
    const EMIT_REVERSED: [i64; 7] = [104, 30, 104, 20, 104, 10, 99];

    /// Reads a, b, c and outputs a + b + c.
    const SUM: [i64; 21] = [
        3, 17, 3, 18, 3, 19, 1, 17, 18, 20, 1, 20, 19, 20, 4, 20, 99, 0, 0, 0, 0,
    ];

    /// Reads a, b, c and outputs a - b - c.
    const SUBTRACT: [i64; 29] = [
        3, 25, 3, 26, 3, 27, 1002, 26, -1, 26, 1002, 27, -1, 27, 1, 25, 26, 28, 1, 28, 27, 28, 4,
        28, 99, 0, 0, 0, 0,
    ];

    #[tokio::test]
    async fn amplifier_chain() {
        let output = Pipeline::amplifiers(&AMPLIFIER, &[4, 3, 2, 1, 0])
            .signal([0])
            .run()
            .await
            .unwrap();
        assert_eq!(output.values, vec![43210]);
        assert_eq!(output.traces.len(), 5);
        assert_eq!(output.memories.len(), 5);
    }

    #[tokio::test]
    async fn feedback_loop() {
        let output = Pipeline::amplifiers(&FEEDBACK_AMPLIFIER, &[9, 8, 7, 6, 5])
            .signal([0])
            .feedback(true)
            .run()
            .await
            .unwrap();
        assert_eq!(output.last(), Some(139629729));
    }

    #[tokio::test]
    async fn values_arrive_in_order() {
        let output = Pipeline::new()
            .stage(Stage::new(EMIT.to_vec(), vec![]))
            .stage(Stage::new(SUM.to_vec(), vec![]))
            .run()
            .await
            .unwrap();
        assert_eq!(output.values, vec![60]);

        let output = Pipeline::new()
            .stage(Stage::new(EMIT.to_vec(), vec![]))
            .stage(Stage::new(SUBTRACT.to_vec(), vec![]))
            .run()
            .await
            .unwrap();
        assert_eq!(output.values, vec![10 - 20 - 30]);

        let output = Pipeline::new()
            .stage(Stage::new(EMIT_REVERSED.to_vec(), vec![]))
            .stage(Stage::new(SUBTRACT.to_vec(), vec![]))
            .run()
            .await
            .unwrap();
        assert_eq!(output.values, vec![0]);
    }

    #[tokio::test]
    async fn seed_comes_before_upstream_values() {
        let output = Pipeline::new()
            .stage(Stage::new(EMIT.to_vec(), vec![]).with_start(2))
            .stage(Stage::new(SUBTRACT.to_vec(), vec![60]))
            .run()
            .await
            .unwrap();
        assert_eq!(output.values, vec![60 - 20 - 30]);
    }

    #[tokio::test]
    async fn downstream_stage_started_first_waits() {
        // The consumer is the first stage; it only gets input once the
        // second stage loops its output back around.
        let output = Pipeline::new()
            .stage(Stage::new(vec![3, 0, 4, 0, 99], vec![]))
            .stage(Stage::new(EMIT.to_vec(), vec![]))
            .feedback(true)
            .run()
            .await
            .unwrap();
        assert_eq!(output.values, vec![20, 30]);
        assert_eq!(output.memories[0][0], 10);
    }

    #[tokio::test]
    async fn starved_stage_faults_with_closed_input() {
        let err = Pipeline::new()
            .stage(Stage::new(vec![104, 1, 99], vec![]))
            .stage(Stage::new(vec![3, 0, 3, 0, 99], vec![]))
            .run()
            .await
            .unwrap_err();
        match err {
            PipelineError::Stage { stage, fault } => {
                assert_eq!(stage, 1);
                assert_eq!(fault.error, VMError::InputClosed { position: 2 });
                assert_eq!(fault.trace.len(), 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn starved_first_stage_faults() {
        let err = Pipeline::new()
            .stage(Stage::new(vec![3, 0, 3, 0, 99], vec![]))
            .signal([1])
            .run()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Stage {
                stage: 0,
                fault: Fault {
                    error: VMError::InputClosed { position: 2 },
                    ..
                },
            }
        ));
    }

    #[tokio::test]
    async fn root_cause_is_reported_over_closed_inputs() {
        let err = Pipeline::new()
            .stage(Stage::new(vec![3, 0, 4, 0, 99], vec![]))
            .stage(Stage::new(vec![3, 0, 42], vec![]))
            .stage(Stage::new(vec![3, 0, 99], vec![]))
            .signal([5])
            .run()
            .await
            .unwrap_err();
        match err {
            PipelineError::Stage { stage, fault } => {
                assert_eq!(stage, 1);
                assert!(matches!(fault.error, VMError::UnknownOpcode { opcode: 42, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_pipeline() {
        assert!(matches!(
            Pipeline::new().run().await,
            Err(PipelineError::Empty)
        ));
    }

    #[test]
    fn run_blocking_uses_its_own_runtime() {
        let output = Pipeline::amplifiers(&AMPLIFIER, &[4, 3, 2, 1, 0])
            .signal([0])
            .run_blocking()
            .unwrap();
        assert_eq!(output.last(), Some(43210));
    }
}
