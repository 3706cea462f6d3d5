//! Chains of external processes.
//!
//! A [`Pipeline`] feeds the input stream to the first stage's stdin, captures
//! each stage's stdout into a pooled buffer and hands that buffer to the next
//! stage. Two buffers alternate between the "previous output" and "current
//! output" roles, so a pipeline of any length borrows exactly two.
//!
//! Stages run one after another. A stage that fails to start or exits
//! non-zero aborts the pipeline; its partial output is discarded and its
//! trimmed stderr is returned in the error.
//!
//! Nothing here can be cancelled. A caller that needs a deadline must kill
//! the child processes or close the input itself.

use crate::error::PipelineError;
use glimpse_core::{BufferPool, MediaSource, PooledBuffer};
use std::ffi::OsString;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::process::{Command, Stdio};
use std::thread;
use tracing::debug;

/// One external program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    program: String,
    args: Vec<OsString>,
}

impl Stage {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn run(
        &self,
        index: usize,
        input: StageInput<'_>,
        output: &mut Vec<u8>,
    ) -> Result<(), PipelineError> {
        let io_error = |source: io::Error| PipelineError::Io {
            index,
            program: self.program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| PipelineError::Spawn {
                index,
                program: self.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (fed, diagnostics, read) = thread::scope(|s| {
            let feeder = s.spawn(move || feed(stdin, input));
            let collector = s.spawn(move || {
                let mut raw = Vec::new();
                if let Some(mut stderr) = stderr {
                    let _ = stderr.read_to_end(&mut raw);
                }
                raw
            });
            let read = match stdout {
                Some(mut stdout) => stdout.read_to_end(output).map(drop),
                None => Ok(()),
            };
            (
                feeder.join().unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked"))),
                collector.join().unwrap_or_default(),
                read,
            )
        });

        let status = child.wait().map_err(io_error)?;
        if !status.success() {
            return Err(PipelineError::Stage {
                index,
                program: self.program.clone(),
                status,
                stderr: String::from_utf8_lossy(&diagnostics).trim().to_string(),
            });
        }
        fed.map_err(io_error)?;
        read.map_err(io_error)
    }
}

enum StageInput<'a> {
    Stream(&'a mut dyn MediaSource),
    Bytes(&'a [u8]),
}

/// Writes a stage's input and closes its stdin.
///
/// A stage may exit without reading all of its input; the resulting broken
/// pipe is not an error, the exit status decides.
fn feed(stdin: Option<std::process::ChildStdin>, input: StageInput<'_>) -> io::Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };
    let written = match input {
        StageInput::Stream(stream) => io::copy(stream, &mut stdin).map(drop),
        StageInput::Bytes(bytes) => stdin.write_all(bytes),
    };
    match written {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

/// An ordered chain of [`Stage`]s, executed at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage reading the previous stage's output.
    #[must_use]
    pub fn then(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs every stage in order and returns the last stage's stdout.
    ///
    /// `input` is rewound first. The returned buffer is borrowed from `pool`.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Empty`] for a pipeline without stages. Otherwise the
    /// first stage that fails to start, exits non-zero or hits an I/O error;
    /// later stages are never started.
    pub fn execute<'p>(
        self,
        input: &mut dyn MediaSource,
        pool: &'p BufferPool,
    ) -> Result<PooledBuffer<'p>, PipelineError> {
        let Some(first) = self.stages.first() else {
            return Err(PipelineError::Empty);
        };
        input
            .seek(SeekFrom::Start(0))
            .map_err(|source| PipelineError::Io {
                index: 0,
                program: first.program.clone(),
                source,
            })?;

        let mut previous = pool.take();
        let mut current = pool.take();
        for (index, stage) in self.stages.iter().enumerate() {
            debug!(index, program = %stage.program, "running pipeline stage");
            current.clear();
            let stage_input = if index == 0 {
                StageInput::Stream(&mut *input)
            } else {
                StageInput::Bytes(previous.as_slice())
            };
            stage.run(index, stage_input, &mut current)?;
            std::mem::swap(&mut previous, &mut current);
        }
        Ok(previous)
    }
}

/// Runs a single program over `input`.
pub fn run_command<'p>(
    input: &mut dyn MediaSource,
    stage: Stage,
    pool: &'p BufferPool,
) -> Result<PooledBuffer<'p>, PipelineError> {
    Pipeline::new().then(stage).execute(input, pool)
}
