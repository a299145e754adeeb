use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink, RunResult, StageResult};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_stage(result: &StageResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_run(result: &RunResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Discards progress.
pub struct SilentOutput;

impl ProgressSink for SilentOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Line-oriented progress on stderr plus a colored summary on stdout.
pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn print_run(result: &RunResult) {
        let green = "\x1b[32m";
        let yellow = "\x1b[33m";
        let cyan = "\x1b[36m";
        let reset = "\x1b[0m";

        println!("{cyan}KIRA-PB summary{reset}");
        println!("{green}Stages completed: {}{reset}", result.stages.len());
        println!("{yellow}Row errors: {}{reset}", result.error_count());
        for stage in &result.stages {
            Self::print_stage(stage);
        }
    }

    pub fn print_stage(stage: &StageResult) {
        let color = if stage.error_count == 0 {
            "\x1b[32m"
        } else {
            "\x1b[33m"
        };
        let reset = "\x1b[0m";
        println!(
            "{color}{} {} -> {} rows, {} errors{reset}",
            stage.stage, stage.rows_in, stage.rows_out, stage.error_count
        );
        println!("{color}   output: {}{reset}", stage.output);
        if stage.error_count > 0 {
            println!("{color}   errors: {}{reset}", stage.errors);
        }
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        // Per-row ticks would flood the terminal; only phases are shown.
        if !event.message.starts_with("phase=") {
            return;
        }
        match event.elapsed {
            Some(elapsed) => eprintln!("[{:>6.1}s] {}", elapsed.as_secs_f64(), event.message),
            None => eprintln!("          {}", event.message),
        }
    }
}
