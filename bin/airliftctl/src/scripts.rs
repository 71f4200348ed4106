//! ---
//! airlift_section: "05-external-interfaces"
//! airlift_subsection: "binary"
//! airlift_type: "source"
//! airlift_scope: "code"
//! airlift_description: "Generation of the POSIX Makefile and Windows batch adapters."
//! airlift_version: "v0.1.0"
//! airlift_owner: "tbd"
//! ---
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use airlift_lifecycle::Operation;
use airlift_logging::{log_system_event, SystemEventOutcome};
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

#[derive(Debug, Args)]
pub struct ScriptsCommand {
    /// Which adapter to render.
    #[arg(long, value_enum, default_value_t = ScriptVariant::Posix)]
    variant: ScriptVariant,

    /// Write to this file instead of stdout.
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Command the adapter invokes (overridable at run time via AIRLIFTCTL).
    #[arg(long, value_name = "COMMAND", default_value = "airliftctl")]
    binary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScriptVariant {
    /// Makefile for POSIX shells.
    Posix,
    /// Batch file for cmd.exe.
    Windows,
}

pub fn run(command: &ScriptsCommand) -> Result<()> {
    let rendered = render(command.variant, &command.binary);
    match &command.output {
        Some(path) => {
            fs::write(path, &rendered)
                .with_context(|| format!("unable to write {}", path.display()))?;
            log_system_event(
                None,
                "scripts.render",
                &format!("{:?} adapter written to {}", command.variant, path.display()),
                SystemEventOutcome::Success,
            );
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

pub fn render(variant: ScriptVariant, binary: &str) -> String {
    match variant {
        ScriptVariant::Posix => render_makefile(binary),
        ScriptVariant::Windows => render_batch(binary),
    }
}

fn render_makefile(binary: &str) -> String {
    let targets: Vec<&str> = Operation::ALL.iter().map(Operation::cli_name).collect();
    let mut out = String::new();
    let _ = writeln!(out, "# Generated by `airliftctl scripts --variant posix`.");
    let _ = writeln!(out, "AIRLIFTCTL ?= {binary}");
    let _ = writeln!(out);
    let _ = writeln!(out, ".DEFAULT_GOAL := {}", Operation::Start.cli_name());
    let _ = writeln!(out, ".PHONY: {}", targets.join(" "));
    for operation in Operation::ALL {
        let _ = writeln!(out);
        let _ = writeln!(out, "# {}", operation.summary());
        let _ = writeln!(out, "{}:", operation.cli_name());
        let _ = writeln!(out, "\t$(AIRLIFTCTL) {}", operation.cli_name());
    }
    out
}

fn render_batch(binary: &str) -> String {
    let width = Operation::ALL
        .iter()
        .map(|operation| operation.cli_name().len())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    let _ = writeln!(out, "@echo off");
    let _ = writeln!(out, "rem Generated by airliftctl scripts --variant windows.");
    let _ = writeln!(out, "setlocal");
    let _ = writeln!(out, "if \"%AIRLIFTCTL%\"==\"\" set \"AIRLIFTCTL={binary}\"");
    let _ = writeln!(out, "set \"TARGET=%~1\"");
    let _ = writeln!(
        out,
        "if \"%TARGET%\"==\"\" set \"TARGET={}\"",
        Operation::Start.cli_name()
    );
    for operation in Operation::ALL {
        let _ = writeln!(
            out,
            "if /I \"%TARGET%\"==\"{name}\" goto {name}",
            name = operation.cli_name()
        );
    }
    let _ = writeln!(out, "echo Unknown target: %TARGET%");
    let _ = writeln!(out, "echo Usage: %~nx0 ^<target^>");
    for operation in Operation::ALL {
        let _ = writeln!(
            out,
            "echo   {:<width$}  {}",
            operation.cli_name(),
            operation.summary()
        );
    }
    let _ = writeln!(out, "exit /b 1");
    for operation in Operation::ALL {
        let _ = writeln!(out);
        let _ = writeln!(out, ":{}", operation.cli_name());
        let _ = writeln!(out, "%AIRLIFTCTL% {}", operation.cli_name());
        let _ = writeln!(out, "exit /b %ERRORLEVEL%");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn makefile_delegates_every_target() {
        let makefile = render(ScriptVariant::Posix, "airliftctl");
        for operation in Operation::ALL {
            let recipe = format!(
                "{}:\n\t$(AIRLIFTCTL) {}\n",
                operation.cli_name(),
                operation.cli_name()
            );
            assert!(makefile.contains(&recipe), "missing recipe for {operation}");
        }
        assert!(makefile.contains(".DEFAULT_GOAL := start"));
    }

    #[test]
    fn batch_file_dispatches_every_target() {
        let batch = render(ScriptVariant::Windows, "airliftctl.exe");
        assert!(batch.starts_with("@echo off\n"));
        assert!(batch.contains("set \"AIRLIFTCTL=airliftctl.exe\""));
        for operation in Operation::ALL {
            let name = operation.cli_name();
            assert!(batch.contains(&format!("goto {name}\n")));
            assert!(batch.contains(&format!(":{name}\n%AIRLIFTCTL% {name}\n")));
        }
    }
}
