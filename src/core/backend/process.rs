//! Subprocess helpers shared by backends and the test phase.

use std::collections::BTreeMap;
use std::process::{Command, Output};

use super::BackendError;
use crate::core::output;

/// Shell-quote a value for safe interpolation.
pub fn shell_quote(s: impl std::fmt::Display) -> String {
    let s = s.to_string();
    if !s.is_empty()
        && s.chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.' || c == '/' || c == '=')
    {
        s
    } else {
        format!("'{}'", s.replace('\'', "'\"'\"'"))
    }
}

/// Expand `$NAME` placeholders. Longer names are replaced first so that
/// `$BUILD_DIR` never matches a shorter `$BUILD` entry.
pub fn expand_vars(template: &str, vars: &BTreeMap<String, String>) -> String {
    let mut keys: Vec<&String> = vars.keys().collect();
    keys.sort_by_key(|k| std::cmp::Reverse(k.len()));
    let mut out = template.to_string();
    for key in keys {
        out = out.replace(&format!("${}", key), &vars[key]);
    }
    out
}

/// Render a command line for logs and diagnostics.
pub fn display_command(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|a| shell_quote(a.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run a command to completion, capturing its output.
///
/// `Command::output` waits for the child, so the process has always exited
/// by the time this returns, on success and on error alike.
pub fn run_captured(cmd: &mut Command) -> std::io::Result<Output> {
    let line = display_command(cmd);
    output::command(&line);

    let display = if line.len() > 60 {
        let cut = line
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|i| *i <= 57)
            .last()
            .unwrap_or(0);
        format!("{}...", &line[..cut])
    } else {
        line
    };

    let pb = output::spinner(&format!("run: {}", display));
    let result = cmd.output();
    output::progress_done(pb);
    result
}

/// Combined stdout and stderr, lossily decoded, as the raw diagnostic.
pub fn diagnostic(out: &Output) -> String {
    let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&out.stderr);
    if !stderr.is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&stderr);
    }
    text
}

/// Run a backend command; non-zero exit becomes a [`BackendError`].
pub fn run_checked(operation: &str, cmd: &mut Command) -> Result<(), BackendError> {
    let line = display_command(cmd);
    let out = run_captured(cmd)
        .map_err(|e| BackendError::new(operation, &line, None, format!("failed to start: {}", e)))?;

    if !out.status.success() {
        return Err(BackendError::new(
            operation,
            &line,
            out.status.code(),
            diagnostic(&out),
        ));
    }

    Ok(())
}
