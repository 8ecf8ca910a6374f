// src/exec/task_runner.rs

//! Individual task process runner shared by the process-based executors.

use std::collections::VecDeque;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::dag::ScheduledTask;
use crate::engine::ExecutionResult;

/// Default number of output lines kept per task.
pub const DEFAULT_MAX_OUTPUT_LINES: usize = 200;

/// Spawn `cmd`, wait for it to exit and turn the exit status into an
/// [`ExecutionResult`].
///
/// stdout and stderr are always drained so pipes never fill up; every line is
/// logged at debug level and the last `max_output_lines` lines of each stream
/// become the diagnostic output.
///
/// The child is killed if the returned future is dropped (e.g. when the run
/// aborts the task).
pub async fn run_process(
    mut cmd: Command,
    task: &ScheduledTask,
    max_output_lines: usize,
) -> Result<ExecutionResult> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for task '{}'", task.name))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (status, out_lines, err_lines) = tokio::join!(
        child.wait(),
        collect_lines(stdout, "stdout", task, max_output_lines),
        collect_lines(stderr, "stderr", task, max_output_lines),
    );

    let status =
        status.with_context(|| format!("waiting for process of task '{}'", task.name))?;

    let code = status.code();
    info!(
        task = %task.name,
        run_id = task.run_id,
        exit_code = ?code,
        success = status.success(),
        "task process exited"
    );

    let mut output = out_lines.join("\n");
    if !err_lines.is_empty() {
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str(&err_lines.join("\n"));
    }

    Ok(if status.success() {
        ExecutionResult::succeeded(output)
    } else {
        ExecutionResult::failed(code, output)
    })
}

/// Read `reader` line by line, logging each line and keeping the tail.
///
/// Lines are decoded lossily. The stream is always drained to EOF, so a
/// chatty child never blocks on (or gets SIGPIPE from) a closed pipe.
async fn collect_lines<R>(
    reader: Option<R>,
    stream: &'static str,
    task: &ScheduledTask,
    max_lines: usize,
) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Vec::new();
    };

    let mut tail: VecDeque<String> = VecDeque::with_capacity(max_lines.min(64));
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(task = %task.name, run_id = task.run_id, error = %e, "{stream}: read error");
                if e.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                // Discard the rest so the child can still finish.
                let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
                break;
            }
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']).to_string();
        debug!(task = %task.name, run_id = task.run_id, "{stream}: {}", line);
        if max_lines == 0 {
            continue;
        }
        if tail.len() == max_lines {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    tail.into_iter().collect()
}
