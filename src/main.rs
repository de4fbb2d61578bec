mod calc;
mod db;
mod ipc;
mod logging;
mod settings;
mod store;

use std::io::{self, BufRead, Write};

fn main() {
    if let Err(e) = logging::init_tracing() {
        eprintln!("gradebookd: logging disabled: {}", e);
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gradebookd starting");

    let mut state = ipc::AppState {
        workspace: None,
        db: None,
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed; shutting down");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to echo back.
                tracing::warn!(error = %e, "malformed request line");
                let _ = writeln!(stdout, "{}", ipc::bad_json(e.to_string()));
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    tracing::info!("gradebookd stopped");
}
