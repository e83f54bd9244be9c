//! # CLI - Reference Sample Interactive Shell
//!
//! A REPL-style command-line interface over one reference sample store.
//! Reads commands from stdin, executes them, and prints results to stdout.
//! Designed for both interactive use and scripted loading (pipe commands
//! via stdin). Logs go to stderr.
//!
//! ## Commands
//!
//! ```text
//! NEW id                    Register an object
//! ADDSED id x:y [x:y ...]   Write the SED of an object
//! ADDPDZ id z:p [z:p ...]   Write the PDZ of an object
//! GETSED id                 Print the SED (or "(nil)")
//! GETPDZ id                 Print the PDZ (or "(nil)")
//! IDS                       List all ids in index order
//! SIZE                      Number of objects
//! MISSING SED|PDZ           Ids without that dataset
//! OPTIMIZE                  Fsync data files and sort the index
//! STATS                     Print store debug info
//! EXIT / QUIT               Shut down gracefully
//! ```
//!
//! ## Configuration
//!
//! ```text
//! REFSAMPLE_PATH         store root directory           (default: "refsample")
//! REFSAMPLE_MAX_FILE_KB  data file budget in KiB        (default: 1048576 = 1 GiB)
//! REFSAMPLE_OVERWRITE    wipe an existing store first   (default: "false")
//! REFSAMPLE_SYNC         fsync data and index per write (default: "false")
//! RUST_LOG               log filter                     (default: "warn")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p cli
//! RefSample ready (path=refsample, objects=0, max_file=1048576KiB, sync=false)
//! > NEW 10
//! OK
//! > ADDSED 10 100:1 105:2 110:3
//! OK
//! > GETSED 10
//! 100:1 105:2 110:3
//! > EXIT
//! bye
//! ```

mod commands;

use anyhow::Result;
use commands::{execute, parse, Command};
use config::RefSampleConfig;
use refsample::ReferenceSample;
use std::io::{self, BufRead, Write};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(io::stderr)
        .init();

    let cfg = RefSampleConfig::from_env()?;
    if cfg.clear_target()? {
        info!("removed existing store at {}", cfg.path.display());
    }

    let mut rs = if cfg.path.exists() {
        ReferenceSample::open(&cfg.path, cfg.max_file_size)?
    } else {
        ReferenceSample::create(&cfg.path, cfg.max_file_size)?
    };
    rs.set_sync(cfg.sync);

    println!(
        "RefSample ready (path={}, objects={}, max_file={}KiB, sync={})",
        cfg.path.display(),
        rs.size(),
        cfg.max_file_size / 1024,
        cfg.sync
    );
    println!("Commands: NEW id | ADDSED id x:y.. | ADDPDZ id z:p.. | GETSED id | GETPDZ id");
    println!("          IDS | SIZE | MISSING SED|PDZ | OPTIMIZE | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        match parse(&line) {
            Ok(Some(Command::Exit)) => {
                println!("bye");
                break;
            }
            Ok(Some(cmd)) => println!("{}", execute(&mut rs, cmd)),
            Ok(None) => {}
            Err(msg) => println!("ERR {}", msg),
        }

        print!("> ");
        io::stdout().flush().ok();
    }

    rs.sync_to_disk()?;
    Ok(())
}
