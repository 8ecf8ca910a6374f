// src/main.rs

use dagrun::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("dagrun error: {err:?}");
            std::process::exit(1);
        }
    }
}

/// Returns whether the run (if any) succeeded.
async fn run_main() -> anyhow::Result<bool> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    let json = args.json;

    let Some(report) = run(args).await? else {
        return Ok(true);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }

    Ok(report.is_success())
}
