use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use droidclaw_lib::agent_engine::{StepRecord, TaskLoop, TaskResult};
use droidclaw_lib::config::{load_config, AppConfig};
use droidclaw_lib::errors::{DroidClawError, DroidClawResult};
use droidclaw_lib::executor::adb::list_devices;
use droidclaw_lib::executor::apps::AppRegistry;
use droidclaw_lib::executor::safety::{AutoApprove, ConsoleInteraction};
use droidclaw_lib::executor::Interaction;

#[derive(Debug, Parser)]
#[command(name = "droidclaw", version, about = "Drive an Android phone with a vision language model")]
struct Cli {
    /// Path to config.toml (default: next to the binary, then the working directory)
    #[arg(long)]
    config: Option<PathBuf>,
    /// ADB device serial
    #[arg(long, short = 'd')]
    device: Option<String>,
    /// Step limit for each task
    #[arg(long)]
    max_steps: Option<u32>,
    /// Approve sensitive taps without asking
    #[arg(long, short = 'y')]
    yes: bool,
    /// Print connected devices and exit
    #[arg(long)]
    list_devices: bool,
    /// Print supported app names and exit
    #[arg(long)]
    list_apps: bool,
    /// Task to run. Without it, tasks are read from stdin one per line.
    task: Option<String>,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    droidclaw_lib::init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    }
}

/// `Ok(false)` when the last task did not succeed.
async fn run(cli: Cli) -> DroidClawResult<bool> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(device) = cli.device {
        config.device.device_id = Some(device);
    }
    let max_steps = cli.max_steps.unwrap_or(config.agent.max_steps);
    if max_steps == 0 {
        return Err(DroidClawError::Config("--max-steps must be at least 1".into()));
    }

    if cli.list_devices {
        print_devices(&config).await?;
        return Ok(true);
    }
    if cli.list_apps {
        for name in AppRegistry::with_extra(&config.apps).names() {
            println!("{name}");
        }
        return Ok(true);
    }

    let interaction: Arc<dyn Interaction> = if cli.yes {
        Arc::new(AutoApprove)
    } else {
        Arc::new(ConsoleInteraction)
    };

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; stopping after the current step");
                stop.store(true, Ordering::SeqCst);
            }
        });
    }

    let task_loop = droidclaw_lib::build_task_loop(&config, interaction)?.with_stop_flag(stop.clone());
    let device_id = config.device.device_id.as_deref();

    if let Some(task) = cli.task {
        let result = run_task(&task_loop, &task, device_id, max_steps).await;
        return Ok(result.success);
    }

    let mut last_success = true;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(b"\nTask (empty or 'quit' to exit): ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let task = line.trim();
        if task.is_empty() || task.eq_ignore_ascii_case("quit") || task.eq_ignore_ascii_case("exit") {
            break;
        }
        stop.store(false, Ordering::SeqCst);
        last_success = run_task(&task_loop, task, device_id, max_steps).await.success;
    }
    Ok(last_success)
}

async fn run_task(task_loop: &TaskLoop, task: &str, device_id: Option<&str>, max_steps: u32) -> TaskResult {
    let mut print_step = |record: &StepRecord| {
        println!("\n[step {}]", record.step);
        if !record.reasoning.is_empty() {
            println!("  thinking: {}", record.reasoning);
        }
        println!("  action:   {}", record.directive);
        match (&record.message, record.success) {
            (Some(msg), true) => println!("  result:   {msg}"),
            (Some(msg), false) => println!("  failed:   {msg}"),
            (None, ok) => println!("  result:   {}", if ok { "ok" } else { "failed" }),
        }
    };
    let result = task_loop.run(task, device_id, max_steps, Some(&mut print_step)).await;

    println!();
    if result.finished {
        let status = if result.success { "done" } else { "stopped" };
        println!("{status} after {} steps: {}", result.steps, result.message.as_deref().unwrap_or(""));
    } else if let Some(error) = &result.error {
        println!("failed after {} steps: {error}", result.steps);
    } else {
        println!("step limit reached ({} steps) without finishing", result.steps);
    }
    result
}

async fn print_devices(config: &AppConfig) -> DroidClawResult<()> {
    let devices = list_devices(&config.device.adb_path).await?;
    if devices.is_empty() {
        println!("no devices connected");
    }
    for d in devices {
        println!("{}\t{}\t{}", d.serial, d.state, d.model.as_deref().unwrap_or("-"));
    }
    Ok(())
}
