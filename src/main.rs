//! jobherd CLI entry point

use anyhow::{Context, Result};
use jobherd::campaign::{Coordinator, JobSource, Worker};
use jobherd::config::cli::{Cli, ExecutionMode};
use jobherd::config::{toml as config_toml, validator, Config};
use jobherd::exec::ShellRunner;
use jobherd::transport::channel::ChannelTransport;
use jobherd::transport::tcp::TcpTransport;
use jobherd::util::diag;
use jobherd::Transport;

fn main() -> Result<()> {
    // Parse CLI arguments; unknown flags are reported and skipped.
    let cli = Cli::parse_args();

    // Resolve the effective configuration (TOML file under CLI flags) and
    // validate it before anything is opened or bound.
    let config = config_toml::load(&cli)?;
    validator::validate_config(&config, cli.mode)?;

    match cli.mode {
        ExecutionMode::Local => run_local(&config),
        ExecutionMode::Coordinator => run_coordinator(&config),
        ExecutionMode::Worker => run_worker(&config),
    }
}

/// Run a whole pool inside one process: the coordinator and every worker
/// are threads wired with the channel transport.
fn run_local(config: &Config) -> Result<()> {
    let workers = config.pool.effective_workers();

    println!("jobherd v{}", env!("CARGO_PKG_VERSION"));
    println!("Local pool: {} workers", workers);

    // Open the job source first: a missing campaign file must be fatal
    // before any message is exchanged.
    let file = config.campaign.file.as_ref().context("campaign file not configured")?;
    let mut jobs = JobSource::open(file)?;

    let mut group = ChannelTransport::group(workers + 1);
    let worker_transports = group.split_off(1);
    let coordinator_transport = group.remove(0);

    let prologue = config.campaign.prologue.clone();
    let epilogue = config.campaign.epilogue.clone();
    let prologue_configured = prologue.is_some();

    std::thread::scope(|scope| {
        // The coordinator thread owns its endpoint; if it dies, every
        // blocked worker observes a disconnect instead of hanging.
        let coordinator = scope.spawn(move || {
            Coordinator::new(&coordinator_transport, prologue, epilogue).run(&mut jobs)
        });

        let mut worker_handles = Vec::with_capacity(workers);
        for transport in worker_transports {
            worker_handles.push(scope.spawn(move || {
                let rank = transport.rank();
                let runner = ShellRunner::new();
                Worker::new(&transport, &runner).run(prologue_configured).map_err(|err| {
                    eprintln!("{} fatal: {err:#}", diag::worker_prefix(rank));
                    err
                })
            }));
        }

        let mut failed_workers = 0;
        for handle in worker_handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(_)) => failed_workers += 1,
                Err(_) => failed_workers += 1,
            }
        }

        let dispatched = coordinator
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))?;

        if failed_workers > 0 {
            anyhow::bail!("{failed_workers} worker(s) failed");
        }

        println!("Campaign finished: {dispatched} jobs");
        Ok(())
    })
}

/// Run rank 0 of a multi-host pool over TCP.
fn run_coordinator(config: &Config) -> Result<()> {
    let workers = config.pool.workers.context("worker count not configured")?;

    println!("jobherd v{}", env!("CARGO_PKG_VERSION"));
    println!("Coordinator: waiting for {} workers on port {}", workers, config.net.listen_port);

    // Fail on an unopenable job list before accepting anyone.
    let file = config.campaign.file.as_ref().context("campaign file not configured")?;
    let mut jobs = JobSource::open(file)?;

    let prologue = config.campaign.prologue.clone();
    let epilogue = config.campaign.epilogue.clone();

    let bind = format!("0.0.0.0:{}", config.net.listen_port);
    let transport = TcpTransport::listen(bind.as_str(), workers, prologue.is_some())
        .context("failed to assemble the worker pool")?;

    let dispatched = Coordinator::new(&transport, prologue, epilogue).run(&mut jobs)?;
    println!("Campaign finished: {dispatched} jobs");
    Ok(())
}

/// Join a listening coordinator and work until told to stop.
fn run_worker(config: &Config) -> Result<()> {
    let addr = config.net.connect.as_ref().context("coordinator address not configured")?;

    let (transport, prologue_configured) = TcpTransport::connect(addr.as_str())
        .with_context(|| format!("failed to join coordinator at {addr}"))?;

    eprintln!(
        "{} joined pool of {} as rank {}",
        diag::worker_prefix(transport.rank()),
        transport.size(),
        transport.rank()
    );

    let runner = ShellRunner::new();
    Worker::new(&transport, &runner).run(prologue_configured)
}
