use anyhow::Result;
use env_logger::{Builder, Env};
use log::error;

mod cli;
mod cmd_diff;
mod cmd_dump;
mod cmd_run;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт - info.
    // Пример: RUST_LOG=debug sram-autosave run ...
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse_args();
    match cli.cmd {
        cli::Cmd::Run {
            path,
            size,
            interval,
            duration,
            rate,
            seed,
            fill,
            load,
            json,
        } => cmd_run::exec(cmd_run::RunArgs {
            path,
            size,
            interval,
            duration,
            rate,
            seed,
            fill,
            load,
            json,
        }),

        cli::Cmd::Diff { a, b, max } => cmd_diff::exec(a, b, max),

        cli::Cmd::Dump { path, limit } => cmd_dump::exec(path, limit),
    }
}
