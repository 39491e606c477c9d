use clap::Parser;
use sheet_rollover::cli;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli_args = cli::Cli::parse();
    let format = cli_args.format;
    let compact = cli_args.compact;

    match cli::run_command(cli_args).await {
        Ok(payload) => {
            if let Err(error) = cli::output::emit_value(&payload, format, compact) {
                emit_error_and_exit(error);
            }
        }
        Err(error) => emit_error_and_exit(error),
    }
}

fn emit_error_and_exit(error: anyhow::Error) -> ! {
    let envelope = cli::errors::envelope_for(&error);
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    if serde_json::to_writer(&mut handle, &envelope).is_err() {
        eprintln!("{{\"code\":\"COMMAND_FAILED\",\"message\":\"{}\"}}", error);
    } else {
        use std::io::Write;
        let _ = handle.write_all(b"\n");
    }
    std::process::exit(1)
}
