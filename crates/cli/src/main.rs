use std::process::ExitCode;

fn main() -> ExitCode {
    milletchain_cli::run()
}
