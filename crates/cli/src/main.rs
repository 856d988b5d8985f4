use std::process::ExitCode;

fn main() -> ExitCode {
    palaver_cli::run()
}
