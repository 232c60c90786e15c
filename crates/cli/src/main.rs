use std::process::ExitCode;

fn main() -> ExitCode {
    kintai_cli::run()
}
