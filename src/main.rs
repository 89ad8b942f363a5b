use std::process::ExitCode;

fn main() -> ExitCode {
    siteforge::cli::run()
}
