use std::process::ExitCode;

fn main() -> ExitCode {
    roamcat_cli::run()
}
