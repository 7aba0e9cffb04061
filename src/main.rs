use std::process::ExitCode;

mod cli;
mod config;
mod domain;
mod errors;
mod jobs;
mod scraping;
mod spreadsheets;
mod telemetry;

#[cfg(test)]
mod tests;

fn main() -> ExitCode {
    match cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
