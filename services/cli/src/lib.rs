mod cli;
mod commands;
mod infra;

use edugrade::error::AppError;

pub fn run() -> Result<(), AppError> {
    cli::run()
}
