mod cli;
mod infra;
mod report;
mod routes;
mod server;

use parcel_ops::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
