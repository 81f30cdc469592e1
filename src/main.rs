use std::process::ExitCode;

#[actix_web::main]
async fn main() -> ExitCode {
    match verwaltung::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("verwaltung: {err}");
            ExitCode::FAILURE
        }
    }
}
