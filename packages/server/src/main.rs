#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Data Coyote API server binary.

#[actix_web::main]
async fn main() {
    let logger = data_coyote_cli_utils::init_logger();
    data_coyote_config::load_dotenv();

    if let Err(e) = data_coyote_server::run_server().await {
        log::error!("Server failed: {e}");
        drop(logger);
        std::process::exit(1);
    }
}
