//! services/api/src/bin/openapi.rs
//!
//! Prints the OpenAPI specification as JSON, for client generation and docs.

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

fn main() {
    match ApiDoc::openapi().to_pretty_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to render OpenAPI document: {}", e);
            std::process::exit(1);
        }
    }
}
