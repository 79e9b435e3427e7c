//! OpenAPI Specification Generator Binary
//!
//! Writes the Cachet OpenAPI document as JSON to stdout.
//!
//! Usage:
//!   cargo run -p cachet-api --bin generate-openapi --features openapi > openapi.json

use cachet_api::ApiDoc;

fn main() {
    match ApiDoc::to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize OpenAPI spec: {}", e);
            std::process::exit(1);
        }
    }
}
