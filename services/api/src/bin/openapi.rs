//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document for the detailing REST API to disk so client
//! code can be generated without a running server.
//!
//! Usage: `openapi [OUTPUT_PATH]` (defaults to `openapi.json`).

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

const DEFAULT_OUTPUT: &str = "openapi.json";

fn write_spec(path: &str) -> Result<usize, Box<dyn std::error::Error>> {
    let doc = ApiDoc::openapi();
    let json = doc.to_pretty_json()?;
    std::fs::write(path, &json)?;
    Ok(doc.paths.paths.len())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());
    let routes = write_spec(&path)?;
    println!("Wrote OpenAPI document with {} paths to {}", routes, path);
    Ok(())
}
