//! Writes the OpenAPI description of the HTTP routes to `specs/brawl-api.json`
//! at the repository root. The WebSocket join endpoint is not described.

use utoipa::OpenApi;

fn main() {
    let doc = brawl_api::routes::ApiDoc::openapi()
        .to_pretty_json()
        .expect("serialize openapi document");
    let out = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../specs/brawl-api.json");
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent).expect("create specs directory");
    }
    std::fs::write(&out, doc).expect("write openapi document");
    println!("Wrote {}", out.display());
}
