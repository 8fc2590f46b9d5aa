use json_collections::{dispatch, schema, FlushPolicy, Method, RecordStore, Request};
use std::time::Duration;

fn main() -> Result<(), json_collections::Error> {
    let dir = std::env::temp_dir().join("json_collections_example_builder");
    let users = dir.join("users.json");
    let teams = dir.join("teams.json");

    // schema list as it would come out of a config file
    let config = serde_json::json!([
        {"name": "users", "identity_field": "email", "path": users},
        {"name": "teams", "identity_field": "slug", "path": teams},
    ]);
    let schemas = schema::parse_schema_list(config.to_string().as_bytes())?;

    // pretty-printed JSON + async flush every 5 seconds
    let db = RecordStore::builder()
        .collections(schemas)
        .pretty(true)
        .policy(FlushPolicy::Async(Duration::from_secs(5)))
        .build()?;

    // drive it the way an HTTP adapter would
    let store = db.store();
    let resp = dispatch(
        &store,
        &Request::new(Method::Post, "users").with_body(r#"{"email": "ada@x.com"}"#),
    );
    println!("POST /users -> {}", resp.status);
    let resp = dispatch(&store, &Request::new(Method::Get, "ghosts"));
    println!("GET /ghosts -> {}", resp.status);
    drop(store);

    db.shutdown()?;

    // the file on disk is now nicely indented
    let contents = std::fs::read_to_string(&users)?;
    println!("On-disk JSON:\n{contents}");

    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}
