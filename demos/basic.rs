use json_collections::{CollectionSchema, RecordStore};
use serde_json::json;

fn main() -> Result<(), json_collections::Error> {
    let dir = std::env::temp_dir().join("json_collections_example_basic");
    let db = RecordStore::open([CollectionSchema::new(
        "users",
        "email",
        dir.join("users.json"),
    )])?;

    // create: the store attaches "__id__"
    let ada = json!({"email": "ada@x.com", "name": "Ada"});
    let ada = db.upsert("users", ada.as_object().cloned().unwrap_or_default())?;
    let id = ada["__id__"].as_str().unwrap_or_default().to_string();
    println!("created  = {ada:?}");

    // same identity, no internal id: someone else's record
    let imposter = json!({"email": "ada@x.com", "name": "Not Ada"});
    let err = db
        .upsert("users", imposter.as_object().cloned().unwrap_or_default())
        .unwrap_err();
    println!("conflict = {err}");

    // update by internal id
    let renamed = json!({"email": "ada@x.com", "name": "Ada L."});
    db.update_by_id("users", &id, renamed.as_object().cloned().unwrap_or_default())?;
    println!("by id    = {:?}", db.find_by_id("users", &id)?);

    // batch + filter
    let batch = vec![
        json!({"email": "bob@x.com", "team": "red"}),
        json!({"email": "cy@x.com", "team": "red"}),
    ];
    db.batch_upsert(
        "users",
        batch.into_iter().filter_map(|v| v.as_object().cloned()),
    )?;
    println!("red team = {:?}", db.filter_by_field("users", "team", &json!("red"))?);
    println!("len      = {}", db.len("users")?);

    db.delete_by_id("users", &id)?;
    db.shutdown()?;

    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}
