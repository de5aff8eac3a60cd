//! Caching a server timeline.
//!
//! Ingests a JSON payload with server-side key names into a private
//! database queue, pages through it in the model's default order and
//! resolves cache paths for the attached media.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p activerow-demos --example timeline_sync
//! ```

use activerow_core::{Direction, Model, SchemaBuilder, Value, to_json_object};
use activerow_sqlite::{DatabaseQueue, MediaCache, Record};
use chrono::{DateTime, Utc};
use serde_json::json;

#[derive(Debug, Default, Clone)]
struct Post {
    id: i64,
    author: String,
    body: String,
    posted_at: DateTime<Utc>,
    image_url: Option<String>,
}

impl Model for Post {
    fn describe() -> SchemaBuilder {
        SchemaBuilder::new("Post")
            .field_of::<i64>("id")
            .field_of::<String>("author")
            .field_of::<String>("body")
            .field_of::<DateTime<Utc>>("posted_at")
            .field_of::<Option<String>>("image_url")
            .order_by("posted_at", Direction::Desc)
            .json_key("postId", "id")
            .json_key("user", "author")
            .json_key("text", "body")
            .json_key("createdAt", "posted_at")
            .json_key("imageURL", "image_url")
    }

    fn value_of(&self, field: &str) -> Value {
        match field {
            "id" => self.id.into(),
            "author" => self.author.as_str().into(),
            "body" => self.body.as_str().into(),
            "posted_at" => self.posted_at.into(),
            "image_url" => self.image_url.clone().into(),
            _ => Value::Null,
        }
    }

    fn assign(&mut self, field: &str, value: Value) {
        match field {
            "id" => self.id = value.decode(),
            "author" => self.author = value.decode(),
            "body" => self.body = value.decode(),
            "posted_at" => self.posted_at = value.decode(),
            "image_url" => self.image_url = value.decode(),
            _ => {}
        }
    }
}

fn main() {
    let queue = DatabaseQueue::open_in_memory().unwrap();
    Post::create_table_in(&queue).unwrap();

    // === Step 1: Ingest the server payload ===
    println!("=== Ingest ===");
    let payload = json!([
        {"postId": 1, "user": "ann", "text": "first!", "createdAt": "2024-03-01T09:00:00Z"},
        {"postId": 2, "user": "bob", "text": "hello", "createdAt": "2024-03-01T10:15:00Z",
         "imageURL": "https://cdn.example.com/p/2/sunrise.jpg"},
        {"postId": 3, "user": "cat", "text": "lunch", "createdAt": "2024-03-01T12:30:00Z", "likes": 4},
        {"postId": 4, "user": "ann", "text": "again", "createdAt": "2024-03-02T08:00:00Z",
         "imageURL": "https://cdn.example.com/p/4/coffee.png?w=640"}
    ]);
    let items = payload.as_array().cloned().unwrap_or_default();
    let posts = Post::from_json_array_in(&queue, &items).unwrap();
    println!("Stored {} posts", posts.len());

    // === Step 2: Newest first, then page around one post ===
    println!("\n=== Timeline ===");
    for post in Post::finder_in(&queue).all().unwrap() {
        println!("  #{} {} @ {}: {}", post.id, post.author, post.posted_at, post.body);
    }

    let anchor = Post::finder_in(&queue).find(2).unwrap().unwrap();
    let newer = anchor.previous_objects_in(&queue, 10).unwrap();
    let older = anchor.next_objects_in(&queue, 10).unwrap();
    println!(
        "Around #{}: newer {:?}, older {:?}",
        anchor.id,
        newer.iter().map(|p| p.id).collect::<Vec<_>>(),
        older.iter().map(|p| p.id).collect::<Vec<_>>()
    );

    // === Step 3: Media cache locations ===
    println!("\n=== Media ===");
    let cache = MediaCache::for_model::<Post>(std::env::temp_dir().join("activerow_media_demo")).unwrap();
    for post in Post::finder_in(&queue).all().unwrap() {
        if let Some(url) = &post.image_url {
            println!(
                "  #{} {} -> {} (cached: {})",
                post.id,
                url,
                cache.cache_location_for_media_url(url).display(),
                cache.media_url_is_cached(url)
            );
        }
    }

    // === Step 4: Back to the server format ===
    println!("\n=== Export ===");
    let latest = Post::finder_in(&queue).first().unwrap().unwrap();
    let exported = to_json_object(&latest).unwrap();
    println!("{}", serde_json::to_string_pretty(&exported).unwrap());

    println!("\nDone!");
}
