//! REST Client — talks to an A2A agent over the HTTP+REST transport
//! instead of JSON-RPC.
//!
//! Run the echo agent first:
//! ```sh
//! cargo run --example echo_agent
//! ```
//!
//! Then in another terminal:
//! ```sh
//! cargo run --example rest_client
//! ```

use a2a_rs::client::{A2AClient, SendMessageResponse};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Skip card discovery and bind straight to the REST binding of the
    // agent's `/v1` routes.
    let client = A2AClient::from_rest_endpoint("http://localhost:3000");

    let response = client.send_text("Hello over REST!").await?;

    match response {
        SendMessageResponse::Task(task) => {
            println!("Task ID: {}", task.id);
            println!("Status: {}", task.status.state);

            if let Some(artifacts) = &task.artifacts {
                for artifact in artifacts {
                    println!(
                        "Artifact: {}",
                        artifact.name.as_deref().unwrap_or("unnamed")
                    );
                    for part in &artifact.parts {
                        if let a2a_rs::types::Part::Text { text, .. } = part {
                            println!("  {}", text);
                        }
                    }
                }
            }
        }
        SendMessageResponse::Message(msg) => {
            println!("Direct message from agent:");
            for part in &msg.parts {
                if let a2a_rs::types::Part::Text { text, .. } = part {
                    println!("  {}", text);
                }
            }
        }
    }

    Ok(())
}
