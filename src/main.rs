#[tokio::main]
async fn main() {
    mediq::run().await;
}
