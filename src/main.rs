#[tokio::main]
async fn main() {
    tatkal_engine::run().await;
}
