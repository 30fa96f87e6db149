#[tokio::main]
async fn main() {
    devnet::start(std::env::args()).await;
}
