pub mod fact_check;

pub async fn health() -> &'static str {
    "ok"
}
