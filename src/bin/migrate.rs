use anyhow::Result;
use pair_indexer::config::database_url_from_env;
use pair_indexer::repository::{Database, PairRepository};

fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let database_url = database_url_from_env();
    println!("Creating pair schema on database: {database_url}");

    let db = Database::new(&database_url)?;
    let stats = PairRepository::new(&db.conn).get_statistics()?;

    println!(
        "Schema ready, {} pair(s) from {} factory contract(s) already stored",
        stats.total_pairs, stats.factories
    );

    Ok(())
}
