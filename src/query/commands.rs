use crate::query::formatters::{OutputFormat, format_pair, format_pairs, format_stats};
use crate::repository::{PairFilter, PairRepository};
use alloy_primitives::Address;
use anyhow::Result;
use std::str::FromStr;

fn parse_address(label: &str, value: &str) -> Result<Address> {
    Address::from_str(value).map_err(|_| anyhow::anyhow!("Invalid {} address: {}", label, value))
}

#[derive(Default)]
pub struct PairQuery {
    pub token: Option<String>,
    pub factory: Option<String>,
    pub stable: Option<bool>,
    pub limit: usize,
    pub offset: usize,
}

impl PairQuery {
    pub fn to_filter(&self) -> Result<PairFilter> {
        Ok(PairFilter {
            token: self
                .token
                .as_deref()
                .map(|token| parse_address("token", token))
                .transpose()?,
            factory: self
                .factory
                .as_deref()
                .map(|factory| parse_address("factory", factory))
                .transpose()?,
            stable: self.stable,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

pub fn cmd_pairs(repo: &PairRepository, query: PairQuery, format: &OutputFormat) -> Result<()> {
    let filter = query.to_filter()?;
    let pairs = repo.query_pairs(&filter)?;
    println!("{}", format_pairs(&pairs, format));

    Ok(())
}

pub fn cmd_pair(repo: &PairRepository, address: &str, format: &OutputFormat) -> Result<()> {
    let address = parse_address("pair", address)?;

    match repo.get_pair(&address)? {
        Some(pair) => println!("{}", format_pair(&pair, format)),
        None => println!("Pair {address:?} not found."),
    }

    Ok(())
}

pub fn cmd_stats(repo: &PairRepository, format: &OutputFormat) -> Result<()> {
    let stats = repo.get_statistics()?;
    println!("{}", format_stats(&stats, format));

    Ok(())
}
