use crate::decoder::NormalizedPairRecord;
use crate::repository::PairStats;
use comfy_table::{Cell, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use csv::Writer;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "csv" => OutputFormat::Csv,
            _ => OutputFormat::Table,
        }
    }
}

fn stable_label(stable: Option<bool>) -> &'static str {
    match stable {
        Some(true) => "stable",
        Some(false) => "volatile",
        None => "-",
    }
}

fn optional_block(block: Option<u64>) -> String {
    block.map_or("N/A".to_string(), |b| b.to_string())
}

pub fn format_pairs(pairs: &[NormalizedPairRecord], format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table => format_pairs_table(pairs),
        OutputFormat::Json => format_pairs_json(pairs),
        OutputFormat::Csv => format_pairs_csv(pairs),
    }
}

fn format_pairs_table(pairs: &[NormalizedPairRecord]) -> String {
    if pairs.is_empty() {
        return "No pairs found.".to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            "Block", "Pair", "Token0", "Token1", "Factory", "Stable", "Tx Hash",
        ]);

    for pair in pairs {
        table.add_row(vec![
            Cell::new(optional_block(pair.block_number)),
            Cell::new(format!("{:#}", pair.pair_address)),
            Cell::new(format!("{:#}", pair.token0)),
            Cell::new(format!("{:#}", pair.token1)),
            Cell::new(format!("{:#}", pair.factory_address)),
            Cell::new(stable_label(pair.stable)),
            Cell::new(
                pair.transaction_hash
                    .map_or("-".to_string(), |hash| format_tx_hash(&format!("{hash:?}"))),
            ),
        ]);
    }

    table.to_string()
}

fn format_pairs_json(pairs: &[NormalizedPairRecord]) -> String {
    serde_json::to_string_pretty(pairs).unwrap_or_else(|_| "[]".to_string())
}

fn format_pairs_csv(pairs: &[NormalizedPairRecord]) -> String {
    let mut wtr = Writer::from_writer(vec![]);

    let _ = wtr.write_record([
        "block_number",
        "pair_address",
        "token0",
        "token1",
        "deployer_address",
        "factory_address",
        "stable",
        "transaction_hash",
        "log_index",
    ]);

    for pair in pairs {
        let _ = wtr.write_record([
            &pair.block_number.map(|b| b.to_string()).unwrap_or_default(),
            &format!("{:?}", pair.pair_address),
            &format!("{:?}", pair.token0),
            &format!("{:?}", pair.token1),
            &format!("{:?}", pair.deployer_address),
            &format!("{:?}", pair.factory_address),
            &pair.stable.map(|s| s.to_string()).unwrap_or_default(),
            &pair
                .transaction_hash
                .map(|hash| format!("{hash:?}"))
                .unwrap_or_default(),
            &pair.log_index.map(|i| i.to_string()).unwrap_or_default(),
        ]);
    }

    String::from_utf8(wtr.into_inner().unwrap_or_default()).unwrap_or_default()
}

pub fn format_pair(pair: &NormalizedPairRecord, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec!["Field", "Value"]);

            let rows = [
                ("Pair", format!("{:?}", pair.pair_address)),
                ("Token0", format!("{:?}", pair.token0)),
                ("Token1", format!("{:?}", pair.token1)),
                ("Deployer", format!("{:?}", pair.deployer_address)),
                ("Factory", format!("{:?}", pair.factory_address)),
                ("Stable", stable_label(pair.stable).to_string()),
                ("Block", optional_block(pair.block_number)),
                (
                    "Tx Hash",
                    pair.transaction_hash
                        .map_or("N/A".to_string(), |hash| format!("{hash:?}")),
                ),
                (
                    "Log Index",
                    pair.log_index.map_or("N/A".to_string(), |i| i.to_string()),
                ),
            ];
            for (field, value) in rows {
                table.add_row(vec![Cell::new(field), Cell::new(value)]);
            }
            table.to_string()
        }
        OutputFormat::Json => {
            serde_json::to_string_pretty(pair).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Csv => format_pairs_csv(std::slice::from_ref(pair)),
    }
}

pub fn format_stats(stats: &PairStats, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec!["Metric", "Value"]);

            table.add_row(vec![Cell::new("Total Pairs"), Cell::new(stats.total_pairs)]);
            table.add_row(vec![Cell::new("Factories"), Cell::new(stats.factories)]);
            table.add_row(vec![
                Cell::new("Stable Pairs"),
                Cell::new(stats.stable_pairs),
            ]);
            table.add_row(vec![
                Cell::new("Volatile Pairs"),
                Cell::new(stats.volatile_pairs),
            ]);
            table.add_row(vec![
                Cell::new("Earliest Block"),
                Cell::new(optional_block(stats.earliest_block)),
            ]);
            table.add_row(vec![
                Cell::new("Latest Block"),
                Cell::new(optional_block(stats.latest_block)),
            ]);

            table.to_string()
        }
        OutputFormat::Json => serde_json::to_string_pretty(&json!({
            "total_pairs": stats.total_pairs,
            "factories": stats.factories,
            "stable_pairs": stats.stable_pairs,
            "volatile_pairs": stats.volatile_pairs,
            "earliest_block": stats.earliest_block,
            "latest_block": stats.latest_block,
        }))
        .unwrap_or_else(|_| "{}".to_string()),
        OutputFormat::Csv => {
            let mut wtr = Writer::from_writer(vec![]);
            let _ = wtr.write_record(["metric", "value"]);
            let _ = wtr.write_record(["total_pairs", &stats.total_pairs.to_string()]);
            let _ = wtr.write_record(["factories", &stats.factories.to_string()]);
            let _ = wtr.write_record(["stable_pairs", &stats.stable_pairs.to_string()]);
            let _ = wtr.write_record(["volatile_pairs", &stats.volatile_pairs.to_string()]);
            let _ = wtr.write_record(["earliest_block", &optional_block(stats.earliest_block)]);
            let _ = wtr.write_record(["latest_block", &optional_block(stats.latest_block)]);
            String::from_utf8(wtr.into_inner().unwrap_or_default()).unwrap_or_default()
        }
    }
}

fn format_tx_hash(hash: &str) -> String {
    if hash.len() <= 10 {
        return hash.to_string();
    }
    format!("{}...{}", &hash[..6], &hash[hash.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256};

    fn sample() -> NormalizedPairRecord {
        NormalizedPairRecord {
            pair_address: Address::repeat_byte(0xaa),
            token0: Address::repeat_byte(0x01),
            token1: Address::repeat_byte(0x02),
            deployer_address: Address::repeat_byte(0xf0),
            factory_address: Address::repeat_byte(0xf0),
            stable: Some(true),
            block_number: Some(42),
            transaction_hash: Some(B256::repeat_byte(0x11)),
            log_index: Some(7),
        }
    }

    #[test]
    fn output_format_from_str() {
        assert_eq!(OutputFormat::from("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from("csv"), OutputFormat::Csv);
        assert_eq!(OutputFormat::from("anything"), OutputFormat::Table);
    }

    #[test]
    fn empty_table_has_message() {
        assert_eq!(format_pairs(&[], &OutputFormat::Table), "No pairs found.");
    }

    #[test]
    fn csv_has_header_and_one_row_per_pair() {
        let output = format_pairs(&[sample(), sample()], &OutputFormat::Csv);
        let lines: Vec<_> = output.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("block_number,pair_address,token0"));
        assert!(lines[1].starts_with("42,0xaaaaaaaa"));
        assert!(lines[1].contains(",true,"));
        assert!(lines[1].ends_with(",7"));
    }

    #[test]
    fn json_round_trips_through_serde_value() {
        let output = format_pairs(&[sample()], &OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value[0]["block_number"], 42);
        assert_eq!(value[0]["stable"], true);
        assert_eq!(
            value[0]["pair_address"].as_str().unwrap().to_lowercase(),
            format!("{:?}", Address::repeat_byte(0xaa))
        );
    }

    #[test]
    fn stats_csv_reports_missing_blocks() {
        let stats = PairStats {
            total_pairs: 0,
            factories: 0,
            stable_pairs: 0,
            volatile_pairs: 0,
            earliest_block: None,
            latest_block: None,
        };
        let output = format_stats(&stats, &OutputFormat::Csv);

        assert!(output.contains("total_pairs,0"));
        assert!(output.contains("earliest_block,N/A"));
    }

    #[test]
    fn tx_hash_is_shortened() {
        assert_eq!(format_tx_hash("0x1234567890abcdef"), "0x1234...cdef");
    }
}
