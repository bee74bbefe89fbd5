use crate::domain::model::{CalculationRequest, ProductSpec, SortKey, TransportMode};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "tariff")]
#[command(about = "HTS lookup, landed-cost calculation and sourcing comparison")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "tariff-config.toml")]
    pub config: String,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Look up a single HTS code
    Lookup { code: String },

    /// Search HTS descriptions
    Search {
        query: String,
        #[arg(long)]
        chapter: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Calculate landed cost for one shipment
    Calculate(CalculateArgs),

    /// Compare landed cost across origin countries
    Compare(CompareArgs),

    /// Run the HTTP API
    Serve {
        /// Override server.bind from config
        #[arg(long)]
        bind: Option<String>,
        /// Emit JSON logs
        #[arg(long)]
        json_logs: bool,
    },
}

#[derive(Debug, Clone, Args)]
pub struct ShipmentArgs {
    #[arg(long)]
    pub hts_code: String,
    #[arg(long)]
    pub product_value: f64,
    #[arg(long, default_value_t = 1)]
    pub quantity: u32,
    #[arg(long, default_value_t = 0.0)]
    pub freight: f64,
    #[arg(long, default_value_t = 0.0)]
    pub insurance: f64,
    #[arg(long, default_value_t = 0.0)]
    pub other: f64,
    #[arg(long, default_value = "USD")]
    pub currency: String,
    /// ocean, air, truck or rail
    #[arg(long, default_value = "ocean", value_parser = parse_transport_mode)]
    pub mode: TransportMode,
    /// Entry date (YYYY-MM-DD) used to pick active trade programs
    #[arg(long)]
    pub entry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Args)]
pub struct CalculateArgs {
    #[command(flatten)]
    pub shipment: ShipmentArgs,
    #[arg(long)]
    pub country: String,
    /// Do not claim FTA preference
    #[arg(long)]
    pub no_preference: bool,
}

#[derive(Debug, Clone, Args)]
pub struct CompareArgs {
    #[command(flatten)]
    pub shipment: ShipmentArgs,
    /// Current (baseline) country of origin
    #[arg(long)]
    pub baseline: String,
    #[arg(long, value_delimiter = ',', required = true)]
    pub targets: Vec<String>,
    /// savings, duty_rate or total_landed_cost
    #[arg(long, default_value = "savings", value_parser = parse_sort_key)]
    pub sort_by: SortKey,
}

impl ShipmentArgs {
    pub fn to_spec(&self) -> ProductSpec {
        ProductSpec {
            hts_code: self.hts_code.clone(),
            product_value: self.product_value,
            quantity: self.quantity,
            freight_cost: self.freight,
            insurance_cost: self.insurance,
            other_costs: self.other,
            currency: self.currency.clone(),
            transport_mode: self.mode,
            entry_date: self.entry_date,
        }
    }
}

impl CalculateArgs {
    pub fn to_request(&self) -> CalculationRequest {
        let mut request = self.shipment.to_spec().request_for(&self.country);
        request.claim_preference = !self.no_preference;
        request
    }
}

fn parse_transport_mode(value: &str) -> Result<TransportMode, String> {
    match value.to_ascii_lowercase().as_str() {
        "ocean" | "sea" => Ok(TransportMode::Ocean),
        "air" => Ok(TransportMode::Air),
        "truck" | "road" => Ok(TransportMode::Truck),
        "rail" => Ok(TransportMode::Rail),
        other => Err(format!("unknown transport mode '{}'", other)),
    }
}

fn parse_sort_key(value: &str) -> Result<SortKey, String> {
    match value.to_ascii_lowercase().replace('-', "_").as_str() {
        "savings" => Ok(SortKey::Savings),
        "duty_rate" => Ok(SortKey::DutyRate),
        "total_landed_cost" | "total" => Ok(SortKey::TotalLandedCost),
        other => Err(format!("unknown sort key '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_calculate_command() {
        let cli = CliConfig::try_parse_from([
            "tariff",
            "calculate",
            "--hts-code",
            "8471.30.0100",
            "--country",
            "CN",
            "--product-value",
            "1000",
            "--freight",
            "100",
            "--insurance",
            "50",
            "--mode",
            "air",
            "--no-preference",
        ])
        .unwrap();

        let Command::Calculate(args) = cli.command else {
            panic!("expected calculate");
        };
        let request = args.to_request();
        assert_eq!(request.country_code, "CN");
        assert_eq!(request.freight_cost, 100.0);
        assert_eq!(request.transport_mode, TransportMode::Air);
        assert!(!request.claim_preference);
        assert_eq!(cli.config, "tariff-config.toml");
    }

    #[test]
    fn test_parse_compare_command() {
        let cli = CliConfig::try_parse_from([
            "tariff",
            "--config",
            "custom.toml",
            "compare",
            "--hts-code",
            "8471300100",
            "--product-value",
            "1000",
            "--baseline",
            "CN",
            "--targets",
            "VN,MX,IN",
            "--sort-by",
            "duty-rate",
        ])
        .unwrap();

        let Command::Compare(args) = cli.command else {
            panic!("expected compare");
        };
        assert_eq!(args.targets, vec!["VN", "MX", "IN"]);
        assert_eq!(args.sort_by, SortKey::DutyRate);
        assert_eq!(args.shipment.to_spec().quantity, 1);
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let result = CliConfig::try_parse_from([
            "tariff",
            "calculate",
            "--hts-code",
            "8471300100",
            "--country",
            "CN",
            "--product-value",
            "1000",
            "--mode",
            "pigeon",
        ]);
        assert!(result.is_err());
    }
}
