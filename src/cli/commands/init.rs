//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "starload.toml")]
    pub output: String,

    /// Include every option with comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Starload configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(()) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your tables and columns", self.output);
                println!("  2. Set STARLOAD_DW_URL in your environment or a .env file");
                println!("  3. Create the star schema tables (see migrations/)");
                println!("  4. Validate configuration: starload validate-config");
                println!("  5. Preview a load: starload run --dry-run");
                println!("  6. Run the load: starload run");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# Starload Configuration File
# Source staging tables to a PostgreSQL star schema

[application]
log_level = "info"
dry_run = false

[source]
kind = "postgresql"

[warehouse]
target = "postgresql"

[warehouse.postgresql]
connection_string = "${STARLOAD_DW_URL}"
advisory_lock_key = 7241

[load]
resolution = "as_of_load"
strict = false

[calendar]
table = "dw.dim_date"

[[dimensions]]
name = "customer"
table = "dw.dim_customer"
business_key_column = "customer_id"
tracked_attributes = ["name", "city"]

[dimensions.staging]
table = "staging.customers"
business_key_column = "customer_id"

[[dimensions]]
name = "product"
table = "dw.dim_product"
business_key_column = "product_id"
tracked_attributes = ["name", "category"]
passive_attributes = ["list_price"]

[dimensions.staging]
table = "staging.products"
business_key_column = "product_id"

[[facts]]
name = "sales"
table = "dw.fact_sales"

[[facts.dimensions]]
dimension = "customer"

[[facts.dimensions]]
dimension = "product"

[facts.staging]
table = "staging.sales_lines"
discount_column = "discount"
"#
        .to_string()
    }

    /// Generate configuration with every option documented
    fn generate_config_with_examples() -> String {
        r#"# Starload Configuration File
# Incremental loader from operational staging tables to a star schema
#
# Values of the form ${VAR_NAME} are replaced from the environment.
# Any key can be overridden with STARLOAD_<SECTION>_<KEY>, for example
# STARLOAD_LOAD_STRICT=true or STARLOAD_APPLICATION_DRY_RUN=true.

# Runtime environment (development, staging, production)
# Production forbids the memory warehouse and ssl_mode = "disable".
environment = "development"

# ============================================================================
# Application Configuration
# ============================================================================
[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# Run every step, then roll back instead of committing
dry_run = false

# ============================================================================
# Source Configuration
# ============================================================================
[source]
# Source kind (postgresql or json)
kind = "postgresql"

# JSON directory source: <dimension>.json and <fact>.json arrays
# [source.json]
# directory = "./feeds"

# Separate staging database (defaults to the warehouse connection)
# [source.postgresql]
# connection_string = "${STARLOAD_STAGING_URL}"

# ============================================================================
# Warehouse Configuration
# ============================================================================
[warehouse]
# Warehouse target (postgresql or memory)
target = "postgresql"

[warehouse.postgresql]
# Connection string (supports ${VAR} substitution)
connection_string = "${STARLOAD_DW_URL}"

# Maximum number of pooled connections
max_connections = 4

# Connection timeout in seconds
connection_timeout_seconds = 30

# Statement timeout in seconds
statement_timeout_seconds = 300

# SSL mode (disable, allow, prefer, require, verify-ca, verify-full)
ssl_mode = "prefer"

# Advisory lock held for the whole run so two runs never overlap
advisory_lock_key = 7241

# ============================================================================
# Load Configuration
# ============================================================================
[load]
# Dimension version each fact line resolves to
# as_of_load: the version current when the run executes
# as_of_transaction: the version valid on the transaction date
resolution = "as_of_load"

# Abort the run on the first unresolved fact line
strict = false

# Run date for entities without their own as-of date (defaults to today)
# as_of_date = "2024-03-01"

# ============================================================================
# Measures Configuration
# ============================================================================
[measures]
# cost_amount = sales_amount * cost_ratio
cost_ratio = 0.6

# profit_amount = sales_amount * margin_ratio
margin_ratio = 0.4

# ============================================================================
# Calendar Configuration
# ============================================================================
[calendar]
# Generate missing days before facts load (required when facts exist)
enabled = true

# Range to materialize; pending transaction dates widen it
# start_date = "2024-01-01"
# end_date = "2024-12-31"

table = "dw.dim_date"
date_key_column = "date_key"
date_column = "full_date"

# ============================================================================
# Dimensions (loaded in the listed order)
# ============================================================================
[[dimensions]]
name = "customer"
table = "dw.dim_customer"
surrogate_key_column = "customer_key"
business_key_column = "customer_id"
version_column = "version"
effective_date_column = "effective_date"
expiry_date_column = "expiry_date"
is_current_column = "is_current"

# A change in any tracked attribute closes the current version
tracked_attributes = ["name", "city"]

# Stored with each version, never triggers one
passive_attributes = ["email"]

[dimensions.staging]
table = "staging.customers"
business_key_column = "customer_id"
# Per-row change date (defaults to the run date)
# as_of_column = "changed_on"

# ============================================================================
# Facts (loaded after every dimension)
# ============================================================================
[[facts]]
name = "sales"
table = "dw.fact_sales"
natural_key_column = "natural_transaction_key"
date_key_column = "date_key"

[[facts.dimensions]]
dimension = "customer"
foreign_key_column = "customer_key"
source_column = "customer_id"

[facts.staging]
table = "staging.sales_lines"
natural_key_column = "transaction_id"
quantity_column = "quantity"
unit_price_column = "unit_price"
discount_column = "discount"
transaction_date_column = "transaction_date"

# ============================================================================
# Logging Configuration
# ============================================================================
[logging]
# Enable local file logging (JSON lines)
local_enabled = true

# Local log directory
local_path = "/var/log/starload"

# Log rotation (daily, hourly or never)
local_rotation = "daily"

# Rotated files to keep
local_max_files = 14
"#
        .to_string()
    }
}
