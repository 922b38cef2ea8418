use std::path::PathBuf;

use chrono_tz::Tz;
use clap::Parser;

#[derive(Debug, Parser)]
pub struct Args {
    #[arg(long)]
    pub file: PathBuf,

    #[arg(long, env = "ORGANIZATION_ID")]
    pub organization_id: String,

    #[arg(long, env = "LOCATION_ID")]
    pub location_id: Option<String>,

    /// Machine the readings belong to when the file has no machine column.
    #[arg(long)]
    pub machine_id: Option<String>,

    /// Tag applied to rows without a `tags` column.
    #[arg(long, default_value = "air-quality")]
    pub tag: String,

    /// Timezone of timestamps that carry no offset.
    #[arg(long, env = "TZ", default_value = "UTC")]
    pub timezone: Tz,

    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,
}
