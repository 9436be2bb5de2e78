use std::io::{self, Write};
use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use chatlog_server::calendar::{CalendarConfig, CalendarIndex};
use chatlog_server::models::{CalendarDays, CalendarMonths, CalendarYears, MonthEntry};
use chatlog_server::store::PgTimestampSource;

#[derive(Parser, Debug)]
#[command(
    name = "chatlog-calendar",
    about = "Print the years, months or days of a chat that have messages"
)]
struct Args {
    /// Chat to inspect.
    chat_id: i64,

    /// List the months of this year instead of the years.
    #[arg(long)]
    year: Option<i32>,

    /// With --year, list the days of this month (1-12).
    #[arg(long, requires = "year")]
    month: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;

    let config = CalendarConfig::from_env();
    let calendar = CalendarIndex::new(Arc::new(PgTimestampSource::new(pool.clone())), &config);
    let chat_id = args.chat_id;

    let output = match (args.year, args.month) {
        (Some(year), Some(month)) => {
            let days = calendar.days(chat_id, year, month).await?;
            serde_json::to_string_pretty(&CalendarDays {
                chat_id,
                year,
                month,
                days,
            })?
        }
        (Some(year), None) => {
            let months = calendar
                .months(chat_id, year)
                .await?
                .into_iter()
                .filter_map(MonthEntry::from_number)
                .collect();
            serde_json::to_string_pretty(&CalendarMonths {
                chat_id,
                year,
                months,
            })?
        }
        _ => {
            let years = calendar.years(chat_id).await?;
            serde_json::to_string_pretty(&CalendarYears { chat_id, years })?
        }
    };

    writeln!(io::stdout(), "{output}")?;

    calendar.shutdown().await;
    pool.close().await;

    Ok(())
}
