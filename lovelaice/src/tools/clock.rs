//! `get_today`: the local date and time.

use anyhow::Result;
use chrono::{DateTime, Local, TimeZone};
use serde_json::Value;

use super::{Effect, ToolDeps, ToolDescriptor, ToolHandler, ToolOutput};

struct GetToday;

impl ToolHandler for GetToday {
    fn call(&self, _args: &Value, _deps: &ToolDeps<'_>) -> Result<ToolOutput> {
        Ok(ToolOutput::ok(describe(&Local::now())))
    }
}

fn describe<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{} ({})",
        now.format("%Y-%m-%d"),
        now.format("%A, %B %-d, %Y %H:%M:%S %:z")
    )
}

pub fn get_today() -> ToolDescriptor {
    ToolDescriptor::new(
        "get_today",
        "Returns the current local date (ISO 8601) and time. Useful for dating \
         files or answering questions about today.",
        GetToday,
    )
    .effect(Effect::ReadOnly)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    #[test]
    fn renders_iso_date_first() {
        let offset = FixedOffset::east_opt(3600).expect("offset");
        let now = offset
            .with_ymd_and_hms(2024, 3, 5, 14, 7, 9)
            .single()
            .expect("time");
        assert_eq!(
            describe(&now),
            "2024-03-05 (Tuesday, March 5, 2024 14:07:09 +01:00)"
        );
    }
}
