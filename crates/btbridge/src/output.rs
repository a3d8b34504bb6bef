use std::io::IsTerminal;

use btbridge_daemon::avrcp::AvrcpNotification;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Outcome of one command or request.
#[derive(Debug, Serialize)]
pub struct CommandOutput<'a> {
    pub command: &'a str,
    pub status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

pub fn print_outcome(out: &CommandOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "STATUS", "VALUE"])
                .add_row(vec![
                    out.command.to_string(),
                    out.status.to_string(),
                    out.value.as_ref().map(Value::to_string).unwrap_or_default(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match &out.value {
            Some(value) => println!(
                "command={} status={} value={value}",
                out.command, out.status
            ),
            None => println!("command={} status={}", out.command, out.status),
        },
    }
}

pub fn print_notification(notification: &AvrcpNotification, format: OutputFormat) {
    let value = serde_json::to_value(notification).unwrap_or(Value::Null);
    let (name, fields) = split_notification(&value);

    match format {
        OutputFormat::Json => println!("{value}"),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["NOTIFICATION", "FIELDS"])
                .add_row(vec![name, fields.join(" ")]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if fields.is_empty() {
                println!("notification={name}");
            } else {
                println!("notification={name} {}", fields.join(" "));
            }
        }
    }
}

fn split_notification(value: &Value) -> (String, Vec<String>) {
    let Some(object) = value.as_object() else {
        return ("unknown".to_string(), Vec::new());
    };
    let name = object
        .get("notification")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let fields = object
        .iter()
        .filter(|(key, _)| key.as_str() != "notification")
        .map(|(key, field)| match field {
            Value::String(text) => format!("{key}={text}"),
            other => format!("{key}={other}"),
        })
        .collect();
    (name, fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_notification_splits_into_fields() {
        let value = serde_json::to_value(AvrcpNotification::VolumeChange {
            volume: 30,
            ctype: 13,
        })
        .unwrap();
        let (name, mut fields) = split_notification(&value);
        fields.sort();
        assert_eq!(name, "volume_change");
        assert_eq!(fields, vec!["ctype=13", "volume=30"]);
    }

    #[test]
    fn unit_notification_has_no_fields() {
        let value = serde_json::to_value(AvrcpNotification::GetPlayStatus).unwrap();
        let (name, fields) = split_notification(&value);
        assert_eq!(name, "get_play_status");
        assert!(fields.is_empty());
    }

    #[test]
    fn outcome_omits_missing_value() {
        let out = CommandOutput {
            command: "set_volume",
            status: "success",
            value: None,
        };
        assert_eq!(
            serde_json::to_string(&out).unwrap(),
            r#"{"command":"set_volume","status":"success"}"#
        );
    }
}
