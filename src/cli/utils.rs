use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::refresh::DeadlinePlan;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(Value::Object(extra)), Some(object)) = (data, response.as_object_mut()) {
                object.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: &OutputFormat, message: &str, error_code: Option<&str>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// `3725` -> `1h 2m 5s`
pub fn format_remaining(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    match (h, m) {
        (0, 0) => format!("{}s", s),
        (0, _) => format!("{}m {}s", m, s),
        _ => format!("{}h {}m {}s", h, m, s),
    }
}

pub fn describe_plan(plan: &DeadlinePlan) -> String {
    match plan {
        DeadlinePlan::Unscheduled => "no automatic refresh".to_string(),
        DeadlinePlan::After(delay) => format!("refresh in {}", format_remaining(delay.as_secs())),
        DeadlinePlan::Immediate => "refresh immediately (inside the buffer)".to_string(),
        DeadlinePlan::Overdue { past_expiry } => format!(
            "expired {} ago, beyond the buffer; manual refresh required",
            format_remaining(past_expiry.as_secs())
        ),
    }
}

pub fn plan_json(plan: &DeadlinePlan) -> Value {
    match plan {
        DeadlinePlan::Unscheduled => json!({ "kind": "unscheduled" }),
        DeadlinePlan::After(delay) => json!({ "kind": "after", "delayMs": delay.as_millis() as u64 }),
        DeadlinePlan::Immediate => json!({ "kind": "immediate" }),
        DeadlinePlan::Overdue { past_expiry } => {
            json!({ "kind": "overdue", "pastExpiryMs": past_expiry.as_millis() as u64 })
        }
    }
}
