//! `report`: inspect when editing, then print the repeat's report.

use serde_json::Value;

use inspect_core::Controller;

use crate::cli::{GlobalOpts, ReportArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    controller: &Controller,
    args: ReportArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    super::settle_state(controller).await;
    let report = controller
        .inspect_get_report(args.repeat, args.image.is_some())
        .await?;

    if let Some(ref path) = args.image {
        match report.image {
            Some(ref image) => {
                std::fs::write(path, image)?;
                if !global.quiet {
                    eprintln!("Image written to {}", path.display());
                }
            }
            None => eprintln!("The node returned no image"),
        }
    }

    let out = output::render_single(
        &global.output,
        &report.report,
        |r| output::render_detail(&summary(r)),
        |r| grade(r).unwrap_or_else(|| "-".into()),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Overall grade, wherever the firmware put it.
fn grade(report: &Value) -> Option<String> {
    ["overallGrade", "grade"]
        .iter()
        .find_map(|key| report.get(key))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
}

/// Top-level scalar fields of the report, in document order.
fn summary(report: &Value) -> Vec<(&str, String)> {
    let Value::Object(map) = report else {
        return vec![("report", report.to_string())];
    };
    map.iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k.as_str(), s.clone())),
            Value::Number(_) | Value::Bool(_) => Some((k.as_str(), v.to_string())),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn grade_from_either_key() {
        assert_eq!(grade(&json!({"overallGrade": "B"})).as_deref(), Some("B"));
        assert_eq!(grade(&json!({"grade": 3.5})).as_deref(), Some("3.5"));
        assert_eq!(grade(&json!({})), None);
    }

    #[test]
    fn summary_skips_nested_values() {
        let report = json!({"grade": "A", "sectors": [1, 2], "passed": true});
        let rows = summary(&report);
        let keys: Vec<&str> = rows.iter().map(|(k, _)| *k).collect();
        assert!(keys.contains(&"grade"));
        assert!(keys.contains(&"passed"));
        assert!(!keys.contains(&"sectors"));
    }
}
