// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Positive matches from the auto-configuration condition report.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A condition that matched in a live process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LiveConditional {
    pub process_id: String,
    pub process_name: String,
    /// The auto-configuration class, or `Class#method` for a bean method.
    pub type_name: String,
    pub condition: String,
    pub message: String,
}

#[derive(Deserialize)]
struct Outcome {
    condition: String,
    #[serde(default)]
    message: String,
}

/// Collects the positive matches of a condition report.
///
/// 1.x keeps `positiveMatches` at the top level, 2.x keeps one per context
/// under `contexts`. Returns `None` for any other shape.
pub fn parse(report: &Value, process_id: &str, process_name: &str) -> Option<Vec<LiveConditional>> {
    let matches: Vec<&Map<String, Value>> = if let Some(positive) = report.get("positiveMatches") {
        vec![positive.as_object()?]
    } else {
        report
            .get("contexts")?
            .as_object()?
            .values()
            .filter_map(|context| context.get("positiveMatches"))
            .filter_map(Value::as_object)
            .collect()
    };

    let mut conditionals = Vec::new();
    for positive in matches {
        for (type_name, outcomes) in positive {
            let outcomes: Vec<Outcome> = match serde_json::from_value(outcomes.clone()) {
                Ok(outcomes) => outcomes,
                Err(e) => {
                    warn!("malformed condition outcome for {type_name}: {e}");
                    return None;
                }
            };

            conditionals.extend(outcomes.into_iter().map(|outcome| LiveConditional {
                process_id: process_id.to_string(),
                process_name: process_name.to_string(),
                type_name: type_name.clone(),
                condition: outcome.condition,
                message: outcome.message,
            }));
        }
    }
    Some(conditionals)
}
