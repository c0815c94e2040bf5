//! Per-domain field schemas
//!
//! Every dashboard page shows the same thing with different fields: a rolling
//! window of numeric readings keyed by metric name. Instead of duplicating the
//! projection logic per page, each metric group is described declaratively by
//! a [`DomainSchema`] that names its live event, its backfill endpoint and the
//! fields to extract from raw records, including nested extraction paths for
//! payloads like the server's `ohm_data` block.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::FeedError;

/// A named metric group with its own field schema and endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Environment sensors (temperature, humidity, UV index)
    Environment,
    /// Solar inverter telemetry
    Inverter,
    /// Server health metrics
    Server,
}

impl Domain {
    /// All built-in domains
    pub const ALL: [Domain; 3] = [Domain::Environment, Domain::Inverter, Domain::Server];

    /// Canonical lowercase name, also used as HTTP path segment
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Environment => "environment",
            Domain::Inverter => "inverter",
            Domain::Server => "server",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "environment" => Ok(Domain::Environment),
            "inverter" => Ok(Domain::Inverter),
            "server" => Ok(Domain::Server),
            other => Err(FeedError::invalid_input(format!("unknown domain: {other}"))),
        }
    }
}

/// One metric within a domain: where to find it in a raw record and how the
/// renderer should label it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Metric name, used as the key in every [`crate::sample::Sample`]
    pub name: String,

    /// Display label for cards and chart legends
    pub label: String,

    /// Display unit (e.g. "°C", "W"), if any
    pub unit: Option<String>,

    /// Chart line color
    pub color: String,

    /// JSON path into the raw record; defaults to `[name]`
    pub path: Vec<String>,
}

impl FieldSpec {
    /// Create a field extracted from the top-level key `name`
    pub fn new(name: &str, label: &str, color: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            unit: None,
            color: color.to_string(),
            path: vec![name.to_string()],
        }
    }

    /// Set the display unit
    pub fn unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    /// Extract the field from a nested location instead of the top-level key
    pub fn path(mut self, path: &[&str]) -> Self {
        self.path = path.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Look up this field's numeric value in a raw record
    pub fn extract(&self, record: &Value) -> Option<f64> {
        let mut cursor = record;
        for key in &self.path {
            cursor = cursor.get(key)?;
        }
        coerce_number(cursor)
    }
}

/// Accept JSON numbers and numeric strings; the upstream feed mixes both
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Declarative description of one metric domain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainSchema {
    /// The domain this schema describes
    pub domain: Domain,

    /// Live channel event name carrying this domain's messages
    pub event: String,

    /// Backfill endpoint path on the history server
    pub endpoint: String,

    /// Fields to project out of every raw record
    pub fields: Vec<FieldSpec>,
}

impl DomainSchema {
    /// Built-in schema for a domain, matching the deployed feed
    pub fn builtin(domain: Domain) -> &'static DomainSchema {
        match domain {
            Domain::Environment => &BUILTIN_SCHEMAS[0],
            Domain::Inverter => &BUILTIN_SCHEMAS[1],
            Domain::Server => &BUILTIN_SCHEMAS[2],
        }
    }

    /// All built-in schemas
    pub fn all_builtin() -> &'static [DomainSchema] {
        &BUILTIN_SCHEMAS[..]
    }

    /// Project every schema field out of a raw record.
    ///
    /// Returns `None` when any field is missing or non-numeric; a partial
    /// sample is never produced.
    pub fn project(&self, record: &Value) -> Option<BTreeMap<String, f64>> {
        let mut fields = BTreeMap::new();
        for spec in &self.fields {
            let value = spec.extract(record)?;
            fields.insert(spec.name.clone(), value);
        }
        Some(fields)
    }
}

static BUILTIN_SCHEMAS: Lazy<[DomainSchema; 3]> = Lazy::new(|| {
    [
        DomainSchema {
            domain: Domain::Environment,
            event: "mqtt message2".to_string(),
            endpoint: "/ambiente".to_string(),
            fields: vec![
                FieldSpec::new("temperature", "Temperatura", "#f44336").unit("°C"),
                FieldSpec::new("humidity", "Umidade", "#2196f3").unit("%"),
                FieldSpec::new("uv", "Índice UV", "#ff9800"),
            ],
        },
        DomainSchema {
            domain: Domain::Inverter,
            event: "mqtt message3".to_string(),
            endpoint: "/inversor".to_string(),
            fields: vec![
                FieldSpec::new("Pac", "Potência de Saída", "#f44336").unit("W"),
                FieldSpec::new("Vpv1", "Tensão de Entrada", "#2196f3").unit("V"),
                FieldSpec::new("Vac1", "Tensão de Saída", "#4caf50").unit("V"),
                FieldSpec::new("Ipv1", "Corrente de Entrada", "#ff9800").unit("A"),
                FieldSpec::new("Iac1", "Corrente de Saída", "#9c27b0").unit("A"),
                FieldSpec::new("EDay", "Energia do Dia", "#00bcd4").unit("kWh"),
                FieldSpec::new("Temperature", "Temperatura", "#795548").unit("°C"),
            ],
        },
        DomainSchema {
            domain: Domain::Server,
            event: "mqtt message".to_string(),
            endpoint: "/servidor".to_string(),
            fields: vec![
                FieldSpec::new("cpu", "CPU", "#f44336")
                    .unit("%")
                    .path(&["ohm_data", "Load CPU", "CPU Total"]),
                FieldSpec::new("memory", "Memória", "#2196f3").unit("%"),
                FieldSpec::new("disk", "Disco", "#ff9800").unit("%"),
                FieldSpec::new("cpuPackage", "Potência CPU", "#00e676")
                    .unit("W")
                    .path(&["ohm_data", "CPU Package"]),
                FieldSpec::new("cpuDram", "Potência Memória", "#9c27b0")
                    .unit("W")
                    .path(&["ohm_data", "CPU DRAM"]),
            ],
        },
    ]
});

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtin_schemas_cover_all_domains() {
        for domain in Domain::ALL {
            let schema = DomainSchema::builtin(domain);
            assert_eq!(schema.domain, domain);
            assert!(!schema.fields.is_empty());
        }
    }

    #[test]
    fn domain_round_trips_through_str() {
        for domain in Domain::ALL {
            assert_eq!(domain.as_str().parse::<Domain>().unwrap(), domain);
        }
        assert!("garden".parse::<Domain>().is_err());
    }

    #[test]
    fn project_accepts_numeric_strings() {
        let schema = DomainSchema::builtin(Domain::Environment);
        let record = json!({"temperature": "20.5", "humidity": 61, "uv": 3});
        let fields = schema.project(&record).unwrap();
        assert_eq!(fields["temperature"], 20.5);
        assert_eq!(fields["humidity"], 61.0);
    }

    #[test]
    fn project_rejects_missing_field() {
        let schema = DomainSchema::builtin(Domain::Environment);
        let record = json!({"temperature": 20.5, "uv": 3});
        assert!(schema.project(&record).is_none());
    }

    #[test]
    fn project_follows_nested_paths() {
        let schema = DomainSchema::builtin(Domain::Server);
        let record = json!({
            "memory": "42.1",
            "disk": "77.8",
            "ohm_data": {
                "Load CPU": {"CPU Total": "12.5"},
                "CPU Package": "18.2",
                "CPU DRAM": "2.4",
            }
        });
        let fields = schema.project(&record).unwrap();
        assert_eq!(fields["cpu"], 12.5);
        assert_eq!(fields["cpuPackage"], 18.2);
    }

    #[test]
    fn project_rejects_non_numeric_value() {
        let schema = DomainSchema::builtin(Domain::Environment);
        let record = json!({"temperature": "warm", "humidity": 61, "uv": 3});
        assert!(schema.project(&record).is_none());
    }
}
