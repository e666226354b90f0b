use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Version mayor minima aceptada.
pub const MIN_MAJOR_VERSION: u64 = 10;
/// Maximo de servicios caidos tolerados por instancia.
pub const MAX_DEAD_SERVICES: usize = 7;

/// Instancia publica tal como la publica el registro.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Instance {
    /// Host de la API sin esquema (`api.example.com`).
    pub api: String,
    #[serde(default = "protocolo_por_defecto")]
    pub protocol: String,
    #[serde(default)]
    pub trust: f64,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub services: BTreeMap<String, Value>,
    #[serde(default)]
    pub score: f64,
}

fn protocolo_por_defecto() -> String {
    "https".to_string()
}

impl Instance {
    /// URL base de la API segun el registro.
    pub fn api_base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.api)
    }

    /// Version mayor (`10` para `10.5.4`), si es legible.
    pub fn major_version(&self) -> Option<u64> {
        self.version
            .trim()
            .trim_start_matches('v')
            .split('.')
            .next()
            .and_then(|mayor| mayor.parse().ok())
    }

    /// Cantidad de servicios reportados como caidos.
    pub fn dead_services(&self) -> usize {
        self.services
            .values()
            .filter(|estado| !servicio_sano(estado))
            .count()
    }

    /// Politica de confianza, version y salud del registro.
    pub fn is_good(&self) -> bool {
        let version_ok = self
            .major_version()
            .is_some_and(|mayor| mayor >= MIN_MAJOR_VERSION);
        version_ok && self.trust == 1.0 && self.dead_services() <= MAX_DEAD_SERVICES
    }
}

fn servicio_sano(estado: &Value) -> bool {
    match estado {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Filtra las instancias aceptables conservando el orden del registro.
pub fn filter_good(instances: Vec<Instance>) -> Vec<Instance> {
    instances.into_iter().filter(Instance::is_good).collect()
}

/// Ordena por puntaje descendente; los empates conservan el orden original.
pub fn rank(instances: &mut [Instance]) {
    instances.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use serde_json::json;

    pub fn instancia(api: &str, version: &str, trust: f64, score: f64) -> Instance {
        Instance {
            api: api.to_string(),
            protocol: "https".to_string(),
            trust,
            version: version.to_string(),
            services: BTreeMap::from([
                ("youtube".to_string(), json!(true)),
                ("tiktok".to_string(), json!(true)),
            ]),
            score,
        }
    }
}
